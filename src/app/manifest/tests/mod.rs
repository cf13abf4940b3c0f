//! Tests for manifest reading and URL resolution

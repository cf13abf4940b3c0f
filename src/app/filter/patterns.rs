//! Compiled, case-insensitive pattern lists

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// An ordered list of compiled patterns
///
/// Order matters for priority ranking, where the index of the first
/// matching pattern is the rank. A pattern that is not a valid regular
/// expression is kept as a literal substring match instead of being
/// dropped, so a typo in a config never silently widens a filter.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile patterns in order
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Self {
        let patterns = sources
            .iter()
            .filter_map(|source| compile_one(source.as_ref()))
            .collect();
        Self { patterns }
    }

    /// An empty set
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if any pattern occurs anywhere in `haystack`
    pub fn is_match(&self, haystack: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(haystack))
    }

    /// Index of the first pattern that occurs in `haystack`
    pub fn first_match(&self, haystack: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(haystack))
    }

    /// Pattern sources, as compiled
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }
}

fn compile_one(source: &str) -> Option<Regex> {
    match build(source) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(
                "Invalid pattern '{}' ({}), matching it as literal text",
                source, e
            );
            build(&regex::escape(source)).ok()
        }
    }
}

fn build(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

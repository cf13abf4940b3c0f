//! Include/exclude filtering of resolved URLs
//!
//! Patterns are regular expressions searched (not anchored) anywhere in the
//! full URL, case-insensitively. A URL survives when the include list is
//! empty or one of its patterns matches, and none of the exclude patterns
//! match. Exclusion always wins.

pub mod config;
pub mod patterns;

pub use config::FilterConfig;
pub use patterns::PatternSet;

use crate::app::models::ResolvedUrl;

/// Decide whether a URL should be prefetched
pub fn should_include(url: &str, include: &PatternSet, exclude: &PatternSet) -> bool {
    let is_included = include.is_empty() || include.is_match(url);
    let is_excluded = exclude.is_match(url);

    is_included && !is_excluded
}

/// Keep only the URLs that pass the include/exclude rules, preserving order
pub fn filter_urls(
    urls: Vec<ResolvedUrl>,
    include: &PatternSet,
    exclude: &PatternSet,
) -> Vec<ResolvedUrl> {
    urls.into_iter()
        .filter(|url| should_include(url.as_str(), include, exclude))
        .collect()
}

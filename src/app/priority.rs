//! Priority ordering of resolved URLs
//!
//! Each URL is ranked by the index of the first priority pattern found after
//! its origin. URLs no pattern matches rank after every ranked URL. Equal
//! ranks are ordered lexicographically by the full URL, and the sort is
//! stable so identical URLs keep their relative order.
//!
//! Patterns are searched in the part of the URL after the origin. Every
//! URL in a run shares the same origin, so a pattern like `c` would
//! otherwise rank every `https://example.com/...` URL identically.

use std::cmp::Ordering;

use crate::app::filter::PatternSet;
use crate::app::models::ResolvedUrl;

/// Rank assigned to a URL by the priority patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    /// Index of the first matching pattern
    Ranked(usize),
    /// No pattern matched; orders after every ranked URL
    Unranked,
}

/// Rank a single URL against the priority patterns
pub fn rank(url: &str, priorities: &PatternSet) -> Rank {
    priorities
        .first_match(ranking_target(url))
        .map_or(Rank::Unranked, Rank::Ranked)
}

/// Reorder URLs by priority; a no-op when there are no priority patterns
pub fn prioritize(urls: Vec<ResolvedUrl>, priorities: &PatternSet) -> Vec<ResolvedUrl> {
    if priorities.is_empty() {
        return urls;
    }

    let mut ranked: Vec<(Rank, ResolvedUrl)> = urls
        .into_iter()
        .map(|url| (rank(url.as_str(), priorities), url))
        .collect();

    // sort_by is stable
    ranked.sort_by(|(rank_a, a), (rank_b, b)| compare(*rank_a, a, *rank_b, b));

    ranked.into_iter().map(|(_, url)| url).collect()
}

fn compare(rank_a: Rank, a: &ResolvedUrl, rank_b: Rank, b: &ResolvedUrl) -> Ordering {
    rank_a.cmp(&rank_b).then_with(|| a.as_str().cmp(b.as_str()))
}

/// Everything after the authority of an absolute URL, or the whole string
fn ranking_target(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            match url[authority_start..].find(['/', '?', '#']) {
                Some(offset) => &url[authority_start + offset..],
                None => "",
            }
        }
        None => url,
    }
}

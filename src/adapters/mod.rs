//! Source adapters (C2): one client per external catalog, each normalizing
//! responses into `Citation` and declaring its `api_source` label.

pub mod crossref;
pub mod grounded_web;
pub mod semantic_scholar;
pub mod serp;

use crate::client::ApiError;
use crate::store::Citation;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

fn repetitive_initials_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z]\.\s*){6,}$").unwrap())
}

fn domain_author_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9.-]+\.(com|org|gov|edu|net|io|ai)$").unwrap())
}

/// Name-sanity predicate shared by every adapter: rejects single-letter
/// repeating-initials sequences and domain-looking tokens.
pub fn author_is_sane(author: &str) -> bool {
    let trimmed = author.trim();
    if trimmed.is_empty() {
        return false;
    }
    !repetitive_initials_re().is_match(trimmed) && !domain_author_re().is_match(&trimmed.to_lowercase())
}

/// Confidence score in [0,1] from DOI presence, venue, publisher, author
/// count, and (optionally) citation count. Used by adapters to annotate
/// results, not stored on `Citation` itself (which has no such field; it
/// is exposed to callers via `AdapterResult`).
pub fn confidence_score(
    has_doi: bool,
    has_venue: bool,
    has_publisher: bool,
    author_count: usize,
    citation_count: Option<u64>,
) -> f64 {
    let mut score = 0.0;
    if has_doi {
        score += 0.35;
    }
    if has_venue {
        score += 0.25;
    }
    if has_publisher {
        score += 0.15;
    }
    if author_count > 0 {
        score += 0.15;
    }
    if let Some(count) = citation_count {
        if count > 0 {
            score += 0.10;
        }
    }
    score.min(1.0)
}

#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub citation: Citation,
    pub confidence: f64,
}

/// Common adapter contract: `search(query) -> list[Citation]` plus the
/// `api_source` label it stamps on every result.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn api_source(&self) -> &'static str;
    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_sanity_rejects_repetitive_initials_and_domains() {
        assert!(!author_is_sane("A. A. A. A. A. A."));
        assert!(!author_is_sane("mckinsey.com"));
        assert!(author_is_sane("Jane Smith"));
    }

    #[test]
    fn confidence_score_caps_at_one() {
        assert_eq!(confidence_score(true, true, true, 5, Some(10)), 1.0);
        assert_eq!(confidence_score(false, false, false, 0, None), 0.0);
    }
}

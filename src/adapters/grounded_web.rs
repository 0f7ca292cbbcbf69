//! Grounded-Web adapter: wraps an `LLMPlanner`-style web-search tool capability,
//! parsing tool-returned citations and flagging weak ones for C8 enrichment.

use super::{author_is_sane, AdapterResult, SourceAdapter};
use crate::client::ApiError;
use crate::store::{Citation, SourceType};
use async_trait::async_trait;
use chrono::Datelike;
use regex::Regex;
use std::sync::OnceLock;

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9.-]+\.(com|org|gov|edu|net|io|ai)$").unwrap())
}

/// A single raw citation as returned by the grounded web-search tool, before
/// normalization into `Citation`.
#[derive(Debug, Clone)]
pub struct GroundedToolResult {
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
}

/// Capability the LLM planner's web-search tool implements. Kept narrow: a
/// pure query-in, raw-results-out contract, same shape as `LLMPlanner`.
#[async_trait]
pub trait GroundedWebTool: Send + Sync {
    async fn web_search(&self, query: &str) -> Result<Vec<GroundedToolResult>, ApiError>;
}

pub struct GroundedWebAdapter<'a> {
    tool: &'a dyn GroundedWebTool,
}

impl<'a> GroundedWebAdapter<'a> {
    pub fn new(tool: &'a dyn GroundedWebTool) -> Self {
        GroundedWebAdapter { tool }
    }
}

fn looks_like_domain(text: &str) -> bool {
    domain_re().is_match(&text.trim().to_lowercase())
}

#[async_trait]
impl<'a> SourceAdapter for GroundedWebAdapter<'a> {
    fn api_source(&self) -> &'static str {
        "grounded-web"
    }

    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError> {
        let raw = self.tool.web_search(query).await?;
        Ok(raw.into_iter().filter_map(Self::to_citation).collect())
    }
}

impl<'a> GroundedWebAdapter<'a> {
    fn to_citation(result: GroundedToolResult) -> Option<AdapterResult> {
        // Discard results whose "title" is a bare domain or whose "author"
        // equals the domain; these are unrecoverable without enrichment.
        if looks_like_domain(&result.title) && result.author.as_deref().map(looks_like_domain).unwrap_or(true) {
            return None;
        }
        let author = result.author.unwrap_or_else(|| "Unknown".to_string());
        let authors = if author_is_sane(&author) || looks_like_domain(&author) {
            vec![author]
        } else {
            return None;
        };
        let year = result.year.unwrap_or_else(|| chrono::Utc::now().year());

        let citation = Citation {
            id: String::new(),
            authors,
            year,
            title: result.title,
            source_type: SourceType::Website,
            journal: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: None,
            url: result.url,
            access_date: None,
            abstract_text: None,
            api_source: Some("grounded-web".to_string()),
            language: None,
        };

        // Grounded-web records start with low confidence; C8 enrichment and
        // C9 filtering decide whether they survive.
        Some(AdapterResult { citation, confidence: 0.3 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discards_bare_domain_title_with_domain_author() {
        let result = GroundedToolResult {
            title: "mckinsey.com".to_string(),
            author: Some("mckinsey.com".to_string()),
            year: Some(2022),
            url: Some("https://mckinsey.com".to_string()),
        };
        assert!(GroundedWebAdapter::to_citation(result).is_none());
    }

    #[test]
    fn keeps_real_title_even_with_weak_author() {
        let result = GroundedToolResult {
            title: "The Future of Remote Work".to_string(),
            author: Some("mckinsey.com".to_string()),
            year: Some(2022),
            url: Some("https://mckinsey.com/insights".to_string()),
        };
        let citation = GroundedWebAdapter::to_citation(result).unwrap();
        assert_eq!(citation.citation.title, "The Future of Remote Work");
    }
}

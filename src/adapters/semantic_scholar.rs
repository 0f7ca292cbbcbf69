//! Scholarly-B (Semantic-Scholar-like) adapter: AI-ranked results; infers
//! `source_type` from venue keywords when the API omits a publication type.

use super::{author_is_sane, confidence_score, AdapterResult, SourceAdapter};
use crate::client::{ApiError, RateLimitedClient, RetryPolicy};
use crate::store::{Citation, SourceType};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const RPS: f64 = 5.0;
const LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<PaperItem>,
}

#[derive(Debug, Deserialize)]
struct PaperItem {
    title: Option<String>,
    authors: Option<Vec<AuthorItem>>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
    #[serde(rename = "publicationTypes")]
    publication_types: Option<Vec<String>>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AuthorItem {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

fn infer_source_type(venue: &str, publication_types: &[String]) -> SourceType {
    if publication_types.iter().any(|t| t == "Conference") {
        return SourceType::Conference;
    }
    if publication_types.iter().any(|t| t == "JournalArticle") {
        return SourceType::Journal;
    }
    let venue_lower = venue.to_lowercase();
    if venue_lower.contains("conference") || venue_lower.contains("proceedings") || venue_lower.contains("symposium")
    {
        SourceType::Conference
    } else if venue_lower.contains("journal") {
        SourceType::Journal
    } else {
        SourceType::Journal
    }
}

pub fn enabled() -> bool {
    std::env::var("ENABLE_SEMANTIC_SCHOLAR")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

pub struct SemanticScholarAdapter {
    client: RateLimitedClient,
    api_key: Option<String>,
}

impl Default for SemanticScholarAdapter {
    fn default() -> Self {
        SemanticScholarAdapter {
            client: RateLimitedClient::new(
                RPS,
                RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_secs(1),
                    max_delay: Duration::from_secs(20),
                },
            ),
            api_key: std::env::var("SCHOLAR_KEY").ok(),
        }
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn api_source(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError> {
        if !enabled() {
            return Err(ApiError::Permanent {
                status: 0,
                message: "semantic scholar adapter disabled via ENABLE_SEMANTIC_SCHOLAR".to_string(),
            });
        }
        let limit = LIMIT.to_string();
        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|k| vec![("x-api-key", k)])
            .unwrap_or_default();

        let body = self
            .client
            .get(
                SEARCH_URL,
                &[
                    ("query", query),
                    ("limit", limit.as_str()),
                    ("fields", "title,authors,year,venue,externalIds,publicationTypes,citationCount"),
                ],
                &headers,
            )
            .await?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;

        Ok(parsed.data.into_iter().filter_map(Self::to_citation).collect())
    }
}

impl SemanticScholarAdapter {
    fn to_citation(item: PaperItem) -> Option<AdapterResult> {
        let title = item.title?;
        let year = item.year.filter(|&y| y > 0)?;
        let authors: Vec<String> = item
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|a| author_is_sane(a))
            .collect();
        if authors.is_empty() {
            return None;
        }

        let doi = item.external_ids.and_then(|e| e.doi);
        let publication_types = item.publication_types.unwrap_or_default();
        let venue = item.venue.unwrap_or_default();
        let source_type = infer_source_type(&venue, &publication_types);
        let confidence = confidence_score(doi.is_some(), !venue.is_empty(), false, authors.len(), item.citation_count);

        let citation = Citation {
            id: String::new(),
            authors,
            year,
            title,
            source_type,
            journal: if venue.is_empty() { None } else { Some(venue) },
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi,
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: Some("semantic_scholar".to_string()),
            language: None,
        };

        Some(AdapterResult { citation, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_conference_from_venue_keyword() {
        assert_eq!(infer_source_type("Proceedings of ICML", &[]), SourceType::Conference);
    }

    #[test]
    fn prefers_explicit_publication_type_over_venue_heuristic() {
        assert_eq!(
            infer_source_type("Some Venue", &["JournalArticle".to_string()]),
            SourceType::Journal
        );
    }

    #[test]
    fn enabled_defaults_true_and_honors_false_override() {
        std::env::remove_var("ENABLE_SEMANTIC_SCHOLAR");
        assert!(enabled());
        std::env::set_var("ENABLE_SEMANTIC_SCHOLAR", "false");
        assert!(!enabled());
        std::env::remove_var("ENABLE_SEMANTIC_SCHOLAR");
    }
}

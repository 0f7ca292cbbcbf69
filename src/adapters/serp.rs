//! SERP-fallback adapter: generic search-engine-results-page extraction,
//! heuristic year/DOI extraction from the URL, and academic-vs-industry
//! classification by URL pattern. Credentials via `DATAFORSEO_LOGIN`/
//! `DATAFORSEO_PASSWORD`.

use super::{author_is_sane, AdapterResult, SourceAdapter};
use crate::client::{ApiError, RateLimitedClient, RetryPolicy};
use crate::store::{Citation, SourceType};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const SERP_URL: &str = "https://api.dataforseo.com/v3/serp/google/organic/live/advanced";
const RPS: f64 = 20.0;

const ACADEMIC_DOMAINS: &[&str] = &[
    "scholar.google", "jstor.org", "springer.com", "sciencedirect.com", "ncbi.nlm.nih.gov",
    "arxiv.org", "researchgate.net", "ieee.org", "acm.org",
];

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(19|20)\d{2}").unwrap())
}

fn doi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"10\.\d{4,9}/[^\s/?#]+").unwrap())
}

fn author_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bby\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})").unwrap())
}

fn author_et_al_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z][a-z]+)\s+et\s+al\.").unwrap())
}

/// Heuristic author extraction from a SERP snippet: "by Author Name" or
/// "Surname et al." Returns `None` when neither pattern matches.
fn extract_authors_from_snippet(snippet: &str) -> Option<String> {
    if snippet.is_empty() {
        return None;
    }
    if let Some(cap) = author_by_re().captures(snippet) {
        return Some(cap[1].to_string());
    }
    if let Some(cap) = author_et_al_re().captures(snippet) {
        return Some(format!("{} et al.", &cap[1]));
    }
    None
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

fn extract_year_from_url(url: &str) -> i32 {
    year_re()
        .find_iter(url)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|&y| (2000..=current_year() + 2).contains(&y))
        .unwrap_or(current_year())
}

fn extract_doi_from_url(url: &str) -> Option<String> {
    doi_re().find(url).map(|m| m.as_str().to_string())
}

fn classify_domain(url: &str) -> SourceType {
    if ACADEMIC_DOMAINS.iter().any(|d| url.contains(d)) {
        SourceType::Journal
    } else {
        SourceType::Website
    }
}

#[derive(Debug, Clone)]
struct SerpResultItem {
    title: String,
    url: String,
    snippet: String,
}

pub struct SerpAdapter {
    client: RateLimitedClient,
    login: Option<String>,
    password: Option<String>,
}

impl Default for SerpAdapter {
    fn default() -> Self {
        SerpAdapter {
            client: RateLimitedClient::new(
                RPS,
                RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_millis(500),
                    max_delay: Duration::from_secs(10),
                },
            ),
            login: std::env::var("DATAFORSEO_LOGIN").ok(),
            password: std::env::var("DATAFORSEO_PASSWORD").ok(),
        }
    }
}

#[async_trait]
impl SourceAdapter for SerpAdapter {
    fn api_source(&self) -> &'static str {
        "serp"
    }

    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError> {
        if self.login.is_none() || self.password.is_none() {
            return Err(ApiError::Permanent {
                status: 0,
                message: "DATAFORSEO_LOGIN/DATAFORSEO_PASSWORD not configured".to_string(),
            });
        }
        let body = self.client.get(SERP_URL, &[("q", query)], &[]).await?;
        let items = Self::parse_results(&body)?;
        Ok(items.into_iter().filter_map(Self::to_citation).collect())
    }
}

impl SerpAdapter {
    fn parse_results(body: &str) -> Result<Vec<SerpResultItem>, ApiError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        let items = value
            .pointer("/tasks/0/result/0/items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter_map(|item| {
                Some(SerpResultItem {
                    title: item.get("title")?.as_str()?.to_string(),
                    url: item.get("url")?.as_str()?.to_string(),
                    snippet: item
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect())
    }

    fn to_citation(item: SerpResultItem) -> Option<AdapterResult> {
        if item.title.trim().is_empty() {
            return None;
        }
        let year = extract_year_from_url(&item.url);
        let doi = extract_doi_from_url(&item.url);
        let source_type = classify_domain(&item.url);
        let extracted = extract_authors_from_snippet(&item.snippet);
        let authors = match extracted {
            Some(name) if author_is_sane(&name) => vec![name],
            _ => vec!["Unknown".to_string()],
        };

        let citation = Citation {
            id: String::new(),
            authors,
            year,
            title: item.title,
            source_type,
            journal: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi,
            url: Some(item.url),
            access_date: None,
            abstract_text: if item.snippet.is_empty() { None } else { Some(item.snippet) },
            api_source: Some("serp".to_string()),
            language: None,
        };

        Some(AdapterResult { citation, confidence: 0.2 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_year_from_url_path() {
        assert_eq!(extract_year_from_url("https://example.com/2021/report"), 2021);
    }

    #[test]
    fn extracts_doi_when_present() {
        assert_eq!(
            extract_doi_from_url("https://doi.org/10.1038/s41586-020-1234-5"),
            Some("10.1038/s41586-020-1234-5".to_string())
        );
    }

    #[test]
    fn classifies_known_academic_domains() {
        assert_eq!(classify_domain("https://arxiv.org/abs/1234"), SourceType::Journal);
        assert_eq!(classify_domain("https://example-company.com/blog"), SourceType::Website);
    }

    #[test]
    fn extracts_author_from_by_pattern() {
        assert_eq!(
            extract_authors_from_snippet("A deep dive into policy design, by John Smith, published 2021"),
            Some("John Smith".to_string())
        );
    }

    #[test]
    fn extracts_author_from_et_al_pattern() {
        assert_eq!(
            extract_authors_from_snippet("Smith et al. found that renewable adoption accelerated"),
            Some("Smith et al.".to_string())
        );
    }

    #[test]
    fn no_author_pattern_returns_none() {
        assert_eq!(extract_authors_from_snippet("A generic summary with no byline"), None);
        assert_eq!(extract_authors_from_snippet(""), None);
    }
}

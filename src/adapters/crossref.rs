//! Scholarly-A (Crossref-like) adapter: queries the works endpoint, selects
//! top-K by relevance, preserves DOI/title/authors/year/venue/type.

use super::{author_is_sane, confidence_score, AdapterResult, SourceAdapter};
use crate::client::{ApiError, RateLimitedClient, RetryPolicy};
use crate::store::{Citation, SourceType};
use async_trait::async_trait;
use serde::Deserialize;

const WORKS_URL: &str = "https://api.crossref.org/works";
const RPS: f64 = 10.0;
const TOP_K: usize = 5;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    items: Vec<WorkItem>,
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Vec<String>>,
    author: Option<Vec<AuthorItem>>,
    published: Option<DatePart>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    publisher: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorItem {
    family: Option<String>,
    given: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatePart {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<i32>>,
}

fn map_source_type(work_type: Option<&str>) -> SourceType {
    match work_type {
        Some("journal-article") => SourceType::Journal,
        Some("proceedings-article") => SourceType::Conference,
        Some("book") | Some("book-chapter") | Some("monograph") => SourceType::Book,
        Some("report") => SourceType::Report,
        _ => SourceType::Journal,
    }
}

fn author_name(a: &AuthorItem) -> Option<String> {
    match (&a.family, &a.given) {
        (Some(family), Some(given)) => Some(format!("{family}, {given}")),
        (Some(family), None) => Some(family.clone()),
        _ => None,
    }
}

pub struct CrossrefAdapter {
    client: RateLimitedClient,
}

impl Default for CrossrefAdapter {
    fn default() -> Self {
        CrossrefAdapter {
            client: RateLimitedClient::new(
                RPS,
                RetryPolicy {
                    max_attempts: 3,
                    ..Default::default()
                },
            ),
        }
    }
}

#[async_trait]
impl SourceAdapter for CrossrefAdapter {
    fn api_source(&self) -> &'static str {
        "crossref"
    }

    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError> {
        let top_k = TOP_K.to_string();
        let body = self
            .client
            .get(
                WORKS_URL,
                &[
                    ("query", query),
                    ("rows", top_k.as_str()),
                    ("sort", "relevance"),
                    (
                        "select",
                        "DOI,title,author,published,container-title,publisher,volume,issue,page,type",
                    ),
                ],
                &[],
            )
            .await?;

        let parsed: WorksResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;

        let results = parsed
            .message
            .items
            .into_iter()
            .filter_map(|item| self.to_citation(item))
            .collect();
        Ok(results)
    }
}

impl CrossrefAdapter {
    fn to_citation(&self, item: WorkItem) -> Option<AdapterResult> {
        let title = item.title.and_then(|t| t.into_iter().next())?;
        let authors: Vec<String> = item
            .author
            .unwrap_or_default()
            .iter()
            .filter_map(author_name)
            .filter(|a| author_is_sane(a))
            .collect();
        if authors.is_empty() {
            return None;
        }
        let year = item
            .published
            .and_then(|d| d.date_parts.into_iter().next())
            .and_then(|parts| parts.first().copied())
            .unwrap_or(0);
        if year == 0 {
            return None;
        }

        let has_doi = item.doi.is_some();
        let has_venue = item.container_title.is_some();
        let has_publisher = item.publisher.is_some();
        let confidence = confidence_score(has_doi, has_venue, has_publisher, authors.len(), None);

        let citation = Citation {
            id: String::new(),
            authors,
            year,
            title,
            source_type: map_source_type(item.work_type.as_deref()),
            journal: item.container_title.and_then(|t| t.into_iter().next()),
            publisher: item.publisher,
            volume: item.volume,
            issue: item.issue,
            pages: item.page,
            doi: item.doi,
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: Some("crossref".to_string()),
            language: None,
        };

        Some(AdapterResult { citation, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_journal_article_type_to_journal_source_type() {
        assert_eq!(map_source_type(Some("journal-article")), SourceType::Journal);
        assert_eq!(map_source_type(Some("book")), SourceType::Book);
        assert_eq!(map_source_type(Some("report")), SourceType::Report);
    }

    #[test]
    fn author_name_prefers_family_given_format() {
        let a = AuthorItem {
            family: Some("Smith".to_string()),
            given: Some("Jane".to_string()),
        };
        assert_eq!(author_name(&a), Some("Smith, Jane".to_string()));
    }
}

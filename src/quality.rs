//! Quality filter & validator (C9): integrity predicates producing
//! `ValidationIssue`s, plus strict/lenient filtering.

use crate::blog;
use crate::store::{Citation, CitationDatabase};
use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const MAX_REASONABLE_AUTHORS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub citation_id: String,
    pub severity: Severity,
    pub issue_type: String,
    pub message: String,
}

fn repetitive_initials_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z]\.\s*){6,}$").unwrap())
}

fn initials_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z]\.\s*){1,3}$").unwrap())
}

fn domain_author_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(com|org|gov|edu|net|io|ai|co\.uk)(:443)?$").unwrap())
}

fn generic_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(a systematic review|a comprehensive study|an overview|a survey)$").unwrap()
    })
}

const PLACEHOLDER_TITLES: &[&str] = &[
    "untitled",
    "no title",
    "unknown",
    "[title]",
    "n/a",
    "article",
    "document",
];

const URL_ERROR_KEYWORDS: &[&str] = &[
    "error", "403", "404", "500", "503", "not-found", "forbidden",
];

pub struct CitationValidator {
    pub check_liveness: bool,
}

impl Default for CitationValidator {
    fn default() -> Self {
        CitationValidator {
            check_liveness: false,
        }
    }
}

impl CitationValidator {
    pub fn new(check_liveness: bool) -> Self {
        CitationValidator { check_liveness }
    }

    fn check_author_sanity(&self, citation: &Citation) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if citation.authors.len() > MAX_REASONABLE_AUTHORS {
            issues.push(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Critical,
                issue_type: "author_sanity".to_string(),
                message: format!(
                    "malformed: {} authors exceeds reasonable maximum of {}",
                    citation.authors.len(),
                    MAX_REASONABLE_AUTHORS
                ),
            });
            return issues;
        }

        for author in &citation.authors {
            let trimmed = author.trim();
            if repetitive_initials_re().is_match(trimmed) {
                issues.push(Self::issue(
                    citation,
                    "author_sanity",
                    format!("repetitive initials pattern: '{trimmed}'"),
                ));
            } else if initials_only_re().is_match(trimmed) {
                issues.push(Self::issue(
                    citation,
                    "author_sanity",
                    format!("initials-only author: '{trimmed}'"),
                ));
            } else if domain_author_re().is_match(&trimmed.to_lowercase()) {
                issues.push(Self::issue(
                    citation,
                    "author_sanity",
                    format!("domain-looking author: '{trimmed}'"),
                ));
            }
        }

        if citation.authors.len() >= 2 {
            let first = citation.authors[0].trim().to_lowercase();
            let last = citation
                .authors
                .last()
                .unwrap()
                .trim()
                .to_lowercase();
            if citation.authors.len() > 1 && first == last {
                issues.push(Self::issue(
                    citation,
                    "author_sanity",
                    "first and last author are identical".to_string(),
                ));
            }
        }

        issues
    }

    fn check_metadata_quality(&self, citation: &Citation) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let current_year = Utc::now().year();

        if citation.title.to_lowercase()
            == citation
                .authors
                .first()
                .map(|a| a.to_lowercase())
                .unwrap_or_default()
        {
            issues.push(Self::issue(
                citation,
                "invalid_metadata",
                "title equals author name".to_string(),
            ));
        }

        if citation.year < 1990 || citation.year > current_year + 2 {
            issues.push(Self::issue(
                citation,
                "metadata_quality",
                format!(
                    "year {} outside plausible range 1990..={}",
                    citation.year,
                    current_year + 2
                ),
            ));
        }

        if PLACEHOLDER_TITLES.contains(&citation.title.to_lowercase().as_str()) {
            issues.push(Self::issue(
                citation,
                "invalid_metadata",
                format!("placeholder title: '{}'", citation.title),
            ));
        }

        if let Some(url) = &citation.url {
            let url_lower = url.to_lowercase();
            if URL_ERROR_KEYWORDS.iter().any(|kw| url_lower.contains(kw)) {
                issues.push(Self::issue(
                    citation,
                    "invalid_metadata",
                    format!("url contains error keyword: '{url}'"),
                ));
            }
        }

        if generic_title_re().is_match(citation.title.trim()) {
            issues.push(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Warning,
                issue_type: "generic_title".to_string(),
                message: format!("generic/uninformative title: '{}'", citation.title),
            });
        }

        issues
    }

    fn issue(citation: &Citation, issue_type: &str, message: String) -> ValidationIssue {
        ValidationIssue {
            citation_id: citation.id.clone(),
            severity: Severity::Critical,
            issue_type: issue_type.to_string(),
            message,
        }
    }

    /// DOI liveness check; opt-in per spec's Open Questions. A live HTTP HEAD
    /// is the caller's responsibility via `doi_status`; this just interprets
    /// the result into an issue.
    pub fn interpret_doi_status(
        &self,
        citation: &Citation,
        status: Option<u16>,
    ) -> Option<ValidationIssue> {
        if !self.check_liveness {
            return None;
        }
        match status {
            Some(200..=299) => None,
            Some(_) => Some(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Critical,
                issue_type: "invalid_doi".to_string(),
                message: "DOI resolver did not return success".to_string(),
            }),
            None => Some(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Warning,
                issue_type: "doi_check_failed".to_string(),
                message: "network error while checking DOI".to_string(),
            }),
        }
    }

    pub fn interpret_url_status(
        &self,
        citation: &Citation,
        status: Option<u16>,
    ) -> Option<ValidationIssue> {
        if !self.check_liveness {
            return None;
        }
        match status {
            Some(200..=399) => None,
            Some(s) if (400..600).contains(&s) => Some(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Critical,
                issue_type: "invalid_url".to_string(),
                message: format!("url returned status {s}"),
            }),
            _ => Some(ValidationIssue {
                citation_id: citation.id.clone(),
                severity: Severity::Warning,
                issue_type: "url_check_failed".to_string(),
                message: "network error while checking url".to_string(),
            }),
        }
    }

    /// Runs all non-network predicates. Liveness checks are applied
    /// separately via `interpret_doi_status`/`interpret_url_status` once the
    /// caller has performed the (optional) network probes.
    pub fn validate_citation(&self, citation: &Citation) -> Vec<ValidationIssue> {
        let mut issues = self.check_author_sanity(citation);
        issues.extend(self.check_metadata_quality(citation));
        issues
    }
}

pub struct QualityFilter {
    validator: CitationValidator,
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedCitation {
    pub citation: Citation,
    pub reason: String,
    pub issue_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterStats {
    pub total_original: usize,
    pub total_filtered: usize,
    pub total_removed: usize,
    pub removal_reasons: std::collections::HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalReport {
    pub stats: FilterStats,
    pub removed_citations: Vec<RemovedCitation>,
}

impl QualityFilter {
    pub fn new(strict_mode: bool, check_liveness: bool) -> Self {
        QualityFilter {
            validator: CitationValidator::new(check_liveness),
            strict_mode,
        }
    }

    /// Strict mode removes on any critical issue; lenient mode removes only
    /// on `invalid_url`/`invalid_metadata`, per spec.
    pub fn should_filter(&self, issues: &[ValidationIssue]) -> Option<String> {
        if issues.is_empty() {
            return None;
        }
        if self.strict_mode {
            let critical: Vec<&ValidationIssue> = issues
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .collect();
            if !critical.is_empty() {
                let reasons: Vec<&str> = critical.iter().take(3).map(|i| i.message.as_str()).collect();
                return Some(reasons.join("; "));
            }
            return None;
        }
        issues
            .iter()
            .find(|i| i.issue_type == "invalid_url" || i.issue_type == "invalid_metadata")
            .map(|i| i.message.clone())
    }

    /// Filters a database in place, returning a removal report with the
    /// sidecar detail typically persisted alongside the filtered JSON
    /// document.
    pub fn filter_database(&self, db: &mut CitationDatabase) -> RemovalReport {
        let total_original = db.len();
        let mut stats = FilterStats {
            total_original,
            ..Default::default()
        };
        let mut removed_citations = Vec::new();

        let removed = db.remove_by(|citation| {
            let issues = self.validator.validate_citation(citation);
            if let Some(reason) = self.should_filter(&issues) {
                let issue_type = issues
                    .first()
                    .map(|i| i.issue_type.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                *stats.removal_reasons.entry(issue_type).or_insert(0) += 1;
                removed_citations.push(RemovedCitation {
                    citation: citation.clone(),
                    reason,
                    issue_count: issues.len(),
                });
                true
            } else {
                false
            }
        });

        stats.total_removed = removed.len();
        stats.total_filtered = total_original - removed.len();
        blog!(
            "Filter",
            "removed {} of {total_original}, {} remaining",
            stats.total_removed,
            stats.total_filtered
        );
        RemovalReport {
            stats,
            removed_citations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SourceType;

    fn citation(title: &str, authors: Vec<&str>, year: i32) -> Citation {
        Citation {
            id: "cite_001".to_string(),
            authors: authors.into_iter().map(String::from).collect(),
            year,
            title: title.to_string(),
            source_type: SourceType::Website,
            journal: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: None,
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: None,
            language: None,
        }
    }

    #[test]
    fn exactly_thirty_authors_accepted_thirty_one_flagged() {
        let validator = CitationValidator::default();
        let c30 = citation("ok", (0..30).map(|_| "Author Name").collect(), 2020);
        assert!(validator.check_author_sanity(&c30).is_empty());
        let c31 = citation("ok", (0..31).map(|_| "Author Name").collect(), 2020);
        assert_eq!(validator.check_author_sanity(&c31).len(), 1);
    }

    #[test]
    fn placeholder_title_is_invalid_metadata() {
        let validator = CitationValidator::default();
        let c = citation("Untitled", vec!["Doe, J"], 2020);
        let issues = validator.validate_citation(&c);
        assert!(issues.iter().any(|i| i.issue_type == "invalid_metadata"));
    }

    #[test]
    fn generic_titles_are_warnings_only() {
        let validator = CitationValidator::default();
        let c = citation("A Systematic Review", vec!["Doe, J"], 2020);
        let issues = validator.validate_citation(&c);
        let generic = issues.iter().find(|i| i.issue_type == "generic_title").unwrap();
        assert_eq!(generic.severity, Severity::Warning);
    }

    #[test]
    fn generic_title_suffix_flagged_even_with_real_prefix() {
        let validator = CitationValidator::default();
        let c = citation("Diabetes Management: A Systematic Review", vec!["Doe, J"], 2020);
        let issues = validator.validate_citation(&c);
        assert!(issues.iter().any(|i| i.issue_type == "generic_title"));
    }

    #[test]
    fn strict_mode_removes_any_critical_lenient_mode_is_narrower() {
        let strict = QualityFilter::new(true, false);
        let lenient = QualityFilter::new(false, false);
        let issues = vec![ValidationIssue {
            citation_id: "cite_001".to_string(),
            severity: Severity::Critical,
            issue_type: "author_sanity".to_string(),
            message: "bad author".to_string(),
        }];
        assert!(strict.should_filter(&issues).is_some());
        assert!(lenient.should_filter(&issues).is_none());
    }
}

//! Scout markdown report: summary, source breakdown, and per-source citation
//! listings, per the external output contract.

use crate::store::{Citation, CitationDatabase};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default)]
pub struct ScoutSummary {
    pub total_citations: usize,
    pub queries_attempted: usize,
    pub queries_failed: usize,
}

impl ScoutSummary {
    pub fn success_rate(&self) -> f64 {
        if self.queries_attempted == 0 {
            return 0.0;
        }
        let succeeded = self.queries_attempted.saturating_sub(self.queries_failed);
        succeeded as f64 / self.queries_attempted as f64 * 100.0
    }
}

fn group_by_source(db: &CitationDatabase) -> BTreeMap<String, Vec<&Citation>> {
    let mut groups: BTreeMap<String, Vec<&Citation>> = BTreeMap::new();
    for citation in db.iter() {
        let source = citation.api_source.clone().unwrap_or_else(|| "unknown".to_string());
        groups.entry(source).or_default().push(citation);
    }
    groups
}

fn render_citation_entry(out: &mut String, citation: &Citation) {
    let authors = if citation.authors.is_empty() {
        "Unknown".to_string()
    } else {
        citation.authors.join(", ")
    };
    let _ = writeln!(out, "- **{}** ({})", citation.title, citation.year);
    let _ = writeln!(out, "  - Authors: {authors}");
    if let Some(doi) = &citation.doi {
        let _ = writeln!(out, "  - DOI: {doi}");
    }
    if let Some(url) = &citation.url {
        let _ = writeln!(out, "  - URL: {url}");
    }
    if let Some(abstract_text) = &citation.abstract_text {
        let truncated: String = abstract_text.chars().take(280).collect();
        let _ = writeln!(out, "  - Abstract: {truncated}");
    }
}

/// Renders the Scout markdown report: summary, per-source breakdown, then one
/// listing section per source ordered alphabetically.
pub fn generate_scout_report(db: &CitationDatabase, summary: &ScoutSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Scout Report\n");
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- Total citations: {}", summary.total_citations);
    let _ = writeln!(
        out,
        "- Queries attempted: {} ({} failed)",
        summary.queries_attempted, summary.queries_failed
    );
    let _ = writeln!(out, "- Success rate: {:.1}%\n", summary.success_rate());

    let groups = group_by_source(db);
    let _ = writeln!(out, "## Source breakdown\n");
    for (source, citations) in &groups {
        let _ = writeln!(out, "- {source}: {} citations", citations.len());
    }
    out.push('\n');

    for (source, citations) in &groups {
        let _ = writeln!(out, "## {source}\n");
        for citation in citations {
            render_citation_entry(&mut out, citation);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CitationStyle, SourceType};

    fn sample_db() -> CitationDatabase {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        db.insert(Citation {
            id: String::new(),
            authors: vec!["Doe, Jane".to_string()],
            year: 2020,
            title: "A Study of Things".to_string(),
            source_type: SourceType::Journal,
            journal: Some("Journal of Things".to_string()),
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: Some("10.1/abc".to_string()),
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: Some("crossref".to_string()),
            language: None,
        })
        .unwrap();
        db.insert(Citation {
            id: String::new(),
            authors: vec!["Smith, John".to_string()],
            year: 2021,
            title: "Industry Trends".to_string(),
            source_type: SourceType::Website,
            journal: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: None,
            url: Some("https://example.com/trends".to_string()),
            access_date: None,
            abstract_text: None,
            api_source: Some("grounded-web".to_string()),
            language: None,
        })
        .unwrap();
        db
    }

    #[test]
    fn summary_includes_counts_and_success_rate() {
        let summary = ScoutSummary {
            total_citations: 2,
            queries_attempted: 10,
            queries_failed: 2,
        };
        assert_eq!(summary.success_rate(), 80.0);
    }

    #[test]
    fn report_groups_citations_by_source() {
        let db = sample_db();
        let summary = ScoutSummary {
            total_citations: db.len(),
            queries_attempted: 5,
            queries_failed: 0,
        };
        let report = generate_scout_report(&db, &summary);
        assert!(report.contains("## crossref"));
        assert!(report.contains("## grounded-web"));
        assert!(report.contains("A Study of Things"));
        assert!(report.contains("Industry Trends"));
    }

    #[test]
    fn zero_attempted_queries_has_zero_success_rate() {
        let summary = ScoutSummary::default();
        assert_eq!(summary.success_rate(), 0.0);
    }
}

//! Compiler (C11): deterministic replacement of `{cite_NNN}` and
//! `{cite_MISSING:topic}` placeholders, reference-list generation.

use crate::store::{Citation, CitationDatabase, CitationStyle};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn cite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{cite_(\d{3})\}").unwrap())
}

fn missing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{cite_MISSING:([^}]+)\}").unwrap())
}

fn placeholder_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^#+\s*(References|Literaturverzeichnis|Bibliograf[ií]a|R[ée]f[ée]rences)\s*\n+\s*(\[.*(to be completed|to be added).*\]|\.\.\.)?\s*$").unwrap()
    })
}

fn has_real_reference_content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(doi\.org/|\(\d{4}\)|et al\.|&\s+\w+,|\*[^*]+\*)").unwrap())
}

#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    pub text: String,
    pub missing_ids: Vec<String>,
    pub researched_topics: Vec<String>,
}

/// A single research call the compiler needs performed for a
/// `{cite_MISSING:topic}` placeholder. The compiler is deliberately
/// decoupled from the orchestrator's concurrency machinery: callers supply
/// a closure (or async fn pointer) that resolves one topic to a `Citation`.
pub trait MissingCitationResearcher {
    fn research(&self, topic: &str) -> Option<Citation>;
}

/// Step 1: resolve every unique `{cite_MISSING:topic}` occurrence by
/// allocating an id via the store and substituting every occurrence of that
/// topic with the new id's placeholder.
pub fn resolve_missing(
    text: &str,
    db: &mut CitationDatabase,
    researcher: &dyn MissingCitationResearcher,
) -> (String, Vec<String>) {
    let mut unique_topics: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    for cap in missing_re().captures_iter(text) {
        let topic = cap[1].trim().to_string();
        if seen.insert(topic.clone()) {
            unique_topics.push(topic);
        }
    }

    let mut result = text.to_string();
    let mut researched = Vec::new();
    for topic in unique_topics {
        if let Some(mut citation) = researcher.research(&topic) {
            citation.id = db.next_id();
            if let Ok(id) = db.insert(citation) {
                let pattern = format!("{{cite_MISSING:{topic}}}");
                result = result.replace(&pattern, &format!("{{{id}}}"));
                researched.push(topic);
            }
        }
    }
    (result, researched)
}

fn format_apa_in_text(citation: &Citation) -> String {
    match citation.authors.len() {
        0 => format!("(Unknown, {})", citation.year),
        1 => format!("({}, {})", first_surname(&citation.authors[0]), citation.year),
        2 => format!(
            "({} & {}, {})",
            first_surname(&citation.authors[0]),
            first_surname(&citation.authors[1]),
            citation.year
        ),
        _ => format!("({} et al., {})", first_surname(&citation.authors[0]), citation.year),
    }
}

fn format_ieee_in_text(citation: &Citation) -> String {
    let n: &str = citation.id.strip_prefix("cite_").unwrap_or(&citation.id);
    let n = n.trim_start_matches('0');
    format!("[{}]", if n.is_empty() { "0" } else { n })
}

fn first_surname(author: &str) -> String {
    author.split(',').next().unwrap_or(author).trim().to_string()
}

/// Step 2: replace every `{cite_NNN}` with an in-text citation formatted per
/// `citation_style`. Unknown ids become `[MISSING: cite_NNN]`.
pub fn substitute_in_text(text: &str, db: &CitationDatabase, style: CitationStyle) -> (String, Vec<String>) {
    let mut missing = Vec::new();
    let result = cite_re()
        .replace_all(text, |caps: &regex::Captures| {
            let id = format!("cite_{}", &caps[1]);
            match db.get(&id) {
                Some(citation) => match style {
                    CitationStyle::Apa7 | CitationStyle::Chicago | CitationStyle::Mla => {
                        format_apa_in_text(citation)
                    }
                    CitationStyle::Ieee => format_ieee_in_text(citation),
                },
                None => {
                    missing.push(id.clone());
                    format!("[MISSING: {id}]")
                }
            }
        })
        .into_owned();
    (result, missing)
}

fn extract_cited_ids(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for cap in cite_re().captures_iter(text) {
        let id = format!("cite_{}", &cap[1]);
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids
}

fn format_apa_reference(citation: &Citation) -> String {
    let authors = format_apa_author_list(&citation.authors);
    let year = format!("({})", citation.year);
    let doi_or_url = citation
        .doi
        .as_ref()
        .map(|d| format!("https://doi.org/{d}"))
        .or_else(|| citation.url.clone());

    let mut out = format!("{authors} {year}. {}.", citation.title);
    if let Some(journal) = &citation.journal {
        out.push_str(&format!(" *{journal}*"));
        if let Some(volume) = &citation.volume {
            out.push_str(&format!(", {volume}"));
            if let Some(issue) = &citation.issue {
                out.push_str(&format!("({issue})"));
            }
        }
        if let Some(pages) = &citation.pages {
            out.push_str(&format!(", {pages}"));
        }
        out.push('.');
    } else if let Some(publisher) = &citation.publisher {
        out.push_str(&format!(" {publisher}."));
    }
    if let Some(link) = doi_or_url {
        out.push(' ');
        out.push_str(&link);
    }
    out
}

fn format_apa_author_list(authors: &[String]) -> String {
    if authors.len() <= 7 {
        match authors.len() {
            0 => String::new(),
            1 => authors[0].clone(),
            _ => {
                let (last, rest) = authors.split_last().unwrap();
                format!("{} & {}", rest.join(", "), last)
            }
        }
    } else {
        let first_six = authors[..6].join(", ");
        let last = authors.last().unwrap();
        format!("{first_six}, ... & {last}")
    }
}

fn format_ieee_reference(n: usize, citation: &Citation) -> String {
    let authors = if citation.authors.len() <= 3 {
        citation.authors.join(", ")
    } else {
        format!("{} et al.", citation.authors[0])
    };
    let venue = citation.journal.clone().unwrap_or_default();
    let mut out = format!("[{n}] {authors}, \"{}\"", citation.title);
    if !venue.is_empty() {
        out.push_str(&format!(", *{venue}*"));
    }
    if let Some(volume) = &citation.volume {
        out.push_str(&format!(", vol. {volume}"));
    }
    if let Some(pages) = &citation.pages {
        out.push_str(&format!(", pp. {pages}"));
    }
    out.push_str(&format!(", {}.", citation.year));
    out
}

fn has_placeholder_references(section: &str) -> bool {
    placeholder_header_re().is_match(section)
}

fn has_content_full_references(section: &str) -> bool {
    has_real_reference_content_re().is_match(section)
}

/// Strips a stale placeholder `## References` header (and its
/// "[to be completed]"/"..." body, if any) so the generated list replaces it
/// in place instead of trailing it as a second section.
fn strip_placeholder_header(text: &str) -> String {
    placeholder_header_re().replace(text, "").into_owned()
}

/// Step 3: generate a reference list from cited ids only, alphabetized by
/// first author for APA7 or left in cite-order for IEEE. Avoids duplicating
/// an existing, already-populated references section.
pub fn generate_reference_list(text: &str, db: &CitationDatabase, style: CitationStyle) -> String {
    if has_content_full_references(text) && !has_placeholder_references(text) {
        return String::new();
    }

    let cited_ids = extract_cited_ids(text);
    let mut citations: Vec<&Citation> = cited_ids.iter().filter_map(|id| db.get(id)).collect();

    match style {
        CitationStyle::Ieee => {
            let lines: Vec<String> = cited_ids
                .iter()
                .enumerate()
                .filter_map(|(i, id)| db.get(id).map(|c| format_ieee_reference(i + 1, c)))
                .collect();
            format!("## References\n\n{}\n", lines.join("\n"))
        }
        _ => {
            citations.sort_by_key(|c| {
                c.authors
                    .first()
                    .map(|a| first_surname(a).to_lowercase())
                    .unwrap_or_default()
            });
            let lines: Vec<String> = citations.iter().map(|c| format_apa_reference(c)).collect();
            format!("## References\n\n{}\n", lines.join("\n\n"))
        }
    }
}

/// Top-level contract: resolves missing citations, substitutes placeholders,
/// and generates the reference list.
pub fn compile(
    text: &str,
    db: &mut CitationDatabase,
    style: CitationStyle,
    researcher: &dyn MissingCitationResearcher,
) -> CompileOutcome {
    let (after_missing, researched_topics) = resolve_missing(text, db, researcher);
    let (substituted, missing_ids) = substitute_in_text(&after_missing, db, style);
    let reference_list = generate_reference_list(&substituted, db, style);

    let final_text = if reference_list.is_empty() {
        substituted
    } else {
        let body = if has_placeholder_references(&substituted) {
            strip_placeholder_header(&substituted)
        } else {
            substituted
        };
        format!("{}\n\n{reference_list}", body.trim_end())
    };

    CompileOutcome {
        text: final_text,
        missing_ids,
        researched_topics,
    }
}

/// Counts cited vs. uncited ids and citation density, independent of a full
/// compile. Supplementary feature recovered from the original's coverage
/// report.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub cited_count: usize,
    pub uncited_count: usize,
    pub citation_density_per_1000_words: f64,
}

pub fn coverage_report(text: &str, db: &CitationDatabase) -> CoverageReport {
    let cited_ids: BTreeSet<String> = extract_cited_ids(text).into_iter().collect();
    let total_words = text.split_whitespace().count().max(1);
    CoverageReport {
        cited_count: cited_ids.len(),
        uncited_count: db.len().saturating_sub(cited_ids.len()),
        citation_density_per_1000_words: cited_ids.len() as f64 / total_words as f64 * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SourceType;

    struct NoopResearcher;
    impl MissingCitationResearcher for NoopResearcher {
        fn research(&self, _topic: &str) -> Option<Citation> {
            None
        }
    }

    struct FixedResearcher;
    impl MissingCitationResearcher for FixedResearcher {
        fn research(&self, topic: &str) -> Option<Citation> {
            Some(Citation {
                id: String::new(),
                authors: vec!["Researcher, A".to_string()],
                year: 2023,
                title: format!("A study of {topic}"),
                source_type: SourceType::Journal,
                journal: Some("Journal of Topics".to_string()),
                publisher: None,
                volume: None,
                issue: None,
                pages: None,
                doi: None,
                url: None,
                access_date: None,
                abstract_text: None,
                api_source: Some("crossref".to_string()),
                language: None,
            })
        }
    }

    fn db_with_one() -> CitationDatabase {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        db.insert(Citation {
            id: String::new(),
            authors: vec!["Doe, Jane".to_string()],
            year: 2020,
            title: "A Study of Things".to_string(),
            source_type: SourceType::Journal,
            journal: Some("Journal of Things".to_string()),
            publisher: None,
            volume: Some("12".to_string()),
            issue: Some("3".to_string()),
            pages: Some("100-110".to_string()),
            doi: Some("10.1/abc".to_string()),
            url: None,
            access_date: None,
            abstract_text: None,
            api_source: Some("crossref".to_string()),
            language: None,
        })
        .unwrap();
        db
    }

    #[test]
    fn substitutes_known_citation_apa() {
        let db = db_with_one();
        let (text, missing) = substitute_in_text("As shown in {cite_001}.", &db, CitationStyle::Apa7);
        assert_eq!(text, "As shown in (Doe, 2020).");
        assert!(missing.is_empty());
    }

    #[test]
    fn unknown_id_becomes_missing_marker() {
        let db = db_with_one();
        let (text, missing) = substitute_in_text("See {cite_099}.", &db, CitationStyle::Apa7);
        assert_eq!(text, "See [MISSING: cite_099].");
        assert_eq!(missing, vec!["cite_099".to_string()]);
    }

    #[test]
    fn ieee_style_uses_numeric_brackets() {
        let db = db_with_one();
        let (text, _) = substitute_in_text("See {cite_001}.", &db, CitationStyle::Ieee);
        assert_eq!(text, "See [1].");
    }

    #[test]
    fn resolves_missing_placeholder_and_allocates_id() {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        let (text, researched) =
            resolve_missing("Topic X {cite_MISSING:quantum computing}.", &mut db, &FixedResearcher);
        assert_eq!(researched, vec!["quantum computing".to_string()]);
        assert_eq!(text, "Topic X {cite_001}.");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn unresolvable_missing_topic_leaves_placeholder_untouched() {
        let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
        let (text, researched) = resolve_missing("Topic X {cite_MISSING:obscure topic}.", &mut db, &NoopResearcher);
        assert!(researched.is_empty());
        assert!(text.contains("cite_MISSING:obscure topic"));
    }

    #[test]
    fn compile_is_idempotent_on_already_compiled_text() {
        let mut db = db_with_one();
        let once = compile("See {cite_001}.", &mut db, CitationStyle::Apa7, &NoopResearcher);
        let mut db2 = db_with_one();
        let twice = compile(&once.text, &mut db2, CitationStyle::Apa7, &NoopResearcher);
        assert_eq!(once.text.trim(), twice.text.trim());
    }

    #[test]
    fn reference_list_not_duplicated_when_real_content_present() {
        let db = db_with_one();
        let text = "Body text.\n\n## References\n\nDoe, J. (2020). A Study of Things. https://doi.org/10.1/abc";
        let list = generate_reference_list(text, &db, CitationStyle::Apa7);
        assert!(list.is_empty());
    }

    #[test]
    fn placeholder_references_header_is_replaced_in_place() {
        let mut db = db_with_one();
        let text = "Body text citing {cite_001}.\n\n## References\n\n[to be completed]\n";
        let compiled = compile(text, &mut db, CitationStyle::Apa7, &NoopResearcher);
        assert_eq!(compiled.text.matches("## References").count(), 1);
        assert!(!compiled.text.contains("to be completed"));
        assert!(compiled.text.contains("Doe, Jane (2020)"));
    }
}

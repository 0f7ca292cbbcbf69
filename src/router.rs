//! Query router (C4): a pure, stateless classifier mapping a query string to
//! `{academic, industry, mixed}` plus an ordered adapter chain. Performs no
//! I/O.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Academic,
    Industry,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterName {
    Crossref,
    SemanticScholar,
    GroundedWeb,
    Serp,
}

#[derive(Debug, Clone)]
pub struct QueryClassification {
    pub query_type: QueryType,
    pub confidence: f64,
    pub matched_patterns: Vec<String>,
    pub api_chain: Vec<AdapterName>,
}

// Representative subsets of the pattern families the original classifier
// uses; kept short but covering every category it checks.
const INDUSTRY_PATTERNS: &[&str] = &[
    "consulting",
    "mckinsey",
    "deloitte",
    "pwc",
    "accenture",
    "think tank",
    "white paper",
    "market report",
    "industry report",
    "world bank",
    "imf",
    "oecd",
    "united nations",
    "regulatory",
    "government",
    "policy brief",
    "iso standard",
    "ieee standard",
    "annual report",
    "press release",
    "business case",
    "case study",
    "startup",
    "enterprise",
    "gartner",
    "forrester",
];

const ACADEMIC_PATTERNS: &[&str] = &[
    "journal of",
    "proceedings of",
    "peer-reviewed",
    "systematic review",
    "meta-analysis",
    "methodology",
    "empirical study",
    "literature review",
    "doi:",
    "arxiv",
    "pubmed",
    "google scholar",
    "hypothesis",
    "regression analysis",
    "econometric",
    "theorem",
    "algorithm complexity",
    "neural network",
    "sociological",
    "psychological study",
    "climate model",
    "ecological",
];

fn count_matches(query_lower: &str, patterns: &[&str]) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| query_lower.contains(*p))
        .map(|p| p.to_string())
        .collect()
}

pub fn classify_query(query: &str) -> QueryClassification {
    let query_lower = query.to_lowercase();
    let industry_matches = count_matches(&query_lower, INDUSTRY_PATTERNS);
    let academic_matches = count_matches(&query_lower, ACADEMIC_PATTERNS);

    let (query_type, confidence, matched_patterns) =
        match (industry_matches.len(), academic_matches.len()) {
            (0, 0) => (QueryType::Mixed, 0.3, Vec::new()),
            (i, 0) if i > 0 => (
                QueryType::Industry,
                (0.5 + i as f64 * 0.1).min(0.9),
                industry_matches,
            ),
            (0, a) if a > 0 => (
                QueryType::Academic,
                (0.5 + a as f64 * 0.1).min(0.9),
                academic_matches,
            ),
            (i, a) if i > a => (QueryType::Industry, 0.6, industry_matches),
            (i, a) if a > i => (QueryType::Academic, 0.6, academic_matches),
            (_, _) => {
                let mut both = industry_matches;
                both.extend(academic_matches);
                (QueryType::Mixed, 0.5, both)
            }
        };

    QueryClassification {
        query_type,
        confidence,
        matched_patterns,
        api_chain: api_chain_for(query_type),
    }
}

pub fn api_chain_for(query_type: QueryType) -> Vec<AdapterName> {
    match query_type {
        QueryType::Industry => vec![
            AdapterName::GroundedWeb,
            AdapterName::SemanticScholar,
            AdapterName::Crossref,
        ],
        QueryType::Academic => vec![
            AdapterName::Crossref,
            AdapterName::SemanticScholar,
            AdapterName::GroundedWeb,
        ],
        QueryType::Mixed => vec![
            AdapterName::SemanticScholar,
            AdapterName::GroundedWeb,
            AdapterName::Crossref,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_industry_patterns_classify_industry() {
        let c = classify_query("McKinsey consulting market report on fintech");
        assert_eq!(c.query_type, QueryType::Industry);
        assert!(c.confidence <= 0.9);
    }

    #[test]
    fn only_academic_patterns_classify_academic() {
        let c = classify_query("A systematic review and meta-analysis of journal of ecology");
        assert_eq!(c.query_type, QueryType::Academic);
    }

    #[test]
    fn no_matches_falls_back_to_mixed_low_confidence() {
        let c = classify_query("renewable energy trends");
        assert_eq!(c.query_type, QueryType::Mixed);
        assert_eq!(c.confidence, 0.3);
    }

    #[test]
    fn tie_between_equal_counts_is_mixed() {
        let c = classify_query("consulting doi:");
        assert_eq!(c.query_type, QueryType::Mixed);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn api_chains_match_spec_table() {
        assert_eq!(
            api_chain_for(QueryType::Academic),
            vec![
                AdapterName::Crossref,
                AdapterName::SemanticScholar,
                AdapterName::GroundedWeb
            ]
        );
        assert_eq!(
            api_chain_for(QueryType::Industry),
            vec![
                AdapterName::GroundedWeb,
                AdapterName::SemanticScholar,
                AdapterName::Crossref
            ]
        );
        assert_eq!(
            api_chain_for(QueryType::Mixed),
            vec![
                AdapterName::SemanticScholar,
                AdapterName::GroundedWeb,
                AdapterName::Crossref
            ]
        );
    }
}

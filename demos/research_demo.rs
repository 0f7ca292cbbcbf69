//! Minimal end-to-end wiring: a canned `LLMPlanner`, one mock adapter, a
//! full orchestrator run, and a compile pass over a draft with placeholders.

use anyhow::Result;
use async_trait::async_trait;
use cdcs::adapters::{AdapterResult, SourceAdapter};
use cdcs::client::ApiError;
use cdcs::compiler::{self, MissingCitationResearcher};
use cdcs::planner::{LLMPlanner, PlannerError, ResearchPlan};
use cdcs::router::AdapterName;
use cdcs::store::{Citation, CitationDatabase, CitationStyle, SourceType};
use cdcs::{orchestrator, AdapterRegistry, OrchestratorConfig};
use std::sync::Arc;
use std::time::Duration;

struct CannedPlanner;

#[async_trait]
impl LLMPlanner for CannedPlanner {
    async fn plan(&self, request: &cdcs::PlanRequest, _timeout: Duration) -> Result<ResearchPlan, PlannerError> {
        Ok(ResearchPlan {
            strategy: format!("survey of {}", request.topic),
            queries: (0..12).map(|i| format!("{} aspect {i}", request.topic)).collect(),
            outline: "introduction, background, findings, conclusion".to_string(),
        })
    }
}

struct MockAdapter;

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn api_source(&self) -> &'static str {
        "crossref"
    }

    async fn search(&self, query: &str) -> Result<Vec<AdapterResult>, ApiError> {
        Ok(vec![AdapterResult {
            citation: Citation {
                id: String::new(),
                authors: vec!["Doe, Jane".to_string()],
                year: 2022,
                title: format!("A study of {query}"),
                source_type: SourceType::Journal,
                journal: Some("Journal of Demonstrations".to_string()),
                publisher: None,
                volume: None,
                issue: None,
                pages: None,
                doi: Some("10.1234/demo".to_string()),
                url: None,
                access_date: None,
                abstract_text: None,
                api_source: Some("crossref".to_string()),
                language: None,
            },
            confidence: 0.9,
        }])
    }
}

struct NoopResearcher;
impl MissingCitationResearcher for NoopResearcher {
    fn research(&self, _topic: &str) -> Option<Citation> {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let planner = CannedPlanner;
    let registry = AdapterRegistry::new().register(AdapterName::Crossref, Arc::new(MockAdapter));
    let backpressure = Arc::new(cdcs::backpressure::BackpressureManager::default());

    let outcome = orchestrator::research(
        "renewable energy policy".to_string(),
        None,
        vec![],
        5,
        OrchestratorConfig::default(),
        &planner,
        registry,
        backpressure,
    )
    .await?;

    let mut db = CitationDatabase::new(CitationStyle::Apa7, "en");
    for citation in outcome.citations {
        db.insert(citation)?;
    }

    let draft = "Recent policy shifts {cite_001} suggest {cite_MISSING:carbon pricing}.";
    let compiled = compiler::compile(draft, &mut db, CitationStyle::Apa7, &NoopResearcher);

    println!("{}", compiled.text);
    Ok(())
}

//! Citation Discovery & Compilation Subsystem: a concurrent, rate-limited,
//! multi-source citation research engine with deduplication, quality
//! filtering, metadata enrichment, and a deterministic citation-placeholder
//! compiler.
//!
//! The CLI, prose generation, outline/chapter composition, and PDF/DOCX
//! rendering are external collaborators and not part of this crate; see
//! `demos/` for a minimal end-to-end wiring example.

pub mod adapters;
pub mod backpressure;
pub mod client;
pub mod compiler;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod quality;
pub mod report;
pub mod router;
pub mod store;
pub mod ui;

pub use error::Error;
pub use orchestrator::{research, AdapterRegistry, OrchestratorConfig, ResearchOutcome};
pub use planner::{LLMPlanner, PlanRequest, ResearchPlan};
pub use store::{Citation, CitationDatabase, CitationStyle, SourceType};

pub type Result<T> = std::result::Result<T, Error>;

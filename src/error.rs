use thiserror::Error;

/// Top-level error aggregating every component's error type, for callers
/// that want one `Result` at the crate boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Client(#[from] crate::client::ApiError),

    #[error("citation store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("planner error: {0}")]
    Planner(#[from] crate::planner::PlannerError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

//! Research planner (C5): expands a topic into a diversified query set via a
//! caller-supplied `LLMPlanner` capability, validates coverage, and falls
//! back to a deterministic template-based plan on persistent failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub strategy: String,
    pub queries: Vec<String>,
    pub outline: String,
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub topic: String,
    pub scope: Option<String>,
    pub seed_references: Vec<String>,
    pub target_min: u32,
}

#[derive(Debug, Error, Clone)]
pub enum PlannerError {
    #[error("planner call timed out")]
    Timeout,
    #[error("planner refused the request on safety grounds")]
    SafetyBlocked,
    #[error("planner returned malformed JSON: {0}")]
    MalformedResponse(String),
    #[error("planner transport error: {0}")]
    Transport(String),
}

/// Narrow capability type the caller plugs in: a pure I/O sink to an LLM
/// that must respect the given timeout and surface a distinguished
/// "safety blocked" error so this module can attempt a rephrase.
#[async_trait]
pub trait LLMPlanner: Send + Sync {
    async fn plan(
        &self,
        request: &PlanRequest,
        timeout: Duration,
    ) -> Result<ResearchPlan, PlannerError>;
}

const DEFAULT_PLANNER_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_SAFETY_RETRIES: u32 = 3;

/// Fixed substitution table used to rephrase a topic toward academic framing
/// when the planner reports a safety block, applied in order until one
/// substring matches.
const SAFETY_REPHRASE_TABLE: &[(&str, &str)] = &[
    ("hack", "security vulnerability analysis"),
    ("exploit", "security weakness assessment"),
    ("attack", "adversarial technique analysis"),
    ("weapon", "defense technology analysis"),
    ("kill", "lethality factor analysis"),
];

fn rephrase(topic: &str) -> Option<String> {
    let lower = topic.to_lowercase();
    for (needle, replacement) in SAFETY_REPHRASE_TABLE {
        if lower.contains(needle) {
            return Some(lower.replacen(needle, replacement, 1));
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryForm {
    Specific,
    Topic,
    Broad,
}

fn classify_form(query: &str) -> QueryForm {
    if query.contains("author:") || query.contains("title:") {
        QueryForm::Specific
    } else if query.split_whitespace().count() <= 3 {
        QueryForm::Broad
    } else {
        QueryForm::Topic
    }
}

fn coverage_weight(form: QueryForm) -> f64 {
    match form {
        QueryForm::Specific => 1.5,
        QueryForm::Topic => 3.0,
        QueryForm::Broad => 6.0,
    }
}

pub fn estimate_coverage(queries: &[String]) -> f64 {
    queries.iter().map(|q| coverage_weight(classify_form(q))).sum()
}

pub fn plan_is_valid(plan: &ResearchPlan, target_min: u32) -> bool {
    plan.queries.len() >= 10 && estimate_coverage(&plan.queries) >= 0.7 * target_min as f64
}

fn fallback_plan(request: &PlanRequest) -> ResearchPlan {
    let topic = &request.topic;
    let templates = [
        format!("\"{topic}\""),
        format!("{topic} research"),
        format!("{topic} analysis"),
        format!("{topic} review"),
        format!("{topic} industry report"),
        format!("{topic} academic study"),
        format!("{topic} systematic review"),
        format!("{topic} case study"),
        format!("{topic} trends"),
        format!("{topic} methodology"),
        format!("{topic} overview"),
        format!("{topic} implications"),
    ];
    ResearchPlan {
        strategy: format!("deterministic fallback plan for '{topic}'"),
        queries: templates.to_vec(),
        outline: format!("Overview of {topic}"),
    }
}

/// Produces a validated `ResearchPlan`, retrying through safety-block
/// rephrases and, on persistent failure, falling back to the deterministic
/// template plan. One refinement attempt is allowed if the initial plan
/// fails coverage validation.
pub async fn build_plan(
    planner: &dyn LLMPlanner,
    mut request: PlanRequest,
    timeout: Option<Duration>,
) -> ResearchPlan {
    let timeout = timeout.unwrap_or(DEFAULT_PLANNER_TIMEOUT);
    let mut attempts = 0;

    loop {
        match planner.plan(&request, timeout).await {
            Ok(plan) => {
                if plan_is_valid(&plan, request.target_min) {
                    return plan;
                }
                // One refinement attempt: re-ask with a widened scope hint.
                request.scope = Some(format!(
                    "{} (broaden: include more specific and broad query forms)",
                    request.scope.clone().unwrap_or_default()
                ));
                match planner.plan(&request, timeout).await {
                    Ok(refined) if plan_is_valid(&refined, request.target_min) => return refined,
                    _ => return fallback_plan(&request),
                }
            }
            Err(PlannerError::SafetyBlocked) if attempts < MAX_SAFETY_RETRIES => {
                attempts += 1;
                match rephrase(&request.topic) {
                    Some(rephrased) => request.topic = rephrased,
                    None => return fallback_plan(&request),
                }
            }
            Err(PlannerError::Timeout) | Err(PlannerError::SafetyBlocked) => {
                return fallback_plan(&request);
            }
            Err(_) => return fallback_plan(&request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedPlanner {
        plan: ResearchPlan,
    }

    #[async_trait]
    impl LLMPlanner for FixedPlanner {
        async fn plan(
            &self,
            _request: &PlanRequest,
            _timeout: Duration,
        ) -> Result<ResearchPlan, PlannerError> {
            Ok(self.plan.clone())
        }
    }

    struct SafetyBlockedThenOkPlanner {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMPlanner for SafetyBlockedThenOkPlanner {
        async fn plan(
            &self,
            request: &PlanRequest,
            _timeout: Duration,
        ) -> Result<ResearchPlan, PlannerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Err(PlannerError::SafetyBlocked)
            } else {
                Ok(ResearchPlan {
                    strategy: "ok".to_string(),
                    queries: (0..12).map(|i| format!("{} query {i}", request.topic)).collect(),
                    outline: "outline".to_string(),
                })
            }
        }
    }

    fn request(topic: &str) -> PlanRequest {
        PlanRequest {
            topic: topic.to_string(),
            scope: None,
            seed_references: vec![],
            target_min: 50,
        }
    }

    #[tokio::test]
    async fn valid_plan_is_returned_unchanged() {
        let planner = FixedPlanner {
            plan: ResearchPlan {
                strategy: "s".to_string(),
                queries: (0..12).map(|i| format!("topic broad query {i}")).collect(),
                outline: "o".to_string(),
            },
        };
        let plan = build_plan(&planner, request("climate policy"), None).await;
        assert!(plan_is_valid(&plan, 50));
    }

    #[tokio::test]
    async fn safety_block_triggers_rephrase_then_succeeds() {
        let planner = SafetyBlockedThenOkPlanner {
            calls: AtomicU32::new(0),
        };
        let plan = build_plan(&planner, request("how to hack voting machines"), None).await;
        assert!(plan.strategy == "ok");
        assert!(plan.queries.iter().any(|q| q.contains("security vulnerability analysis")));
    }

    #[test]
    fn coverage_estimate_matches_weighting() {
        let queries = vec![
            "author:Smith".to_string(),
            "climate policy analysis methods".to_string(),
            "climate".to_string(),
        ];
        let coverage = estimate_coverage(&queries);
        assert!((coverage - (1.5 + 3.0 + 6.0)).abs() < 0.001);
    }

    #[test]
    fn fallback_plan_has_at_least_ten_queries() {
        let plan = fallback_plan(&request("quantum computing"));
        assert!(plan.queries.len() >= 10);
    }
}

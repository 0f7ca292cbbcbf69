//! Local defaults a caller may omit: worker count, timeouts, citation style.
//! Everything the environment recognizes that this crate itself consumes
//! (`PROXY_LIST`, `ENABLE_SEMANTIC_SCHOLAR`, `DATAFORSEO_LOGIN`/`PASSWORD`) is
//! read directly by the component that needs it, not funneled through this
//! file. `GEMINI_API_TIER` is not read here either: it belongs to whatever
//! concrete `LLMPlanner` a caller plugs in, which this crate only consumes as
//! a trait.

use crate::store::CitationStyle;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoProjectDirs,
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineDefaults {
    pub worker_count: usize,
    pub per_query_timeout_secs: u64,
    pub citation_style: CitationStyle,
    pub draft_language: String,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        EngineDefaults {
            worker_count: 8,
            per_query_timeout_secs: 20,
            citation_style: CitationStyle::Apa7,
            draft_language: "en".to_string(),
        }
    }
}

impl EngineDefaults {
    pub fn per_query_timeout(&self) -> Duration {
        Duration::from_secs(self.per_query_timeout_secs)
    }

    fn project_dirs() -> Result<ProjectDirs, ConfigError> {
        ProjectDirs::from("", "", "cdcs").ok_or(ConfigError::NoProjectDirs)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Loads local overrides if a config file exists; falls back to defaults
    /// silently otherwise, since no value here is required to run.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

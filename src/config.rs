use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Experiment-wide defaults. Every field may be omitted from the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub catalog_dir: PathBuf,
    pub session_dir: PathBuf,
    pub results_dir: PathBuf,
    pub trials_per_session: usize,
    /// Show per-trial scores to the participant (experimental group).
    pub feedback: bool,
    pub learning_curve_window: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from("data/trial_data"),
            session_dir: PathBuf::from("data/session_data"),
            results_dir: PathBuf::from("data/results"),
            trials_per_session: 5,
            feedback: false,
            learning_curve_window: 10,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials_per_session == 0 {
            return Err(ConfigError::Invalid(
                "trials_per_session must be at least 1".to_string(),
            ));
        }
        if self.learning_curve_window == 0 {
            return Err(ConfigError::Invalid(
                "learning_curve_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config/tests.rs"]
mod tests;

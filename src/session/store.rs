use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::ledger::ResultLedger;
use crate::model::{SessionDefinition, SessionKey};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to access session definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session definition {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session definition {path} is invalid: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("session definition {path} already exists and is never overwritten")]
    AlreadyExists { path: PathBuf },
}

/// Where definitions and ledgers of every session live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    pub session_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl SessionStore {
    pub fn new(session_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn definition_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir
            .join(format!("session_{}.json", key.file_stem()))
    }

    pub fn ledger_path(&self, key: &SessionKey) -> PathBuf {
        ResultLedger::ledger_path(&self.results_dir, key)
    }

    pub fn report_dir(&self, key: &SessionKey) -> PathBuf {
        self.results_dir
            .join(format!("report_{}", key.file_stem()))
    }

    /// Returns `Ok(None)` when no definition has been persisted for `key`.
    pub fn load_definition(
        &self,
        key: &SessionKey,
    ) -> Result<Option<SessionDefinition>, DefinitionError> {
        let path = self.definition_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(DefinitionError::Io { path, source }),
        };
        let definition: SessionDefinition =
            serde_json::from_slice(&bytes).map_err(|source| DefinitionError::Json {
                path: path.clone(),
                source,
            })?;

        if definition.key() != *key {
            return Err(DefinitionError::Invalid {
                message: format!(
                    "file belongs to session {} rather than {}",
                    definition.key().file_stem(),
                    key.file_stem()
                ),
                path,
            });
        }
        definition
            .validate()
            .map_err(|message| DefinitionError::Invalid {
                path: path.clone(),
                message,
            })?;

        debug!(
            "loaded session definition {} ({} trials)",
            path.display(),
            definition.trials.len()
        );
        Ok(Some(definition))
    }

    /// Persists a new definition. Fails if one already exists for its key.
    pub fn create_definition(
        &self,
        definition: &SessionDefinition,
    ) -> Result<PathBuf, DefinitionError> {
        let path = self.definition_path(&definition.key());
        definition
            .validate()
            .map_err(|message| DefinitionError::Invalid {
                path: path.clone(),
                message,
            })?;
        let bytes =
            serde_json::to_vec_pretty(definition).map_err(|source| DefinitionError::Json {
                path: path.clone(),
                source,
            })?;
        write_once(&path, &bytes)?;
        Ok(path)
    }
}

/// Temp file, fsync, then hard-link into place so an existing file is never
/// replaced and readers never observe a partial document.
fn write_once(path: &Path, bytes: &[u8]) -> Result<(), DefinitionError> {
    let io_err = |source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("definition");
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        name,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::hard_link(&tmp, path)
    })();
    let _ = fs::remove_file(&tmp);

    match result {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(DefinitionError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        Err(source) => return Err(io_err(source)),
    }

    if let Some(parent) = path.parent()
        && let Ok(dir) = fs::File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

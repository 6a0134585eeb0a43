//! Append-only CSV record of scored trials, one file per session key.
//!
//! The file is the only durable progress record: a trial counts as completed
//! once its row is on disk. Reopening the same file always yields the same
//! set of outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub mod row;

pub use row::LEDGER_HEADER;
use row::{decode_row, encode_row};

use crate::model::{SessionKey, TrialOutcome};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "could not record trial {trial_index} in ledger {path}: {source}; the trial stays pending and will be presented again on the next run"
    )]
    WriteFailure {
        path: PathBuf,
        trial_index: u32,
        #[source]
        source: io::Error,
    },
    #[error("trial {trial_index} is already recorded in ledger {path}")]
    DuplicateAppend { path: PathBuf, trial_index: u32 },
}

/// A ledger line that was skipped on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptLedgerRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// File absent or empty: the next append writes the header first.
    Empty,
    Clean,
    /// Last line has no terminator, e.g. after a crash mid-write.
    Torn,
}

#[derive(Debug)]
pub struct ResultLedger {
    path: PathBuf,
    outcomes: BTreeMap<u32, TrialOutcome>,
    corrupt: Vec<CorruptLedgerRow>,
}

impl ResultLedger {
    pub fn ledger_path(results_dir: &Path, key: &SessionKey) -> PathBuf {
        results_dir.join(format!("results_{}.csv", key.file_stem()))
    }

    /// Loads every well-formed row that `check` accepts; anything else is
    /// skipped as corrupt. A missing file is an empty ledger. The check runs
    /// before duplicate detection, so a rejected row never shadows a later
    /// valid row for the same trial.
    pub fn open<F>(path: impl Into<PathBuf>, check: F) -> Result<Self, LedgerError>
    where
        F: Fn(&TrialOutcome) -> Result<(), String>,
    {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        let mut ledger = Self {
            path,
            outcomes: BTreeMap::new(),
            corrupt: Vec::new(),
        };
        ledger.load(&bytes, &check);
        debug!(
            "ledger {}: {} outcomes, {} skipped rows",
            ledger.path.display(),
            ledger.len(),
            ledger.corrupt.len()
        );
        Ok(ledger)
    }

    fn load(&mut self, bytes: &[u8], check: &dyn Fn(&TrialOutcome) -> Result<(), String>) {
        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let text = String::from_utf8_lossy(raw);
            let line = text.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if line_no == 1 && line == LEDGER_HEADER {
                continue;
            }

            match decode_row(line).and_then(|outcome| check(&outcome).map(|()| outcome)) {
                Ok(outcome) => {
                    if line_no == 1 {
                        warn!(
                            "ledger {} has no header line; reading first line as data",
                            self.path.display()
                        );
                    }
                    if self.outcomes.contains_key(&outcome.trial_index) {
                        self.skip(
                            line_no,
                            format!(
                                "trial {} already recorded on an earlier line",
                                outcome.trial_index
                            ),
                        );
                        continue;
                    }
                    self.outcomes.insert(outcome.trial_index, outcome);
                }
                Err(reason) => self.skip(line_no, reason),
            }
        }
    }

    fn skip(&mut self, line: usize, reason: String) {
        warn!(
            "skipping ledger line {} of {}: {}",
            line,
            self.path.display(),
            reason
        );
        self.corrupt.push(CorruptLedgerRow { line, reason });
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn completed_indices(&self) -> BTreeSet<u32> {
        self.outcomes.keys().copied().collect()
    }

    pub fn contains(&self, trial_index: u32) -> bool {
        self.outcomes.contains_key(&trial_index)
    }

    /// Outcomes in ascending trial order.
    pub fn outcomes(&self) -> impl Iterator<Item = &TrialOutcome> {
        self.outcomes.values()
    }

    pub fn all_outcomes(&self) -> Vec<TrialOutcome> {
        self.outcomes.values().cloned().collect()
    }

    pub fn corrupt_rows(&self) -> &[CorruptLedgerRow] {
        &self.corrupt
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Durably appends one outcome. On error nothing is recorded in memory,
    /// so the trial remains pending.
    pub fn append(&mut self, outcome: &TrialOutcome) -> Result<(), LedgerError> {
        if self.outcomes.contains_key(&outcome.trial_index) {
            return Err(LedgerError::DuplicateAppend {
                path: self.path.clone(),
                trial_index: outcome.trial_index,
            });
        }

        self.write_line(&encode_row(outcome))
            .map_err(|source| LedgerError::WriteFailure {
                path: self.path.clone(),
                trial_index: outcome.trial_index,
                source,
            })?;

        self.outcomes.insert(outcome.trial_index, outcome.clone());
        Ok(())
    }

    fn write_line(&self, row: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut chunk = String::with_capacity(row.len() + LEDGER_HEADER.len() + 2);
        match probe_tail(&self.path)? {
            Tail::Empty => {
                chunk.push_str(LEDGER_HEADER);
                chunk.push('\n');
            }
            Tail::Torn => chunk.push('\n'),
            Tail::Clean => {}
        }
        chunk.push_str(row);
        chunk.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write_or_roll_back(&mut file, |f| {
            f.write_all(chunk.as_bytes())?;
            f.sync_data()
        })
    }
}

/// Runs `write` against `file`, truncating back to the original length if it
/// fails so a partial row never becomes a torn tail.
fn write_or_roll_back<F>(file: &mut File, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let prev_len = file.metadata()?.len();
    if let Err(err) = write(file) {
        if let Err(truncate) = file.set_len(prev_len) {
            warn!("could not roll back partial ledger write: {}", truncate);
        }
        return Err(err);
    }
    Ok(())
}

fn probe_tail(path: &Path) -> io::Result<Tail> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Tail::Empty),
        Err(err) => return Err(err),
    };
    if file.metadata()?.len() == 0 {
        return Ok(Tail::Empty);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(if last[0] == b'\n' {
        Tail::Clean
    } else {
        Tail::Torn
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/ledger/tests.rs"]
mod tests;

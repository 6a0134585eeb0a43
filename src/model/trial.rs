use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::category::{Category, ExperimentMode};
use crate::scoring::{Tally, TrialScore};

/// One trial of a session. Built once when the queue is materialized, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub trial_index: u32,
    pub category: Category,
    pub item_ref: String,
    /// Every sub-item shown in the trial, in display order.
    pub items: Vec<String>,
    pub ground_truth: BTreeSet<String>,
}

impl TrialSpec {
    pub fn universe_size(&self) -> usize {
        self.items.len()
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.items.iter().any(|item| item == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid participant id {0:?}: use letters, digits, '-' or '_'")]
pub struct InvalidParticipantId(pub String);

/// Identity of one resumable session; names both the definition and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub participant_id: String,
    pub session_number: u32,
    pub mode: ExperimentMode,
}

impl SessionKey {
    pub fn new(
        participant_id: &str,
        session_number: u32,
        mode: ExperimentMode,
    ) -> Result<Self, InvalidParticipantId> {
        let id = participant_id.trim();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(InvalidParticipantId(participant_id.to_string()));
        }
        Ok(Self {
            participant_id: id.to_string(),
            session_number,
            mode,
        })
    }

    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.participant_id, self.session_number, self.mode
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDefinition {
    pub participant_id: String,
    pub session_number: u32,
    pub mode: ExperimentMode,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub experience_level: Option<u8>,
    pub trials: Vec<TrialSpec>,
}

impl SessionDefinition {
    pub fn key(&self) -> SessionKey {
        SessionKey {
            participant_id: self.participant_id.clone(),
            session_number: self.session_number,
            mode: self.mode,
        }
    }

    pub fn indices(&self) -> BTreeSet<u32> {
        self.trials.iter().map(|t| t.trial_index).collect()
    }

    pub fn trial(&self, trial_index: u32) -> Option<&TrialSpec> {
        if trial_index == 0 {
            return None;
        }
        // Contiguity is checked on load, so position == index - 1.
        self.trials
            .get(trial_index as usize - 1)
            .filter(|t| t.trial_index == trial_index)
    }

    /// Checks that trial indices run 1..=N in order and that ground truth
    /// never names an item the trial does not show.
    pub fn validate(&self) -> Result<(), String> {
        if self.trials.is_empty() {
            return Err("session definition has no trials".to_string());
        }
        for (pos, trial) in self.trials.iter().enumerate() {
            let expected = pos as u32 + 1;
            if trial.trial_index != expected {
                return Err(format!(
                    "trial indices are not contiguous: position {} holds trial {}, expected {}",
                    pos + 1,
                    trial.trial_index,
                    expected
                ));
            }
            if let Some(stray) = trial
                .ground_truth
                .iter()
                .find(|id| !trial.contains_item(id))
            {
                return Err(format!(
                    "trial {}: ground truth item {:?} is not among the displayed items",
                    trial.trial_index, stray
                ));
            }
        }
        Ok(())
    }
}

/// Scored result of one trial as stored in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub trial_index: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub category: Category,
    pub response_set: BTreeSet<String>,
    pub ground_truth: BTreeSet<String>,
    pub score: TrialScore,
}

impl TrialOutcome {
    pub fn tally(&self) -> Tally {
        self.score.tally()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/trial.rs"]
mod tests;

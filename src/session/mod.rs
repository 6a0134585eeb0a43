//! Session lifecycle: materialize or reload the trial queue, skip what the
//! ledger already holds, and drive the rest through a [`Presenter`].

use std::collections::BTreeSet;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{info, warn};

pub mod presenter;
pub mod store;

pub use presenter::{
    ConsolePresenter, OutcomeEvent, OutcomeReceiver, PauseSignal, Presenter, outcome_channel,
};
pub use store::{DefinitionError, SessionStore};

use crate::catalog::{CatalogError, TrialCatalog};
use crate::ledger::{LedgerError, ResultLedger};
use crate::model::{Category, SessionDefinition, SessionKey, TrialOutcome, TrialSpec};
use crate::scoring::{RunningAggregate, ScoreError, score};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("trial {trial_index}: {source}")]
    Score {
        trial_index: u32,
        #[source]
        source: ScoreError,
    },
    #[error("presenter failed on trial {trial_index}: {source}")]
    Presentation {
        trial_index: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session plan: {0}")]
    InvalidPlan(String),
    #[error("session is {0:?}; load its definition first")]
    NotPrepared(SessionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    DefinitionLoaded,
    Running,
    Paused,
    Completed,
}

/// What to draw when a session is materialized for the first time. Ignored
/// once a definition exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub categories: BTreeSet<Category>,
    pub count: usize,
    pub seed: Option<u64>,
    pub experience_level: Option<u8>,
}

impl SessionPlan {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.count == 0 {
            return Err(SessionError::InvalidPlan(
                "trial count must be at least 1".to_string(),
            ));
        }
        if let Some(level) = self.experience_level
            && !(1..=4).contains(&level)
        {
            return Err(SessionError::InvalidPlan(format!(
                "experience level must be between 1 and 4, got {level}"
            )));
        }
        Ok(())
    }
}

pub struct SessionController {
    store: SessionStore,
    key: SessionKey,
    feedback: bool,
    state: SessionState,
    definition: Option<SessionDefinition>,
    ledger: Option<ResultLedger>,
    aggregate: RunningAggregate,
}

impl SessionController {
    pub fn new(store: SessionStore, key: SessionKey) -> Self {
        Self {
            store,
            key,
            feedback: false,
            state: SessionState::Uninitialized,
            definition: None,
            ledger: None,
            aggregate: RunningAggregate::new(),
        }
    }

    pub fn with_feedback(mut self, feedback: bool) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn definition(&self) -> Option<&SessionDefinition> {
        self.definition.as_ref()
    }

    pub fn ledger(&self) -> Option<&ResultLedger> {
        self.ledger.as_ref()
    }

    pub fn aggregate(&self) -> &RunningAggregate {
        &self.aggregate
    }

    /// `Uninitialized -> DefinitionLoaded`. Reloads the stored definition if
    /// there is one; otherwise draws a new trial set from the catalog and
    /// persists it before anything else happens. The catalog is only loaded
    /// in the second case.
    pub fn prepare<F>(&mut self, plan: &SessionPlan, load_catalog: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<TrialCatalog, CatalogError>,
    {
        let definition = match self.store.load_definition(&self.key)? {
            Some(existing) => {
                if plan_differs(&existing, plan) {
                    info!(
                        "session {} already defined; keeping its stored trial set and ignoring new plan options",
                        self.key.file_stem()
                    );
                }
                existing
            }
            None => {
                plan.validate()?;
                let catalog = load_catalog()?;
                let mut rng = match plan.seed {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                    None => ChaCha8Rng::from_entropy(),
                };
                let trials = catalog.build_trial_set(&plan.categories, plan.count, &mut rng)?;
                let definition = SessionDefinition {
                    participant_id: self.key.participant_id.clone(),
                    session_number: self.key.session_number,
                    mode: self.key.mode,
                    created_at: Utc::now(),
                    categories: plan.categories.iter().copied().collect(),
                    seed: plan.seed,
                    experience_level: plan.experience_level,
                    trials,
                };
                let path = self.store.create_definition(&definition)?;
                info!(
                    "created session definition {} with {} trials",
                    path.display(),
                    definition.trials.len()
                );
                definition
            }
        };

        self.load_ledger(definition)
    }

    /// Loads an existing session without ever creating one.
    pub fn open_existing(&mut self) -> Result<bool, SessionError> {
        match self.store.load_definition(&self.key)? {
            Some(definition) => {
                self.load_ledger(definition)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_ledger(&mut self, definition: SessionDefinition) -> Result<(), SessionError> {
        let ledger = ResultLedger::open(self.store.ledger_path(&self.key), |outcome| {
            match definition.trial(outcome.trial_index) {
                Some(trial) => check_outcome(trial, outcome),
                None => Ok(()),
            }
        })?;
        let indices = definition.indices();
        for stray in ledger.completed_indices().difference(&indices) {
            warn!(
                "ledger {} holds trial {} which is not part of the session definition; ignoring it",
                ledger.path().display(),
                stray
            );
        }
        self.aggregate =
            RunningAggregate::replay(ledger.outcomes().filter(|o| indices.contains(&o.trial_index)));
        self.definition = Some(definition);
        self.ledger = Some(ledger);
        self.state = SessionState::DefinitionLoaded;
        Ok(())
    }

    /// Definition indices without a ledger row, ascending.
    pub fn remaining(&self) -> Vec<u32> {
        match (&self.definition, &self.ledger) {
            (Some(definition), Some(ledger)) => definition
                .indices()
                .into_iter()
                .filter(|idx| !ledger.contains(*idx))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Completed outcomes that belong to the definition, ascending.
    pub fn completed_outcomes(&self) -> Vec<TrialOutcome> {
        match (&self.definition, &self.ledger) {
            (Some(definition), Some(ledger)) => ledger
                .all_outcomes()
                .into_iter()
                .filter(|o| definition.trial(o.trial_index).is_some())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `DefinitionLoaded | Paused -> Running`, or straight to `Completed`
    /// when nothing is left.
    pub fn start(&mut self) -> Result<SessionState, SessionError> {
        match self.state {
            SessionState::DefinitionLoaded | SessionState::Paused => {}
            SessionState::Running | SessionState::Completed => return Ok(self.state),
            SessionState::Uninitialized => {
                return Err(SessionError::NotPrepared(self.state));
            }
        }
        self.state = if self.remaining().is_empty() {
            SessionState::Completed
        } else {
            SessionState::Running
        };
        Ok(self.state)
    }

    /// Drives every remaining trial until completion or pause.
    ///
    /// A ledger write failure stops the run as `Paused` and returns the
    /// error; the failed trial is not counted and is presented again on the
    /// next run.
    pub fn run<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
        outcomes: &OutcomeReceiver,
        pause: &PauseSignal,
    ) -> Result<SessionState, SessionError> {
        if self.start()? != SessionState::Running {
            return Ok(self.state);
        }

        for trial_index in self.remaining() {
            if pause.is_requested() {
                info!("pause requested; stopping before trial {}", trial_index);
                self.state = SessionState::Paused;
                return Ok(self.state);
            }

            let Some(trial) = self
                .definition
                .as_ref()
                .and_then(|d| d.trial(trial_index))
                .cloned()
            else {
                continue;
            };

            let start_time = Utc::now();
            if let Err(source) = presenter.on_trial_ready(&trial) {
                self.state = SessionState::Paused;
                return Err(SessionError::Presentation {
                    trial_index,
                    source,
                });
            }

            let response = match outcomes.recv_for(trial_index) {
                Some(OutcomeEvent::Outcome { response, .. }) => response,
                Some(OutcomeEvent::Abandoned { .. }) => {
                    info!(
                        "trial {} abandoned; it will be presented again on resume",
                        trial_index
                    );
                    self.state = SessionState::Paused;
                    return Ok(self.state);
                }
                None => {
                    warn!(
                        "outcome channel closed while trial {} was in flight; it will be presented again on resume",
                        trial_index
                    );
                    self.state = SessionState::Paused;
                    return Ok(self.state);
                }
            };
            let end_time = Utc::now();

            let outcome = self.score_trial(&trial, response, start_time, end_time)?;
            let ledger = match self.ledger.as_mut() {
                Some(ledger) => ledger,
                None => return Err(SessionError::NotPrepared(self.state)),
            };
            if let Err(err) = ledger.append(&outcome) {
                self.state = SessionState::Paused;
                return Err(err.into());
            }

            self.aggregate.record(&outcome);
            if self.feedback {
                presenter.on_trial_scored(&outcome, &self.aggregate);
            }
        }

        self.state = if self.remaining().is_empty() {
            SessionState::Completed
        } else {
            SessionState::Paused
        };
        if self.state == SessionState::Completed {
            info!(
                "session {} complete: {} trials, accuracy {:.3}",
                self.key.file_stem(),
                self.aggregate.trials(),
                self.aggregate.overall().accuracy()
            );
        }
        Ok(self.state)
    }

    fn score_trial(
        &mut self,
        trial: &TrialSpec,
        response: BTreeSet<String>,
        start_time: chrono::DateTime<Utc>,
        end_time: chrono::DateTime<Utc>,
    ) -> Result<TrialOutcome, SessionError> {
        let (known, unknown): (BTreeSet<String>, BTreeSet<String>) = response
            .into_iter()
            .partition(|id| trial.contains_item(id));
        if !unknown.is_empty() {
            warn!(
                "trial {}: ignoring response ids not shown in the trial: {}",
                trial.trial_index,
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        let trial_score = score(&trial.ground_truth, &known, trial.universe_size()).map_err(
            |source| {
                self.state = SessionState::Paused;
                SessionError::Score {
                    trial_index: trial.trial_index,
                    source,
                }
            },
        )?;

        Ok(TrialOutcome {
            trial_index: trial.trial_index,
            start_time,
            end_time,
            category: trial.category,
            response_set: known,
            ground_truth: trial.ground_truth.clone(),
            score: trial_score,
        })
    }
}

/// A ledger row must describe the trial the definition holds under its index.
fn check_outcome(trial: &TrialSpec, outcome: &TrialOutcome) -> Result<(), String> {
    if outcome.category != trial.category {
        return Err(format!(
            "category {} does not match trial {} ({})",
            outcome.category, trial.trial_index, trial.category
        ));
    }
    if outcome.ground_truth != trial.ground_truth {
        return Err(format!(
            "ground truth does not match trial {}",
            trial.trial_index
        ));
    }
    if let Some(stray) = outcome
        .response_set
        .iter()
        .find(|id| !trial.contains_item(id))
    {
        return Err(format!(
            "response {:?} is not an item of trial {}",
            stray, trial.trial_index
        ));
    }
    let counted = outcome.tally().total();
    if counted != trial.universe_size() as u64 {
        return Err(format!(
            "counts cover {} items but trial {} shows {}",
            counted,
            trial.trial_index,
            trial.universe_size()
        ));
    }
    Ok(())
}

fn plan_differs(existing: &SessionDefinition, plan: &SessionPlan) -> bool {
    let categories: BTreeSet<Category> = existing.categories.iter().copied().collect();
    categories != plan.categories || (plan.seed.is_some() && plan.seed != existing.seed)
}

#[cfg(test)]
#[path = "../../tests/src_inline/session/tests.rs"]
mod tests;

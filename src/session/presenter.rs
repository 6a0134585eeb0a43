//! Boundary between the controller and whatever shows trials to the
//! participant.
//!
//! The controller calls [`Presenter::on_trial_ready`] and then blocks on an
//! [`OutcomeReceiver`] until the front end reports the participant's response
//! through the paired [`OutcomeSender`].

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::warn;

use crate::model::{TrialOutcome, TrialSpec};
use crate::scoring::RunningAggregate;

pub trait Presenter {
    /// Show `trial` to the participant. The response is never returned from
    /// here: it must be delivered through the outcome channel, either before
    /// returning (a blocking front end) or later from another thread.
    fn on_trial_ready(&mut self, trial: &TrialSpec) -> io::Result<()>;

    /// Called after an outcome is durably recorded, only when feedback is on.
    fn on_trial_scored(&mut self, _outcome: &TrialOutcome, _totals: &RunningAggregate) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeEvent {
    Outcome {
        trial_index: u32,
        response: BTreeSet<String>,
    },
    /// The front end went away before answering; the trial stays pending.
    Abandoned { trial_index: u32 },
}

impl OutcomeEvent {
    pub fn trial_index(&self) -> u32 {
        match self {
            Self::Outcome { trial_index, .. } | Self::Abandoned { trial_index } => *trial_index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeSender {
    tx: mpsc::Sender<OutcomeEvent>,
}

impl OutcomeSender {
    /// Reports the participant's response. Returns false if the controller is gone.
    pub fn on_trial_outcome<I, S>(&self, trial_index: u32, response: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let response = response.into_iter().map(Into::into).collect();
        self.tx
            .send(OutcomeEvent::Outcome {
                trial_index,
                response,
            })
            .is_ok()
    }

    pub fn on_trial_abandoned(&self, trial_index: u32) -> bool {
        self.tx
            .send(OutcomeEvent::Abandoned { trial_index })
            .is_ok()
    }
}

#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: mpsc::Receiver<OutcomeEvent>,
}

impl OutcomeReceiver {
    /// Blocks until an event for `trial_index` arrives. Events for other
    /// trials are dropped. `None` means every sender hung up.
    pub fn recv_for(&self, trial_index: u32) -> Option<OutcomeEvent> {
        loop {
            let event = self.rx.recv().ok()?;
            if event.trial_index() == trial_index {
                return Some(event);
            }
            warn!(
                "discarding outcome event for trial {} while waiting for trial {}",
                event.trial_index(),
                trial_index
            );
        }
    }
}

pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = mpsc::channel();
    (OutcomeSender { tx }, OutcomeReceiver { rx })
}

/// Cooperative pause flag, checked by the controller between trials.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Arc<AtomicBool>);

impl PauseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const RECENT_TRIALS: usize = 5;

/// Line-oriented front end: prints the trial's items and reads the flagged
/// ones as a comma-separated list of ids or 1-based positions.
pub struct ConsolePresenter<R, W> {
    input: R,
    output: W,
    outcomes: OutcomeSender,
    pause: PauseSignal,
}

impl<R: BufRead, W: Write> ConsolePresenter<R, W> {
    pub fn new(input: R, output: W, outcomes: OutcomeSender, pause: PauseSignal) -> Self {
        Self {
            input,
            output,
            outcomes,
            pause,
        }
    }

    fn read_response(&mut self, trial: &TrialSpec) -> io::Result<Option<BTreeSet<String>>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer.eq_ignore_ascii_case("p") || answer.eq_ignore_ascii_case("pause") {
            return Ok(None);
        }
        Ok(Some(parse_selection(answer, &trial.items)))
    }
}

impl<R: BufRead, W: Write> Presenter for ConsolePresenter<R, W> {
    fn on_trial_ready(&mut self, trial: &TrialSpec) -> io::Result<()> {
        writeln!(
            self.output,
            "\nTrial {} [{}] {}",
            trial.trial_index, trial.category, trial.item_ref
        )?;
        for (pos, item) in trial.items.iter().enumerate() {
            writeln!(self.output, "  {:>3}. {}", pos + 1, item)?;
        }
        write!(
            self.output,
            "Artifact items (ids or numbers, comma-separated; empty for none; 'p' to pause): "
        )?;
        self.output.flush()?;

        match self.read_response(trial)? {
            Some(response) => {
                self.outcomes.on_trial_outcome(trial.trial_index, response);
            }
            None => {
                self.pause.request();
                self.outcomes.on_trial_abandoned(trial.trial_index);
            }
        }
        Ok(())
    }

    fn on_trial_scored(&mut self, outcome: &TrialOutcome, totals: &RunningAggregate) {
        let s = &outcome.score;
        let overall = totals.overall();
        let _ = writeln!(
            self.output,
            "Hits: {}  False alarms: {}  Misses: {}  Correct rejections: {}  Accuracy: {:.1}%",
            s.hits,
            s.false_alarms,
            s.misses,
            s.correct_rejections,
            s.accuracy * 100.0
        );
        let _ = writeln!(
            self.output,
            "Session so far: {} trials, accuracy {:.1}%, d' {:.2}",
            totals.trials(),
            overall.accuracy() * 100.0,
            overall.dprime()
        );
        if let Some(cat) = totals.category(outcome.category) {
            let _ = writeln!(
                self.output,
                "  {}: {} trials, accuracy {:.1}%",
                outcome.category,
                cat.trials,
                cat.tally.accuracy() * 100.0
            );
        }
        let recent: Vec<String> = totals
            .trial_accuracy()
            .iter()
            .rev()
            .take(RECENT_TRIALS)
            .rev()
            .map(|(idx, acc)| format!("#{idx} {:.0}%", acc * 100.0))
            .collect();
        let _ = writeln!(self.output, "  Recent: {}", recent.join("  "));
    }
}

/// Tokens matching an item id are taken as ids; otherwise a number in
/// `1..=items.len()` selects by position. Anything else is kept verbatim and
/// left to the controller to reject.
pub fn parse_selection(answer: &str, items: &[String]) -> BTreeSet<String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if items.iter().any(|item| item == token) {
                return token.to_string();
            }
            match token.parse::<usize>() {
                Ok(pos) if (1..=items.len()).contains(&pos) => items[pos - 1].clone(),
                _ => token.to_string(),
            }
        })
        .collect()
}

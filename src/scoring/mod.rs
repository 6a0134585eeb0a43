//! Signal-detection scoring of one trial's response against its ground truth.
//!
//! Everything here is pure. `aggregate` folds per-trial scores into running
//! totals and `dprime` holds the sensitivity statistic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod dprime;

pub use aggregate::RunningAggregate;
pub use dprime::dprime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("universe of {universe_size} items cannot hold {required} distinct flagged or contaminated items")]
    UniverseTooSmall {
        universe_size: usize,
        required: usize,
    },
}

/// Outcome counts of a single trial plus its accuracy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialScore {
    pub hits: u32,
    pub false_alarms: u32,
    pub misses: u32,
    pub correct_rejections: u32,
    pub accuracy: f64,
}

impl TrialScore {
    pub fn tally(&self) -> Tally {
        Tally {
            hits: self.hits as u64,
            false_alarms: self.false_alarms as u64,
            misses: self.misses as u64,
            correct_rejections: self.correct_rejections as u64,
        }
    }
}

/// Scores a response set against the ground truth of a trial showing
/// `universe_size` sub-items.
pub fn score<T: Ord>(
    ground_truth: &BTreeSet<T>,
    response: &BTreeSet<T>,
    universe_size: usize,
) -> Result<TrialScore, ScoreError> {
    let hits = ground_truth.intersection(response).count();
    let false_alarms = response.difference(ground_truth).count();
    let misses = ground_truth.difference(response).count();
    let union = hits + false_alarms + misses;

    let correct_rejections =
        universe_size
            .checked_sub(union)
            .ok_or(ScoreError::UniverseTooSmall {
                universe_size,
                required: union,
            })?;

    Ok(TrialScore {
        hits: hits as u32,
        false_alarms: false_alarms as u32,
        misses: misses as u32,
        correct_rejections: correct_rejections as u32,
        accuracy: accuracy(
            hits as u64,
            false_alarms as u64,
            misses as u64,
            correct_rejections as u64,
        ),
    })
}

pub fn accuracy(hits: u64, false_alarms: u64, misses: u64, correct_rejections: u64) -> f64 {
    let total = hits + false_alarms + misses + correct_rejections;
    if total == 0 {
        return 0.0;
    }
    (hits + correct_rejections) as f64 / total as f64
}

/// Summed outcome counts over any number of trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub hits: u64,
    pub false_alarms: u64,
    pub misses: u64,
    pub correct_rejections: u64,
}

impl Tally {
    pub fn add(&mut self, other: Tally) {
        self.hits += other.hits;
        self.false_alarms += other.false_alarms;
        self.misses += other.misses;
        self.correct_rejections += other.correct_rejections;
    }

    pub fn total(&self) -> u64 {
        self.hits + self.false_alarms + self.misses + self.correct_rejections
    }

    pub fn accuracy(&self) -> f64 {
        accuracy(
            self.hits,
            self.false_alarms,
            self.misses,
            self.correct_rejections,
        )
    }

    pub fn dprime(&self) -> f64 {
        dprime(
            self.hits,
            self.false_alarms,
            self.misses,
            self.correct_rejections,
        )
    }

    pub fn precision(&self) -> f64 {
        ratio(self.hits, self.hits + self.false_alarms)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/scoring/tests.rs"]
mod tests;

use std::collections::BTreeMap;

use crate::model::{Category, TrialOutcome};
use crate::scoring::Tally;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryTally {
    pub trials: usize,
    pub tally: Tally,
}

/// Running totals for the current run. Disposable: `replay` over the ledger
/// reproduces it exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningAggregate {
    overall: Tally,
    by_category: BTreeMap<Category, CategoryTally>,
    trial_accuracy: Vec<(u32, f64)>,
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a TrialOutcome>,
    {
        let mut aggregate = Self::new();
        for outcome in outcomes {
            aggregate.record(outcome);
        }
        aggregate
    }

    pub fn record(&mut self, outcome: &TrialOutcome) {
        let tally = outcome.tally();
        self.overall.add(tally);
        let entry = self.by_category.entry(outcome.category).or_default();
        entry.trials += 1;
        entry.tally.add(tally);
        self.trial_accuracy
            .push((outcome.trial_index, outcome.score.accuracy));
    }

    pub fn trials(&self) -> usize {
        self.trial_accuracy.len()
    }

    pub fn overall(&self) -> Tally {
        self.overall
    }

    pub fn category(&self, category: Category) -> Option<CategoryTally> {
        self.by_category.get(&category).copied()
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, CategoryTally)> + '_ {
        self.by_category.iter().map(|(c, t)| (*c, *t))
    }

    /// `(trial_index, accuracy)` in the order trials were recorded.
    pub fn trial_accuracy(&self) -> &[(u32, f64)] {
        &self.trial_accuracy
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/scoring/aggregate.rs"]
mod tests;

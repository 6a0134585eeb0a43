use super::*;
use crate::scoring::TrialScore;
use chrono::Utc;
use std::collections::BTreeSet;

fn outcome(index: u32, category: Category, h: u32, fa: u32, m: u32, cr: u32) -> TrialOutcome {
    let now = Utc::now();
    TrialOutcome {
        trial_index: index,
        start_time: now,
        end_time: now,
        category,
        response_set: BTreeSet::new(),
        ground_truth: BTreeSet::new(),
        score: TrialScore {
            hits: h,
            false_alarms: fa,
            misses: m,
            correct_rejections: cr,
            accuracy: crate::scoring::accuracy(h as u64, fa as u64, m as u64, cr as u64),
        },
    }
}

#[test]
fn test_record_splits_by_category() {
    let mut agg = RunningAggregate::new();
    agg.record(&outcome(1, Category::Eeg, 1, 0, 1, 13));
    agg.record(&outcome(2, Category::Mag, 2, 1, 0, 12));
    agg.record(&outcome(3, Category::Eeg, 0, 2, 1, 12));

    assert_eq!(agg.trials(), 3);
    let eeg = agg.category(Category::Eeg).unwrap();
    assert_eq!(eeg.trials, 2);
    assert_eq!(eeg.tally.hits, 1);
    assert_eq!(eeg.tally.false_alarms, 2);
    assert_eq!(eeg.tally.misses, 2);
    assert_eq!(eeg.tally.correct_rejections, 25);
    assert!(agg.category(Category::Grad).is_none());

    let overall = agg.overall();
    assert_eq!(overall.hits, 3);
    assert_eq!(overall.total(), 45);
    assert_eq!(
        agg.trial_accuracy().iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_replay_matches_incremental() {
    let outcomes = vec![
        outcome(1, Category::Grad, 1, 1, 1, 2),
        outcome(2, Category::Grad, 0, 0, 2, 3),
    ];
    let mut incremental = RunningAggregate::new();
    for o in &outcomes {
        incremental.record(o);
    }
    assert_eq!(RunningAggregate::replay(&outcomes), incremental);
}

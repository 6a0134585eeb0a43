use super::*;
use proptest::prelude::*;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_score_mixed_response() {
    let s = score(&set(&["A", "B"]), &set(&["A", "C"]), 5).unwrap();
    assert_eq!(s.hits, 1);
    assert_eq!(s.false_alarms, 1);
    assert_eq!(s.misses, 1);
    assert_eq!(s.correct_rejections, 2);
    assert!((s.accuracy - 0.6).abs() < 1e-12);
}

#[test]
fn test_score_empty_response_and_truth() {
    let s = score(&set(&[]), &set(&[]), 15).unwrap();
    assert_eq!(s.correct_rejections, 15);
    assert_eq!(s.accuracy, 1.0);

    let empty = score(&set(&[]), &set(&[]), 0).unwrap();
    assert_eq!(empty.accuracy, 0.0);
}

#[test]
fn test_score_rejects_universe_smaller_than_union() {
    let err = score(&set(&["A", "B"]), &set(&["C"]), 2).unwrap_err();
    assert_eq!(
        err,
        ScoreError::UniverseTooSmall {
            universe_size: 2,
            required: 3
        }
    );
}

#[test]
fn test_tally_rates_zero_denominators() {
    let t = Tally::default();
    assert_eq!(t.accuracy(), 0.0);
    assert_eq!(t.precision(), 0.0);
    assert_eq!(t.recall(), 0.0);
    assert_eq!(t.f1(), 0.0);
    assert_eq!(t.dprime(), 0.0);
}

#[test]
fn test_tally_precision_recall_f1() {
    let t = Tally {
        hits: 3,
        false_alarms: 1,
        misses: 3,
        correct_rejections: 8,
    };
    assert!((t.precision() - 0.75).abs() < 1e-12);
    assert!((t.recall() - 0.5).abs() < 1e-12);
    assert!((t.f1() - 0.6).abs() < 1e-12);
    assert_eq!(t.total(), 15);
}

proptest! {
    #[test]
    fn prop_counts_partition_universe(
        truth in proptest::collection::btree_set(0u8..40, 0..20),
        response in proptest::collection::btree_set(0u8..40, 0..20),
        slack in 0usize..10,
    ) {
        let union = truth.union(&response).count();
        let universe = union + slack;
        let s = score(&truth, &response, universe).unwrap();
        prop_assert_eq!((s.hits + s.misses) as usize, truth.len());
        prop_assert_eq!(
            (s.false_alarms + s.correct_rejections) as usize,
            universe - truth.len()
        );
        prop_assert!((0.0..=1.0).contains(&s.accuracy));
    }
}

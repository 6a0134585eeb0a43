use super::*;
use crate::model::{ExperimentMode, TrialSpec};
use crate::scoring::score;
use chrono::{Duration, TimeZone};
use std::collections::BTreeSet;

fn ids(v: &[&str]) -> BTreeSet<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn definition(n: u32) -> SessionDefinition {
    SessionDefinition {
        participant_id: "p03".to_string(),
        session_number: 2,
        mode: ExperimentMode::Channels,
        created_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 30, 0).unwrap(),
        categories: vec![],
        seed: Some(1),
        experience_level: Some(3),
        trials: (1..=n)
            .map(|i| TrialSpec {
                trial_index: i,
                category: if i % 2 == 0 {
                    Category::Grad
                } else {
                    Category::Eeg
                },
                item_ref: format!("trial_{i}.pkl"),
                items: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
                ground_truth: ids(&["A", "B"]),
            })
            .collect(),
    }
}

fn outcome(def: &SessionDefinition, idx: u32, response: &[&str]) -> TrialOutcome {
    let trial = def.trial(idx).unwrap();
    let start = def.created_at + Duration::seconds(idx as i64 * 60);
    let response_set = ids(response);
    TrialOutcome {
        trial_index: idx,
        start_time: start,
        end_time: start + Duration::milliseconds(4_500),
        category: trial.category,
        score: score(&trial.ground_truth, &response_set, trial.universe_size()).unwrap(),
        response_set,
        ground_truth: trial.ground_truth.clone(),
    }
}

#[test]
fn test_summary_counts_and_remaining() {
    let def = definition(4);
    // A,C vs A,B over 5 items: 1 hit, 1 false alarm, 1 miss, 2 correct rejections.
    let outcomes = vec![outcome(&def, 3, &["A", "B"]), outcome(&def, 1, &["A", "C"])];
    let summary = build_summary(&def, &outcomes, 2, 10);

    assert_eq!(summary.defined_trials, 4);
    assert_eq!(summary.completed_trials, 2);
    assert_eq!(summary.remaining_trials, vec![2, 4]);
    assert!(!summary.complete);
    assert_eq!(summary.skipped_ledger_rows, 2);
    assert_eq!(summary.trials[0].trial_index, 1);
    assert!((summary.trials[0].accuracy - 0.6).abs() < 1e-12);
    assert!((summary.trials[0].duration_secs - 4.5).abs() < 1e-12);

    assert_eq!(summary.overall.hits, 3);
    assert_eq!(summary.overall.false_alarms, 1);
    assert_eq!(summary.overall.misses, 1);
    assert_eq!(summary.overall.correct_rejections, 5);
    assert!((summary.overall.accuracy - 0.8).abs() < 1e-12);
    assert!((summary.overall.precision - 0.75).abs() < 1e-12);

    assert_eq!(summary.by_category.len(), 1);
    assert_eq!(summary.by_category[0].category, Category::Eeg);
    assert_eq!(summary.by_category[0].rates.trials, 2);
}

#[test]
fn test_half_split_gives_first_half_the_odd_trial() {
    let def = definition(5);
    let outcomes: Vec<TrialOutcome> = (1..=5)
        .map(|i| {
            if i <= 3 {
                outcome(&def, i, &[])
            } else {
                outcome(&def, i, &["A", "B"])
            }
        })
        .collect();
    let refs: Vec<&TrialOutcome> = outcomes.iter().collect();
    let halves = half_split(&refs).unwrap();
    assert_eq!(halves.first_half_trials, 3);
    assert_eq!(halves.second_half_trials, 2);
    assert!((halves.first_half_accuracy - 0.6).abs() < 1e-12);
    assert!((halves.second_half_accuracy - 1.0).abs() < 1e-12);

    assert!(half_split(&refs[..1]).is_none());
}

#[test]
fn test_learning_curve_windows() {
    let def = definition(5);
    let outcomes: Vec<TrialOutcome> = (1..=5).map(|i| outcome(&def, i, &["A"])).collect();
    let refs: Vec<&TrialOutcome> = outcomes.iter().collect();
    let curve = learning_curve(&refs, 2);
    assert_eq!(curve.len(), 3);
    assert_eq!((curve[2].first_trial, curve[2].last_trial), (5, 5));
    assert_eq!(curve[0].trials, 2);
    assert!((curve[0].mean_correct_items - 4.0).abs() < 1e-12);
    assert!(learning_curve(&refs, 0).is_empty());
}

#[test]
fn test_write_reports_creates_both_files() {
    let def = definition(2);
    let outcomes = vec![outcome(&def, 1, &["A"]), outcome(&def, 2, &["B", "C"])];
    let summary = build_summary(&def, &outcomes, 0, 10);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report_p03_2_channels");
    write_reports(&out, &summary).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(json["tool"], "artifact-rater");
    assert_eq!(json["complete"], true);
    assert_eq!(json["by_category"][0]["category"], "eeg");
    assert_eq!(json["by_category"][0]["hits"], 1);

    let text = std::fs::read_to_string(out.join("report.txt")).unwrap();
    assert!(text.contains("Progress: 2 of 2 trials scored (complete)"));
    assert!(text.contains("[grad]"));
    assert!(text.contains("Trial   1 eeg "));
}

#[test]
fn test_mean_of_nothing_is_zero() {
    assert_eq!(mean(std::iter::empty()), 0.0);
    assert_eq!(format_f64_4(0.123456), "0.1235");
}

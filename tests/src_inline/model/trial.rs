use super::*;

fn spec(index: u32, items: &[&str], truth: &[&str]) -> TrialSpec {
    TrialSpec {
        trial_index: index,
        category: Category::Eeg,
        item_ref: format!("trial_{index}.fif"),
        items: items.iter().map(|s| s.to_string()).collect(),
        ground_truth: truth.iter().map(|s| s.to_string()).collect(),
    }
}

fn definition(trials: Vec<TrialSpec>) -> SessionDefinition {
    SessionDefinition {
        participant_id: "7".to_string(),
        session_number: 1,
        mode: ExperimentMode::Channels,
        created_at: Utc::now(),
        categories: vec![Category::Eeg],
        seed: Some(42),
        experience_level: None,
        trials,
    }
}

#[test]
fn test_session_key_rejects_path_characters() {
    assert!(SessionKey::new("../etc", 1, ExperimentMode::Channels).is_err());
    assert!(SessionKey::new("", 1, ExperimentMode::Channels).is_err());
    let key = SessionKey::new("p-01", 3, ExperimentMode::Components).unwrap();
    assert_eq!(key.file_stem(), "p-01_3_components");
}

#[test]
fn test_definition_lookup_by_index() {
    let def = definition(vec![
        spec(1, &["A", "B"], &["A"]),
        spec(2, &["C", "D"], &[]),
    ]);
    assert!(def.validate().is_ok());
    assert_eq!(def.trial(2).unwrap().item_ref, "trial_2.fif");
    assert!(def.trial(0).is_none());
    assert!(def.trial(3).is_none());
    assert_eq!(def.indices().into_iter().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_definition_rejects_gaps_and_duplicates() {
    let gap = definition(vec![spec(1, &["A"], &[]), spec(3, &["A"], &[])]);
    assert!(gap.validate().is_err());

    let dup = definition(vec![spec(1, &["A"], &[]), spec(1, &["A"], &[])]);
    assert!(dup.validate().is_err());

    assert!(definition(vec![]).validate().is_err());
}

#[test]
fn test_definition_rejects_truth_outside_items() {
    let def = definition(vec![spec(1, &["A", "B"], &["Z"])]);
    let err = def.validate().unwrap_err();
    assert!(err.contains("\"Z\""));
}

#[test]
fn test_definition_json_roundtrip() {
    let def = definition(vec![spec(1, &["A", "B", "C"], &["B"])]);
    let json = serde_json::to_string_pretty(&def).unwrap();
    let back: SessionDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, def);
}

use super::*;

#[test]
fn test_category_parse_is_case_insensitive() {
    assert_eq!("EEG".parse::<Category>().unwrap(), Category::Eeg);
    assert_eq!(" mag ".parse::<Category>().unwrap(), Category::Mag);
    assert_eq!("Grad".parse::<Category>().unwrap(), Category::Grad);
    assert!("ica".parse::<Category>().is_err());
}

#[test]
fn test_category_display_roundtrips_through_parse() {
    for &c in Category::all() {
        assert_eq!(c.to_string().parse::<Category>().unwrap(), c);
    }
}

#[test]
fn test_category_serde_uses_lowercase_names() {
    let json = serde_json::to_string(&Category::Grad).unwrap();
    assert_eq!(json, "\"grad\"");
    let mode = serde_json::to_string(&ExperimentMode::Components).unwrap();
    assert_eq!(mode, "\"components\"");
}

use super::*;
use crate::model::Category;
use crate::scoring::score;
use chrono::{Duration, TimeZone, Utc};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn open_plain(path: &Path) -> ResultLedger {
    ResultLedger::open(path, |_| Ok(())).unwrap()
}

fn outcome(index: u32, response: &[&str], truth: &[&str], universe: usize) -> TrialOutcome {
    let response_set = set(response);
    let ground_truth = set(truth);
    let start_time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        + Duration::nanoseconds(123_456_789)
        + Duration::seconds(index as i64 * 30);
    TrialOutcome {
        trial_index: index,
        start_time,
        end_time: start_time + Duration::milliseconds(12_345),
        category: Category::Grad,
        score: score(&ground_truth, &response_set, universe).unwrap(),
        response_set,
        ground_truth,
    }
}

#[test]
fn test_append_then_reopen_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("results_p01_1_channels.csv");

    let mut ledger = open_plain(&path);
    assert_eq!(ledger.len(), 0);
    let first = outcome(1, &["MEG 0112", "MEG 0113"], &["MEG 0112", "MEG 0241"], 20);
    let second = outcome(2, &[], &[], 20);
    ledger.append(&first).unwrap();
    ledger.append(&second).unwrap();

    let reopened = open_plain(&path);
    assert_eq!(reopened.all_outcomes(), vec![first, second]);
    assert!(reopened.corrupt_rows().is_empty());

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some(LEDGER_HEADER));
    assert_eq!(text.matches(LEDGER_HEADER).count(), 1);
    assert!(text.contains("\"MEG 0112,MEG 0113\""));
}

#[test]
fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let mut ledger = open_plain(&path);
    ledger.append(&outcome(1, &["A"], &["A"], 4)).unwrap();
    ledger.append(&outcome(3, &["B"], &["A"], 4)).unwrap();

    let a = open_plain(&path);
    let b = open_plain(&path);
    assert_eq!(a.all_outcomes(), b.all_outcomes());
    assert_eq!(a.completed_indices(), BTreeSet::from([1, 3]));
}

#[test]
fn test_duplicate_append_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let mut ledger = open_plain(&path);
    ledger.append(&outcome(1, &["A"], &["A"], 3)).unwrap();
    let err = ledger.append(&outcome(1, &[], &["A"], 3)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::DuplicateAppend { trial_index: 1, .. }
    ));
    assert_eq!(open_plain(&path).len(), 1);
}

#[test]
fn test_corrupt_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let good = row::encode_row(&outcome(1, &["A"], &["A", "B"], 5));
    let wrong_counts = "2,2024-03-01T10:00:00Z,2024-03-01T10:00:05Z,eeg,\"A\",\"A\",0,0,0,5,1";
    let bad_category = "3,2024-03-01T10:00:00Z,2024-03-01T10:00:05Z,ecg,\"\",\"\",0,0,0,5,1";
    let short = "4,2024-03-01T10:00:00Z";
    std::fs::write(
        &path,
        format!("{LEDGER_HEADER}\n{good}\n{wrong_counts}\n{bad_category}\n{short}\n"),
    )
    .unwrap();

    let ledger = open_plain(&path);
    assert_eq!(ledger.completed_indices(), BTreeSet::from([1]));
    let skipped: Vec<usize> = ledger.corrupt_rows().iter().map(|r| r.line).collect();
    assert_eq!(skipped, vec![3, 4, 5]);
}

#[test]
fn test_duplicate_rows_keep_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let first = outcome(2, &["A"], &["A"], 3);
    let second = outcome(2, &[], &["A"], 3);
    std::fs::write(
        &path,
        format!(
            "{LEDGER_HEADER}\n{}\n{}\n",
            row::encode_row(&first),
            row::encode_row(&second)
        ),
    )
    .unwrap();

    let ledger = open_plain(&path);
    assert_eq!(ledger.all_outcomes(), vec![first]);
    assert_eq!(ledger.corrupt_rows().len(), 1);
}

#[test]
fn test_torn_tail_is_terminated_before_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let done = row::encode_row(&outcome(1, &["A"], &["A"], 3));
    std::fs::write(&path, format!("{LEDGER_HEADER}\n{done}\n2,2024-03-01T1")).unwrap();

    let mut ledger = open_plain(&path);
    assert_eq!(ledger.completed_indices(), BTreeSet::from([1]));
    assert_eq!(ledger.corrupt_rows().len(), 1);

    ledger.append(&outcome(2, &[], &["A"], 3)).unwrap();
    let reopened = open_plain(&path);
    assert_eq!(reopened.completed_indices(), BTreeSet::from([1, 2]));
    assert_eq!(reopened.corrupt_rows().len(), 1);
}

#[test]
fn test_missing_header_still_reads_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let only = row::encode_row(&outcome(1, &[], &[], 2));
    std::fs::write(&path, format!("{only}\n")).unwrap();

    let mut ledger = open_plain(&path);
    assert_eq!(ledger.len(), 1);
    ledger.append(&outcome(2, &[], &[], 2)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains(LEDGER_HEADER));
}

#[test]
fn test_write_failure_leaves_trial_pending() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let mut ledger = open_plain(&path);
    std::fs::create_dir(&path).unwrap();

    let err = ledger.append(&outcome(1, &[], &[], 2)).unwrap_err();
    assert!(matches!(err, LedgerError::WriteFailure { trial_index: 1, .. }));
    assert!(!ledger.contains(1));
}

#[test]
fn test_ledger_path_uses_session_key() {
    let key = SessionKey::new("p01", 2, crate::model::ExperimentMode::Components).unwrap();
    let path = ResultLedger::ledger_path(Path::new("/data/results"), &key);
    assert_eq!(
        path,
        PathBuf::from("/data/results/results_p01_2_components.csv")
    );
}

#[test]
fn test_split_csv_line_handles_quotes() {
    assert_eq!(
        row::split_csv_line("1,\"a,b\",\"say \"\"hi\"\"\",").unwrap(),
        vec!["1", "a,b", "say \"hi\"", ""]
    );
    assert!(row::split_csv_line("1,\"open").is_err());
}

#[test]
fn test_rejected_row_does_not_shadow_later_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let stale = outcome(1, &["Z"], &["Z"], 3);
    let fresh = outcome(1, &["A"], &["A"], 3);
    std::fs::write(
        &path,
        format!(
            "{LEDGER_HEADER}\n{}\n{}\n",
            row::encode_row(&stale),
            row::encode_row(&fresh)
        ),
    )
    .unwrap();

    let ledger = ResultLedger::open(&path, |o| {
        if o.ground_truth.contains("Z") {
            Err("unknown ground truth".to_string())
        } else {
            Ok(())
        }
    })
    .unwrap();
    assert_eq!(ledger.all_outcomes(), vec![fresh]);
    assert_eq!(ledger.corrupt_rows().len(), 1);
    assert_eq!(ledger.corrupt_rows()[0].line, 2);
}

#[test]
fn test_failed_write_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    let done = row::encode_row(&outcome(1, &["A"], &["A"], 3));
    std::fs::write(&path, format!("{LEDGER_HEADER}\n{done}\n")).unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    let err = write_or_roll_back(&mut file, |f| {
        f.write_all(row::encode_row(&outcome(2, &[], &["A"], 3)).as_bytes())?;
        Err(io::Error::other("disk full"))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "disk full");
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let mut ledger = open_plain(&path);
    ledger.append(&outcome(2, &[], &["A"], 3)).unwrap();
    let reopened = open_plain(&path);
    assert_eq!(reopened.completed_indices(), BTreeSet::from([1, 2]));
    assert!(reopened.corrupt_rows().is_empty());
}

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{Category, TrialOutcome};
use crate::scoring::{TrialScore, accuracy};

pub const LEDGER_HEADER: &str = "Trial,StartTime,EndTime,Category,SelectedItems,GroundTruthItems,Hits,FalseAlarms,Misses,CorrectRejections,Accuracy";

const N_COLUMNS: usize = 11;

pub fn encode_row(outcome: &TrialOutcome) -> String {
    let s = &outcome.score;
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        outcome.trial_index,
        format_time(&outcome.start_time),
        format_time(&outcome.end_time),
        outcome.category,
        quote_list(&outcome.response_set),
        quote_list(&outcome.ground_truth),
        s.hits,
        s.false_alarms,
        s.misses,
        s.correct_rejections,
        s.accuracy
    )
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Sorted ids joined with commas, always quoted.
fn quote_list(ids: &BTreeSet<String>) -> String {
    let joined = ids.iter().map(String::as_str).collect::<Vec<_>>().join(",");
    format!("\"{}\"", joined.replace('"', "\"\""))
}

pub fn decode_row(line: &str) -> Result<TrialOutcome, String> {
    let fields = split_csv_line(line)?;
    if fields.len() != N_COLUMNS {
        return Err(format!(
            "expected {} columns, found {}",
            N_COLUMNS,
            fields.len()
        ));
    }

    let trial_index: u32 = parse_num(&fields[0], "Trial")?;
    if trial_index == 0 {
        return Err("Trial must be 1 or greater".to_string());
    }
    let start_time = parse_time(&fields[1], "StartTime")?;
    let end_time = parse_time(&fields[2], "EndTime")?;
    let category: Category = fields[3].parse().map_err(|e| format!("Category: {e}"))?;
    let response_set = split_list(&fields[4]);
    let ground_truth = split_list(&fields[5]);
    let hits: u32 = parse_num(&fields[6], "Hits")?;
    let false_alarms: u32 = parse_num(&fields[7], "FalseAlarms")?;
    let misses: u32 = parse_num(&fields[8], "Misses")?;
    let correct_rejections: u32 = parse_num(&fields[9], "CorrectRejections")?;
    let stored_accuracy: f64 = parse_num(&fields[10], "Accuracy")?;
    if !stored_accuracy.is_finite() || !(0.0..=1.0).contains(&stored_accuracy) {
        return Err(format!("Accuracy {stored_accuracy} outside [0, 1]"));
    }

    let expected_hits = ground_truth.intersection(&response_set).count() as u32;
    let expected_fa = response_set.difference(&ground_truth).count() as u32;
    let expected_misses = ground_truth.difference(&response_set).count() as u32;
    if (hits, false_alarms, misses) != (expected_hits, expected_fa, expected_misses) {
        return Err(format!(
            "stored counts hits={hits} false_alarms={false_alarms} misses={misses} contradict the stored item lists"
        ));
    }
    let recomputed = accuracy(
        hits as u64,
        false_alarms as u64,
        misses as u64,
        correct_rejections as u64,
    );
    if (recomputed - stored_accuracy).abs() > 1e-9 {
        return Err(format!(
            "stored accuracy {stored_accuracy} does not match counts ({recomputed})"
        ));
    }

    Ok(TrialOutcome {
        trial_index,
        start_time,
        end_time,
        category,
        response_set,
        ground_truth,
        score: TrialScore {
            hits,
            false_alarms,
            misses,
            correct_rejections,
            accuracy: stored_accuracy,
        },
    })
}

fn parse_num<T: std::str::FromStr>(field: &str, column: &str) -> Result<T, String> {
    field
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{column}: cannot parse {field:?}"))
}

fn parse_time(field: &str, column: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(field.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("{column}: {e}"))
}

fn split_list(field: &str) -> BTreeSet<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits one CSV record, honouring double-quoted fields with `""` escapes.
pub fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut current)),
                '"' if current.is_empty() => in_quotes = true,
                '"' => return Err("stray quote inside unquoted field".to_string()),
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

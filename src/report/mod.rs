pub mod json;
pub mod text;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{Category, SessionDefinition, TrialOutcome};
use crate::scoring::{RunningAggregate, Tally};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counts plus every rate derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSummary {
    pub trials: usize,
    pub hits: u64,
    pub false_alarms: u64,
    pub misses: u64,
    pub correct_rejections: u64,
    pub accuracy: f64,
    pub dprime: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl RateSummary {
    pub fn from_tally(trials: usize, tally: Tally) -> Self {
        Self {
            trials,
            hits: tally.hits,
            false_alarms: tally.false_alarms,
            misses: tally.misses,
            correct_rejections: tally.correct_rejections,
            accuracy: tally.accuracy(),
            dprime: tally.dprime(),
            precision: tally.precision(),
            recall: tally.recall(),
            f1: tally.f1(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    #[serde(flatten)]
    pub rates: RateSummary,
}

/// Mean per-trial accuracy of the earlier and later halves of the completed
/// trials. The first half takes the extra trial when the count is odd.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfSplit {
    pub first_half_trials: usize,
    pub first_half_accuracy: f64,
    pub second_half_trials: usize,
    pub second_half_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub first_trial: u32,
    pub last_trial: u32,
    pub trials: usize,
    pub mean_accuracy: f64,
    /// Mean of `hits + correct_rejections` per trial.
    pub mean_correct_items: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialPoint {
    pub trial_index: u32,
    pub category: Category,
    pub hits: u32,
    pub false_alarms: u32,
    pub misses: u32,
    pub correct_rejections: u32,
    pub accuracy: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub tool: String,
    pub tool_version: String,
    pub participant_id: String,
    pub session_number: u32,
    pub mode: String,
    pub created_at: DateTime<Utc>,
    pub experience_level: Option<u8>,
    pub seed: Option<u64>,

    pub defined_trials: usize,
    pub completed_trials: usize,
    pub remaining_trials: Vec<u32>,
    pub complete: bool,
    pub skipped_ledger_rows: usize,

    pub overall: RateSummary,
    pub by_category: Vec<CategorySummary>,
    pub halves: Option<HalfSplit>,
    pub learning_curve_window: usize,
    pub learning_curve: Vec<CurvePoint>,
    pub trials: Vec<TrialPoint>,
}

/// `outcomes` must already be restricted to the definition's trials.
pub fn build_summary(
    definition: &SessionDefinition,
    outcomes: &[TrialOutcome],
    skipped_ledger_rows: usize,
    learning_curve_window: usize,
) -> SessionSummary {
    let mut ordered: Vec<&TrialOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.trial_index);

    let aggregate = RunningAggregate::replay(ordered.iter().copied());
    let done: std::collections::BTreeSet<u32> = ordered.iter().map(|o| o.trial_index).collect();
    let remaining_trials: Vec<u32> = definition
        .trials
        .iter()
        .map(|t| t.trial_index)
        .filter(|idx| !done.contains(idx))
        .collect();

    SessionSummary {
        tool: env!("CARGO_PKG_NAME").to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        participant_id: definition.participant_id.clone(),
        session_number: definition.session_number,
        mode: definition.mode.to_string(),
        created_at: definition.created_at,
        experience_level: definition.experience_level,
        seed: definition.seed,
        defined_trials: definition.trials.len(),
        completed_trials: ordered.len(),
        complete: remaining_trials.is_empty(),
        remaining_trials,
        skipped_ledger_rows,
        overall: RateSummary::from_tally(aggregate.trials(), aggregate.overall()),
        by_category: aggregate
            .categories()
            .map(|(category, c)| CategorySummary {
                category,
                rates: RateSummary::from_tally(c.trials, c.tally),
            })
            .collect(),
        halves: half_split(&ordered),
        learning_curve_window,
        learning_curve: learning_curve(&ordered, learning_curve_window),
        trials: ordered.iter().map(|o| trial_point(o)).collect(),
    }
}

fn trial_point(o: &TrialOutcome) -> TrialPoint {
    let millis = (o.end_time - o.start_time).num_milliseconds().max(0);
    TrialPoint {
        trial_index: o.trial_index,
        category: o.category,
        hits: o.score.hits,
        false_alarms: o.score.false_alarms,
        misses: o.score.misses,
        correct_rejections: o.score.correct_rejections,
        accuracy: o.score.accuracy,
        duration_secs: millis as f64 / 1000.0,
    }
}

pub fn half_split(ordered: &[&TrialOutcome]) -> Option<HalfSplit> {
    if ordered.len() < 2 {
        return None;
    }
    let cut = ordered.len().div_ceil(2);
    let (first, second) = ordered.split_at(cut);
    Some(HalfSplit {
        first_half_trials: first.len(),
        first_half_accuracy: mean(first.iter().map(|o| o.score.accuracy)),
        second_half_trials: second.len(),
        second_half_accuracy: mean(second.iter().map(|o| o.score.accuracy)),
    })
}

/// Consecutive windows of `window` completed trials; the last may be shorter.
pub fn learning_curve(ordered: &[&TrialOutcome], window: usize) -> Vec<CurvePoint> {
    if window == 0 {
        return Vec::new();
    }
    ordered
        .chunks(window)
        .map(|chunk| CurvePoint {
            first_trial: chunk[0].trial_index,
            last_trial: chunk[chunk.len() - 1].trial_index,
            trials: chunk.len(),
            mean_accuracy: mean(chunk.iter().map(|o| o.score.accuracy)),
            mean_correct_items: mean(
                chunk
                    .iter()
                    .map(|o| (o.score.hits + o.score.correct_rejections) as f64),
            ),
        })
        .collect()
}

pub fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

pub fn format_f64_4(v: f64) -> String {
    format!("{:.4}", v)
}

pub fn write_reports(out_dir: &Path, summary: &SessionSummary) -> Result<(), ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ReportError::Io { path, source }
    };
    fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;

    let summary_path = out_dir.join("summary.json");
    let json = json::render_summary_json(summary)?;
    fs::write(&summary_path, json).map_err(io_err(&summary_path))?;

    let report_path = out_dir.join("report.txt");
    fs::write(&report_path, text::render_report_text(summary)).map_err(io_err(&report_path))?;

    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;

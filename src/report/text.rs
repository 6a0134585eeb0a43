use crate::report::{RateSummary, SessionSummary, format_f64_4};

pub fn render_report_text(summary: &SessionSummary) -> String {
    let mut out = String::new();

    out.push_str("Artifact Rating Session Report\n");
    out.push_str("==============================\n\n");

    out.push_str("1. Session\n");
    out.push_str(&format!("Participant: {}\n", summary.participant_id));
    out.push_str(&format!("Session: {}\n", summary.session_number));
    out.push_str(&format!("Mode: {}\n", summary.mode));
    out.push_str(&format!(
        "Created: {}\n",
        summary.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(level) = summary.experience_level {
        out.push_str(&format!("Experience level: {}\n", level));
    }
    out.push_str(&format!(
        "Progress: {} of {} trials scored ({})\n",
        summary.completed_trials,
        summary.defined_trials,
        if summary.complete {
            "complete"
        } else {
            "in progress"
        }
    ));
    if !summary.remaining_trials.is_empty() {
        out.push_str(&format!(
            "Remaining trials: {}\n",
            join_indices(&summary.remaining_trials)
        ));
    }
    if summary.skipped_ledger_rows > 0 {
        out.push_str(&format!(
            "Warning: {} ledger rows could not be read and were skipped\n",
            summary.skipped_ledger_rows
        ));
    }
    out.push('\n');

    out.push_str("2. Overall performance\n");
    push_rates(&mut out, &summary.overall);
    out.push('\n');

    out.push_str("3. Performance by category\n");
    if summary.by_category.is_empty() {
        out.push_str("No trials scored yet.\n");
    }
    for c in &summary.by_category {
        out.push_str(&format!("[{}]\n", c.category));
        push_rates(&mut out, &c.rates);
    }
    out.push('\n');

    out.push_str("4. Learning\n");
    match &summary.halves {
        Some(h) => {
            out.push_str(&format!(
                "First half ({} trials) mean accuracy: {}\n",
                h.first_half_trials,
                format_f64_4(h.first_half_accuracy)
            ));
            out.push_str(&format!(
                "Second half ({} trials) mean accuracy: {}\n",
                h.second_half_trials,
                format_f64_4(h.second_half_accuracy)
            ));
            out.push_str(&format!(
                "{}\n",
                learning_statement(h.first_half_accuracy, h.second_half_accuracy)
            ));
        }
        None => out.push_str("Not enough trials to compare halves.\n"),
    }
    if !summary.learning_curve.is_empty() {
        out.push_str(&format!(
            "Learning curve (windows of {} trials):\n",
            summary.learning_curve_window
        ));
        for p in &summary.learning_curve {
            out.push_str(&format!(
                "  trials {}-{}: accuracy {}, correct items {}\n",
                p.first_trial,
                p.last_trial,
                format_f64_4(p.mean_accuracy),
                format_f64_4(p.mean_correct_items)
            ));
        }
    }
    out.push('\n');

    out.push_str("5. Trial by trial\n");
    for t in &summary.trials {
        out.push_str(&format!(
            "Trial {:>3} {:<4} H={} FA={} M={} CR={} accuracy={} ({:.1}s)\n",
            t.trial_index,
            t.category.as_str(),
            t.hits,
            t.false_alarms,
            t.misses,
            t.correct_rejections,
            format_f64_4(t.accuracy),
            t.duration_secs
        ));
    }

    out
}

fn push_rates(out: &mut String, r: &RateSummary) {
    out.push_str(&format!(
        "Trials: {}  Hits: {}  False alarms: {}  Misses: {}  Correct rejections: {}\n",
        r.trials, r.hits, r.false_alarms, r.misses, r.correct_rejections
    ));
    out.push_str(&format!(
        "Accuracy: {}  d': {}  Precision: {}  Recall: {}  F1: {}\n",
        format_f64_4(r.accuracy),
        format_f64_4(r.dprime),
        format_f64_4(r.precision),
        format_f64_4(r.recall),
        format_f64_4(r.f1)
    ));
}

fn join_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn learning_statement(first: f64, second: f64) -> &'static str {
    let delta = second - first;
    if delta >= 0.02 {
        "Accuracy improved over the session."
    } else if delta <= -0.02 {
        "Accuracy declined over the session."
    } else {
        "Accuracy was stable over the session."
    }
}

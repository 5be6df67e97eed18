//! Composes the human-readable run report sent by the notifier.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use kometa_core::{ChangeRecord, ErrorRecord};

use crate::pipeline::RunSummary;

/// Format the full summary message in Markdown.
pub fn format_summary(
    summary: &RunSummary,
    changes: &[ChangeRecord],
    errors: &[ErrorRecord],
    next_run: Option<DateTime<Local>>,
    version: &str,
) -> String {
    let mut lines: Vec<String> = vec![format!("# Kometa-AI Summary (v{})", version), String::new()];

    lines.push("## Overview".to_string());
    lines.push(String::new());
    if !summary.started_at.is_empty() {
        lines.push(format!(
            "- Run: {} to {}",
            summary.started_at, summary.finished_at
        ));
    }
    lines.push(format!("- Total changes: {}", changes.len()));
    lines.push(format!("- Errors: {}", errors.len()));
    if summary.dry_run {
        lines.push("- Mode: dry run (no catalog writes)".to_string());
    }
    if let Some(next) = next_run {
        lines.push(format!(
            "- Next scheduled run: {}",
            next.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    lines.push(String::new());

    if changes.is_empty() {
        lines.push("## Changes".to_string());
        lines.push(String::new());
        lines.push("No changes were made in this run".to_string());
        lines.push(String::new());
    } else {
        lines.push("## Changes by Collection".to_string());
        lines.push(String::new());
        for (collection, (added, removed)) in group_changes(changes) {
            lines.push(format!("### {}", collection));
            lines.push(String::new());
            if !added.is_empty() {
                lines.push(format!("**Added**: {}", added.len()));
                for change in &added {
                    lines.push(format!("- {} ({})", change.title, change.movie_id));
                }
                lines.push(String::new());
            }
            if !removed.is_empty() {
                lines.push(format!("**Removed**: {}", removed.len()));
                for change in &removed {
                    lines.push(format!("- {} ({})", change.title, change.movie_id));
                }
                lines.push(String::new());
            }
        }
    }

    lines.push("## Errors".to_string());
    lines.push(String::new());
    lines.push(format_errors(errors));
    lines.push(String::new());

    lines.push("## Processing Statistics".to_string());
    lines.push(String::new());
    lines.push(format_stats(summary));

    lines.join("\n")
}

/// Group change records per collection into (added, removed) lists.
fn group_changes(
    changes: &[ChangeRecord],
) -> BTreeMap<String, (Vec<&ChangeRecord>, Vec<&ChangeRecord>)> {
    let mut grouped: BTreeMap<String, (Vec<&ChangeRecord>, Vec<&ChangeRecord>)> = BTreeMap::new();
    for change in changes {
        let entry = grouped.entry(change.collection.clone()).or_default();
        match change.action.as_str() {
            "added" => entry.0.push(change),
            "removed" => entry.1.push(change),
            _ => {}
        }
    }
    grouped
}

/// Errors grouped by context, one section per context.
fn format_errors(errors: &[ErrorRecord]) -> String {
    if errors.is_empty() {
        return "No errors encountered".to_string();
    }

    let mut grouped: BTreeMap<&str, Vec<&ErrorRecord>> = BTreeMap::new();
    for error in errors {
        grouped.entry(error.context.as_str()).or_default().push(error);
    }

    let mut lines = Vec::new();
    for (context, entries) in grouped {
        lines.push(format!("### {}", context));
        lines.push(String::new());
        for error in entries {
            let date = error.timestamp.split('T').next().unwrap_or("");
            lines.push(format!("- {}: {}", date, error.message));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

fn format_stats(summary: &RunSummary) -> String {
    let mut lines = vec![
        "### Summary".to_string(),
        format!(
            "- Collections processed: {}",
            summary.collections.len()
        ),
        format!(
            "- Total tokens: {}",
            summary.usage.input_tokens + summary.usage.output_tokens
        ),
        format!("- Total requests: {}", summary.usage.requests),
        format!("- Total cost: ${:.4}", summary.usage.cost),
        String::new(),
    ];

    for (name, outcome) in &summary.collections {
        lines.push(format!("### {}", name));
        lines.push(format!("- Classified: {} movies", outcome.asked));
        lines.push(format!("- From cache: {} movies", outcome.reused));
        lines.push(format!(
            "- Tags: {} added, {} removed",
            outcome.added, outcome.removed
        ));
        if outcome.failed_batches > 0 {
            lines.push(format!("- Failed batches: {}", outcome.failed_batches));
        }
        lines.push(format!("- API cost: ${:.4}", outcome.usage.cost));
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

/// A critical-failure notification for errors that abort the pipeline.
pub fn format_error_notification(context: &str, message: &str, version: &str) -> String {
    [
        format!("# Kometa-AI Error Report (v{})", version),
        String::new(),
        format!("## Error in {}", context),
        String::new(),
        format!("**Error message**: {}", message),
        String::new(),
        format!("- Timestamp: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
    ]
    .join("\n")
}

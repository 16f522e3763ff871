use std::fmt::Write;

use crate::models::{SearchMode, SearchOutcome, SearchReport, SnapshotStatus};
use crate::pipeline::{PipelineError, PipelineErrorKind};

const SEPARATOR_WIDTH: usize = 80;

/// Human-readable summary printed after a successful run.
pub fn render_summary(report: &SearchReport) -> String {
    let mut out = String::new();
    let label = report.marketplace.label();
    let (found, none) = match report.mode {
        SearchMode::Direct => ("matches", "matches"),
        SearchMode::Expanded => ("product matches", "products"),
    };

    match &report.snapshot {
        SnapshotStatus::Written { path } => {
            let _ = writeln!(out, "Results saved to {}", path.display());
        }
        SnapshotStatus::Failed { reason } => {
            let _ = writeln!(out, "Warning: results were not saved ({reason})");
        }
    }

    match report.outcome {
        SearchOutcome::NoToken => {
            let _ = writeln!(
                out,
                "No products page token in the response; the provider found no product set for this image."
            );
            return out;
        }
        _ if report.total_matches == 0 => {
            let _ = writeln!(out, "No visual matches found in the response");
            return out;
        }
        _ => {}
    }

    let _ = writeln!(
        out,
        "\nFound {} {label} {found} out of {} total matches",
        report.matches.len(),
        report.total_matches
    );

    for (idx, record) in report.matches.iter().enumerate() {
        let heading = match report.mode {
            SearchMode::Direct => "Match",
            SearchMode::Expanded => "Product",
        };
        let _ = writeln!(out, "\n{label} {heading} {}:", idx + 1);
        for line in record.render_lines() {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));
    }

    if report.matches.is_empty() {
        let _ = writeln!(out, "\nNo {label} {none} found in the results");
    }
    out
}

pub fn render_failure(err: &PipelineError) -> String {
    let what = match err.kind() {
        PipelineErrorKind::Transport => "provider request failed",
        PipelineErrorKind::Parse => "provider response could not be parsed",
    };
    format!("Search failed during `{}`: {what}: {}", err.stage(), err.detail())
}

use tracing::trace;

use crate::lens::LensError;

// Counters and timings go out as trace events on `lens.metrics`; there is no exporter.

/// One provider round trip, tagged with the phase and how it ended.
pub fn provider_request<T>(phase: &'static str, result: &Result<T, LensError>) {
    let status = match result {
        Err(LensError::Status { status, .. }) => Some(*status),
        _ => None,
    };
    trace!(
        target: "lens.metrics",
        phase,
        outcome = request_outcome(result),
        status,
        "provider_request"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target: "lens.metrics",
        stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

fn request_outcome<T>(result: &Result<T, LensError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(LensError::Status { .. }) => "http_status",
        Err(LensError::Network(_)) => "network",
        Err(LensError::Parse(_)) => "parse",
        Err(LensError::Setup(_)) => "setup",
    }
}

//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: call made against the backend ("infer", "ready", "extract", "predict")
//! - `model`: backend model name
//! - `status`: "ok" or "error"

/// Total calls made against the inference backend.
///
/// Labels: `operation`, `model`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Backend call duration in seconds.
///
/// Labels: `operation`, `model`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Decodes that degraded to an empty prediction.
///
/// Labels: `reason` ("shape" | "labels" | "length" | "datatype").
pub const DECODE_DEGRADED_TOTAL: &str = "huginn_decode_degraded_total";

/// Entities emitted by the decoder.
///
/// Labels: `label`.
pub const ENTITIES_TOTAL: &str = "huginn_entities_total";

/// Fire-and-forget side effects (table upload, webhook, training dispatch).
///
/// Labels: `kind`, `status` ("ok" | "error").
pub const SIDE_EFFECTS_TOTAL: &str = "huginn_side_effects_total";

/// Record the outcome of one backend call.
pub(crate) fn record_request(
    operation: &'static str,
    model: &str,
    start: std::time::Instant,
    ok: bool,
) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(
        REQUESTS_TOTAL,
        "operation" => operation,
        "model" => model.to_string(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "operation" => operation,
        "model" => model.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of one fire-and-forget side effect.
pub(crate) fn record_side_effect(kind: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(SIDE_EFFECTS_TOTAL, "kind" => kind, "status" => status).increment(1);
}

//! Response-observing middleware that feeds the metric registry.
//!
//! Handlers attach a [`ModelSignal`] to their response extensions and never
//! touch the metrics library; this layer reads it back once the response is
//! finalized.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use lookout_common::ModelSignal;
use std::sync::Arc;
use std::time::Instant;

use super::SignalMetrics;

/// Record request counters for every matched route and model signals for
/// the configured prediction route. A missing signal is skipped silently.
///
/// Installed with `route_layer`, so the matched path is always present;
/// anything else passes through unobserved.
pub async fn record_signals(
    State(metrics): State<Arc<SignalMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let Some(handler) = request.extensions().get::<MatchedPath>().map(|p| p.as_str().to_string())
    else {
        return next.run(request).await;
    };
    let method = request.method().clone();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    metrics.observe_request(&handler, method.as_str(), status, start.elapsed());

    if handler == metrics.signal_route()
        && let Some(signal) = response.extensions().get::<ModelSignal>()
    {
        metrics.observe_signal(signal);
        tracing::trace!(score = signal.score, label = signal.label, "Observed model signal");
    }

    response
}

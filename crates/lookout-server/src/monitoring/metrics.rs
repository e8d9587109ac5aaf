//! Model and HTTP metrics backed by a Prometheus recorder

use lookout_common::{ModelSignal, OUTLIER_HISTOGRAM_SHIFT};
use metrics::{Histogram, counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusRecorder};
use std::sync::Arc;
use std::time::Duration;

use super::MetricsConfig;

const HTTP_DURATION_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// `{0, 0.1, ..., (n-1)/10}`.
fn decile_buckets(n: u32) -> Vec<f64> {
    (0..n).map(|i| f64::from(i) / 10.0).collect()
}

/// Fully qualified metric names.
#[derive(Debug, Clone)]
pub struct MetricNames {
    pub model_score: String,
    pub label: String,
    pub outlier_score: String,
    pub http_requests: String,
    pub http_duration: String,
}

impl MetricNames {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            model_score: config.metric_name("model_score"),
            label: config.metric_name("label"),
            outlier_score: config.metric_name("outlier_score"),
            http_requests: config.metric_name("http_requests_total"),
            http_duration: config.metric_name("http_request_duration_seconds"),
        }
    }
}

/// Process-wide metric registry.
///
/// The recorder is owned here rather than installed globally, so several
/// servers (and tests) can run in one process. Observations are lock-free
/// and never reset.
pub struct SignalMetrics {
    recorder: Arc<PrometheusRecorder>,
    names: MetricNames,
    signal_route: String,
    model_score: Histogram,
    outlier_score: Option<Histogram>,
}

impl SignalMetrics {
    pub fn new(config: &MetricsConfig, outlier_enabled: bool) -> Result<Self, BuildError> {
        let names = MetricNames::new(config);
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(names.model_score.clone()), &decile_buckets(10))?
            .set_buckets_for_metric(
                Matcher::Full(names.outlier_score.clone()),
                &decile_buckets(19),
            )?
            .set_buckets_for_metric(
                Matcher::Full(names.http_duration.clone()),
                &HTTP_DURATION_BUCKETS,
            )?
            .build_recorder();
        let recorder = Arc::new(recorder);

        let (model_score, outlier_score) = metrics::with_local_recorder(&*recorder, || {
            let model_score = histogram!(names.model_score.clone());
            let outlier_score = outlier_enabled.then(|| histogram!(names.outlier_score.clone()));
            (model_score, outlier_score)
        });

        tracing::debug!(
            model_score = %names.model_score,
            outlier_enabled,
            "Registered model metrics"
        );

        Ok(Self {
            recorder,
            names,
            signal_route: config.signal_route.clone(),
            model_score,
            outlier_score,
        })
    }

    pub fn names(&self) -> &MetricNames {
        &self.names
    }

    /// Route whose responses are inspected for a [`ModelSignal`].
    pub fn signal_route(&self) -> &str {
        &self.signal_route
    }

    pub fn observe_signal(&self, signal: &ModelSignal) {
        self.model_score.record(signal.score);
        metrics::with_local_recorder(&*self.recorder, || {
            counter!(self.names.label.clone(), "label" => signal.label.to_string()).increment(1);
        });
        if let (Some(histogram), Some(outlier)) = (&self.outlier_score, signal.outlier_score) {
            histogram.record(outlier + OUTLIER_HISTOGRAM_SHIFT);
        }
    }

    pub fn observe_request(&self, handler: &str, method: &str, status: u16, elapsed: Duration) {
        metrics::with_local_recorder(&*self.recorder, || {
            counter!(
                self.names.http_requests.clone(),
                "handler" => handler.to_string(),
                "method" => method.to_string(),
                "status" => status.to_string()
            )
            .increment(1);
            histogram!(self.names.http_duration.clone(), "handler" => handler.to_string())
                .record(elapsed.as_secs_f64());
        });
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.recorder.handle().render()
    }
}

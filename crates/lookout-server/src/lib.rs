//! HTTP inference gateway with side-channel model monitoring
//!
//! Serves predictions, local explanations and drift verdicts from a frozen
//! artifact bundle. Prediction responses carry a typed model signal that the
//! monitoring middleware turns into Prometheus histograms and counters.

pub mod bundle;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod service;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lookout_common::{Contribution, DriftTestResult, FeatureRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

pub use bundle::ArtifactBundle;
pub use config::{ConfigBuilder, ServerConfig};
pub use error::{ApiError, ErrorResponse};
pub use service::{InferenceService, PredictOutcome};

use monitoring::{SignalMetrics, record_signals};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRequest {
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_version: String,
    pub schema_version: String,
    pub outlier_enabled: bool,
    pub explainer_enabled: bool,
    pub drift_enabled: bool,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: InferenceService,
    pub metrics: Arc<SignalMetrics>,
}

/// Lookout server: artifact bundle, metrics registry and HTTP surface
pub struct LookoutServer {
    config: ServerConfig,
    state: AppState,
}

impl LookoutServer {
    /// Load the configured artifacts and build the metric registry
    pub fn new(config: ServerConfig) -> Result<Self> {
        let bundle = ArtifactBundle::load(&config.artifacts, &config.explain)?;
        Self::from_bundle(config, bundle)
    }

    pub fn from_bundle(config: ServerConfig, bundle: ArtifactBundle) -> Result<Self> {
        let metrics =
            Arc::new(SignalMetrics::new(&config.monitoring.metrics, bundle.outlier.is_some())?);
        let state = AppState { service: InferenceService::new(bundle), metrics };
        Ok(Self { config, state })
    }

    pub fn service(&self) -> &InferenceService {
        &self.state.service
    }

    pub fn metrics(&self) -> Arc<SignalMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Create the application router with all routes and middleware.
    ///
    /// `/explain` and `/drift` exist only when their artifact is loaded.
    pub fn create_app(&self) -> Router {
        let bundle = self.state.service.bundle();
        let mut app = Router::new()
            .route("/predict", post(predict_handler))
            .route("/health", get(health_handler))
            .route(&self.config.monitoring.metrics.path, get(metrics_handler));

        if bundle.explainer.is_some() {
            app = app.route("/explain", post(explain_handler));
        }
        if bundle.drift.is_some() {
            app = app.route("/drift", post(drift_handler));
        }

        app.route_layer(middleware::from_fn_with_state(
            Arc::clone(&self.state.metrics),
            record_signals,
        ))
        .layer(TimeoutLayer::new(self.config.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start_with_shutdown<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.create_app();
        let addr = self.config.server.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!(
            addr = %addr,
            metrics_path = %self.config.monitoring.metrics.path,
            model_version = %self.state.service.bundle().model_version,
            "Starting Lookout server"
        );

        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
        tracing::info!("Lookout server stopped");
        Ok(())
    }
}

async fn predict_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let Json(body) = body?;
    let record = FeatureRecord::from_value(body)?;

    let outcome = state.service.predict(&record).inspect_err(|e| {
        tracing::info!(request_id = %request_id, error = %e, "Prediction rejected");
    })?;
    let signal = outcome.signal();

    tracing::info!(
        request_id = %request_id,
        label = signal.label,
        score = signal.score,
        outlier_score = signal.outlier_score,
        "Prediction served"
    );

    let mut response = Json(PredictResponse {
        label: outcome.prediction.label,
        score: outcome.prediction.score,
    })
    .into_response();
    for (name, value) in signal.header_pairs() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    response.extensions_mut().insert(signal);
    Ok(response)
}

async fn explain_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    let request_id = Uuid::new_v4();
    let Json(body) = body?;
    let record = FeatureRecord::from_value(body)?;

    let explanation = state.service.explain(record).await?;
    tracing::info!(
        request_id = %request_id,
        explained_class = explanation.explained_class,
        surrogate_score = explanation.score,
        contributions = explanation.contributions.len(),
        "Explanation served"
    );
    Ok(Json(explanation.contributions))
}

async fn drift_handler(
    State(state): State<AppState>,
    body: Result<Json<DriftRequest>, JsonRejection>,
) -> Result<Json<DriftTestResult>, ApiError> {
    let request_id = Uuid::new_v4();
    let Json(request) = body?;
    let records = request
        .records
        .into_iter()
        .map(FeatureRecord::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    let result = state.service.drift(&records)?;
    tracing::info!(
        request_id = %request_id,
        rows = records.len(),
        drift = result.drift,
        threshold = result.threshold,
        "Drift evaluated"
    );
    Ok(Json(result))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let bundle = state.service.bundle();
    Json(HealthResponse {
        status: "ok".to_string(),
        model_version: bundle.model_version.clone(),
        schema_version: bundle.schema_version().to_string(),
        outlier_enabled: bundle.outlier.is_some(),
        explainer_enabled: bundle.explainer.is_some(),
        drift_enabled: bundle.drift.is_some(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

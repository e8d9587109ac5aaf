//! Shared fixtures: a small passenger-survival model bundle and HTTP helpers.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use lookout_common::{FeatureRecord, FeatureSchema, FeatureSpec, FeatureVector};
use lookout_drift::{DEFAULT_GLOBAL_P_VALUE, DriftDetector, DriftReference};
use lookout_explain::{ExplainSettings, LocalExplainer};
use lookout_models::{
    Classifier, FeatureTransformer, LogisticRegression, ModelArtifact, OneClassSvm,
    OutlierArtifact, OutlierScorer,
};
use lookout_server::config::ArtifactPaths;
use lookout_server::{ArtifactBundle, LookoutServer, ServerConfig};
use serde_json::{Value, json};
use std::path::Path;
use tower::ServiceExt;

pub const SCHEMA_VERSION: &str = "titanic-v1";
pub const MODEL_VERSION: &str = "gbm-2024-06";

pub fn schema() -> FeatureSchema {
    FeatureSchema::new(
        SCHEMA_VERSION,
        vec![
            FeatureSpec::Numeric { name: "pclass".into(), field: "pclass".into(), impute: None },
            FeatureSpec::Categorical {
                name: "sex".into(),
                field: "sex".into(),
                categories: vec!["female".into(), "male".into()],
            },
            FeatureSpec::Numeric { name: "age".into(), field: "age".into(), impute: Some(28.0) },
            FeatureSpec::Numeric { name: "fare".into(), field: "fare".into(), impute: Some(14.45) },
            FeatureSpec::Categorical {
                name: "embarked".into(),
                field: "embarked".into(),
                categories: vec!["C".into(), "Q".into(), "S".into()],
            },
            FeatureSpec::Token {
                name: "title_mrs".into(),
                field: "name".into(),
                token: "Mrs".into(),
            },
            FeatureSpec::MissingIndicator { name: "age_missing".into(), field: "age".into() },
        ],
    )
}

pub fn model_artifact() -> ModelArtifact {
    ModelArtifact {
        version: MODEL_VERSION.into(),
        schema: schema(),
        classifier: Classifier::Logistic(LogisticRegression {
            coefficients: vec![vec![-0.9, -2.5, -0.03, 0.004, 0.0, 0.5, -0.2]],
            intercepts: vec![3.0],
        }),
        class_names: vec!["died".into(), "survived".into()],
    }
}

pub fn passenger(pclass: u32, sex: &str, age: Option<f64>, fare: f64) -> Value {
    let name =
        if sex == "female" { "Cumings, Mrs. John Bradley" } else { "Braund, Mr. Owen Harris" };
    json!({
        "pclass": pclass,
        "sex": sex,
        "age": age,
        "fare": fare,
        "embarked": "S",
        "name": name,
        "ticket": "A/5 21171"
    })
}

/// Deterministic synthetic training passengers.
pub fn training_records() -> Vec<FeatureRecord> {
    (0u32..240)
        .map(|i| {
            let pclass = 1 + i % 3;
            let age = (i % 10 != 0).then(|| f64::from(18 + (i * 7) % 50));
            let fare = f64::from(10 + (i * 13) % 90) + if pclass == 1 { 60.0 } else { 0.0 };
            let sex = if i % 2 == 0 { "female" } else { "male" };
            let mut record = passenger(pclass, sex, age, fare);
            record["embarked"] = json!(["S", "C", "Q"][((i / 3) % 3) as usize]);
            FeatureRecord::from_value(record).unwrap()
        })
        .collect()
}

pub fn transformer() -> FeatureTransformer {
    FeatureTransformer::new(schema()).unwrap()
}

pub fn training_vectors() -> Vec<FeatureVector> {
    transformer().transform_batch(&training_records()).unwrap()
}

pub fn outlier_detector() -> OneClassSvm {
    let vectors = training_vectors();
    let n = vectors.len() as f64;
    let arity = schema().arity();
    let mean: Vec<f64> =
        (0..arity).map(|j| vectors.iter().map(|v| v.values()[j]).sum::<f64>() / n).collect();
    let scale: Vec<f64> = (0..arity)
        .map(|j| {
            let var = vectors.iter().map(|v| (v.values()[j] - mean[j]).powi(2)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect();
    let support_vectors: Vec<Vec<f64>> = vectors
        .iter()
        .step_by(12)
        .map(|v| {
            v.values()
                .iter()
                .zip(mean.iter().zip(&scale))
                .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
                .collect()
        })
        .collect();
    let dual_coef = vec![1.0 / support_vectors.len() as f64; support_vectors.len()];
    OneClassSvm { mean, scale, gamma: 0.05, support_vectors, dual_coef, intercept: -0.3 }
}

pub fn outlier_scorer() -> OutlierScorer {
    OutlierScorer::new(outlier_detector(), schema().arity()).unwrap()
}

pub fn explain_settings() -> ExplainSettings {
    ExplainSettings {
        num_samples: 1500,
        num_features: 5,
        seed: Some(17),
        ..ExplainSettings::default()
    }
}

pub fn explainer() -> LocalExplainer {
    LocalExplainer::fit(
        &schema(),
        &training_vectors(),
        vec!["died".into(), "survived".into()],
        explain_settings(),
    )
    .unwrap()
}

pub fn drift_reference() -> DriftReference {
    DriftReference {
        schema_version: SCHEMA_VERSION.into(),
        global_p_value: DEFAULT_GLOBAL_P_VALUE,
        records: training_records(),
    }
}

pub fn drift_detector() -> DriftDetector {
    drift_reference().into_detector(&transformer()).unwrap()
}

pub fn model_only_bundle() -> ArtifactBundle {
    ArtifactBundle::from_model(model_artifact()).unwrap()
}

pub fn full_bundle() -> ArtifactBundle {
    model_only_bundle()
        .with_outlier(outlier_scorer())
        .with_explainer(explainer())
        .unwrap()
        .with_drift(drift_detector())
}

pub fn server(bundle: ArtifactBundle) -> LookoutServer {
    LookoutServer::from_bundle(ServerConfig::default(), bundle).unwrap()
}

pub fn app(bundle: ArtifactBundle) -> Router {
    server(bundle).create_app()
}

/// Write every artifact of the full bundle as JSON files under `dir`.
pub fn write_artifacts(dir: &Path) -> ArtifactPaths {
    let write = |name: &str, value: Value| {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
        path
    };

    fn json<T: serde::Serialize>(value: T) -> Value {
        serde_json::to_value(value).unwrap()
    }

    let outlier =
        OutlierArtifact { schema_version: SCHEMA_VERSION.into(), detector: outlier_detector() };
    ArtifactPaths {
        model: Some(write("model.json", json(model_artifact()))),
        outlier: Some(write("outlier.json", json(outlier))),
        explainer: Some(write("explainer.json", json(explainer().to_artifact()))),
        drift_reference: Some(write("drift.json", json(drift_reference()))),
    }
}

pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> JsonResponse {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String) -> JsonResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    JsonResponse { status, headers, body }
}

pub async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Cumulative count of a histogram bucket in Prometheus text output.
pub fn bucket_count(rendered: &str, metric: &str, le: f64) -> Option<u64> {
    let prefix = format!("{metric}_bucket{{");
    rendered.lines().filter(|l| l.starts_with(&prefix)).find_map(|line| {
        let start = line.find("le=\"")? + 4;
        let end = start + line[start..].find('"')?;
        let bound: f64 = line[start..end].parse().ok()?;
        if bound != le {
            return None;
        }
        line.rsplit(' ').next()?.parse().ok()
    })
}

/// Value of an unlabelled or fully labelled sample line.
pub fn sample_value(rendered: &str, series: &str) -> Option<f64> {
    rendered
        .lines()
        .find(|l| l.starts_with(series) && l[series.len()..].starts_with(' '))
        .and_then(|l| l.rsplit(' ').next())
        .and_then(|v| v.parse().ok())
}

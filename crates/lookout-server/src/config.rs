//! Configuration management with environment variable support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitoring::{LogFormat, MonitoringConfig};

/// API routes the scrape endpoint may not shadow.
const RESERVED_ROUTES: [&str; 4] = ["/predict", "/explain", "/drift", "/health"];

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub artifacts: ArtifactPaths,
    pub explain: ExplainOverrides,
    pub monitoring: MonitoringConfig,
}

/// Basic server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            graceful_shutdown_timeout_secs: 10,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locations of the frozen artifact bundle. Only the model is required.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ArtifactPaths {
    pub model: Option<PathBuf>,
    pub outlier: Option<PathBuf>,
    pub explainer: Option<PathBuf>,
    pub drift_reference: Option<PathBuf>,
}

/// Runtime overrides of the explainer artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ExplainOverrides {
    pub seed: Option<u64>,
    pub num_samples: Option<usize>,
}

/// Configuration builder with environment variable support
pub struct ConfigBuilder {
    config: ServerConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: ServerConfig::default() }
    }

    /// Load configuration from `LOOKOUT_*` environment variables
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn from_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = &mut self.config;

        if let Some(host) = lookup("LOOKOUT_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("LOOKOUT_PORT") {
            config.server.port = port.parse().context("LOOKOUT_PORT")?;
        }
        if let Some(timeout) = lookup("LOOKOUT_REQUEST_TIMEOUT") {
            config.server.request_timeout_secs =
                timeout.parse().context("LOOKOUT_REQUEST_TIMEOUT")?;
        }
        if let Some(timeout) = lookup("LOOKOUT_SHUTDOWN_TIMEOUT") {
            config.server.graceful_shutdown_timeout_secs =
                timeout.parse().context("LOOKOUT_SHUTDOWN_TIMEOUT")?;
        }

        // Artifacts
        if let Some(path) = lookup("LOOKOUT_MODEL_PATH") {
            config.artifacts.model = Some(path.into());
        }
        if let Some(path) = lookup("LOOKOUT_OUTLIER_PATH") {
            config.artifacts.outlier = Some(path.into());
        }
        if let Some(path) = lookup("LOOKOUT_EXPLAINER_PATH") {
            config.artifacts.explainer = Some(path.into());
        }
        if let Some(path) = lookup("LOOKOUT_DRIFT_REFERENCE_PATH") {
            config.artifacts.drift_reference = Some(path.into());
        }

        if let Some(seed) = lookup("LOOKOUT_EXPLAIN_SEED") {
            config.explain.seed = Some(seed.parse().context("LOOKOUT_EXPLAIN_SEED")?);
        }
        if let Some(samples) = lookup("LOOKOUT_EXPLAIN_SAMPLES") {
            config.explain.num_samples = Some(samples.parse().context("LOOKOUT_EXPLAIN_SAMPLES")?);
        }

        // Monitoring
        if let Some(namespace) = lookup("LOOKOUT_METRICS_NAMESPACE") {
            config.monitoring.metrics.namespace = namespace;
        }
        if let Some(subsystem) = lookup("LOOKOUT_METRICS_SUBSYSTEM") {
            config.monitoring.metrics.subsystem = subsystem;
        }
        if let Some(path) = lookup("LOOKOUT_METRICS_PATH") {
            config.monitoring.metrics.path = path;
        }
        if let Some(level) = lookup("LOOKOUT_LOG_LEVEL") {
            config.monitoring.log_level = level;
        }
        if let Some(format) = lookup("LOOKOUT_LOG_FORMAT") {
            match format.parse::<LogFormat>() {
                Ok(format) => config.monitoring.log_format = format,
                Err(e) => tracing::warn!("Invalid LOOKOUT_LOG_FORMAT value '{}': {}", format, e),
            }
        }
        if let Some(dir) = lookup("LOOKOUT_LOG_DIR") {
            config.monitoring.log_dir = Some(dir.into());
        }

        Ok(self)
    }

    /// Load configuration from a TOML file, replacing the current values
    pub fn from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        self.config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(self)
    }

    pub fn with_server_settings(mut self, settings: ServerSettings) -> Self {
        self.config.server = settings;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactPaths) -> Self {
        self.config.artifacts = artifacts;
        self
    }

    pub fn with_monitoring(mut self, config: MonitoringConfig) -> Self {
        self.config.monitoring = config;
        self
    }

    /// Validate configuration
    pub fn validate(self) -> Result<Self> {
        let config = &self.config;

        if config.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if config.server.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be at least one second");
        }

        let metrics = &config.monitoring.metrics;
        if metrics.namespace.is_empty() && metrics.subsystem.is_empty() {
            anyhow::bail!("Metrics namespace and subsystem cannot both be empty");
        }
        for part in [&metrics.namespace, &metrics.subsystem] {
            if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                anyhow::bail!("Invalid metric name component: {}", part);
            }
        }
        if !metrics.path.starts_with('/') {
            anyhow::bail!("Metrics path must start with '/': {}", metrics.path);
        }
        if RESERVED_ROUTES.contains(&metrics.path.as_str()) {
            anyhow::bail!("Metrics path collides with an API route: {}", metrics.path);
        }

        if config.explain.num_samples.is_some_and(|n| n < 2) {
            anyhow::bail!("Explainer needs at least two samples");
        }

        Ok(self)
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl From<ServerConfig> for ConfigBuilder {
    fn from(config: ServerConfig) -> Self {
        Self { config }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration with precedence:
/// 1. Environment variables (highest precedence)
/// 2. Configuration file (`LOOKOUT_CONFIG_FILE` or `lookout.toml`)
/// 3. Default values (lowest precedence)
pub fn load_config() -> Result<ServerConfig> {
    let mut builder = ConfigBuilder::new();

    if let Ok(config_file) = env::var("LOOKOUT_CONFIG_FILE") {
        builder = builder.from_file(config_file)?;
    } else {
        for default_path in ["lookout.toml", "config/lookout.toml"] {
            if Path::new(default_path).exists() {
                builder = builder.from_file(default_path)?;
                break;
            }
        }
    }

    Ok(builder.from_env()?.validate()?.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.monitoring.metrics.namespace, "mlops");
        assert_eq!(config.monitoring.metrics.subsystem, "model");
        assert!(config.artifacts.model.is_none());
    }

    #[test]
    fn test_env_override() {
        let config = ConfigBuilder::new()
            .from_lookup(lookup(&[
                ("LOOKOUT_PORT", "9090"),
                ("LOOKOUT_MODEL_PATH", "/srv/model.json"),
                ("LOOKOUT_EXPLAIN_SEED", "42"),
                ("LOOKOUT_METRICS_NAMESPACE", "titanic"),
                ("LOOKOUT_LOG_FORMAT", "compact"),
            ]))
            .unwrap()
            .validate()
            .unwrap()
            .build();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.artifacts.model, Some(PathBuf::from("/srv/model.json")));
        assert_eq!(config.explain.seed, Some(42));
        assert_eq!(config.monitoring.metrics.metric_name("label"), "titanic_model_label");
        assert_eq!(config.monitoring.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_bad_numbers_are_errors() {
        assert!(ConfigBuilder::new().from_lookup(lookup(&[("LOOKOUT_PORT", "http")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let settings = ServerSettings { request_timeout_secs: 0, ..ServerSettings::default() };
        assert!(ConfigBuilder::new().with_server_settings(settings).validate().is_err());

        let mut monitoring = MonitoringConfig::default();
        monitoring.metrics.namespace = "ml-ops".into();
        assert!(ConfigBuilder::new().with_monitoring(monitoring).validate().is_err());

        let mut monitoring = MonitoringConfig::default();
        monitoring.metrics.path = "/predict".into();
        assert!(ConfigBuilder::new().with_monitoring(monitoring).validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 7000

[artifacts]
model = "artifacts/model.json"
explainer = "artifacts/explainer.json"

[monitoring.metrics]
subsystem = "titanic"
"#
        )
        .unwrap();

        let config = ConfigBuilder::new().from_file(file.path()).unwrap().build();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.artifacts.explainer, Some(PathBuf::from("artifacts/explainer.json")));
        assert_eq!(
            config.monitoring.metrics.metric_name("model_score"),
            "mlops_titanic_model_score"
        );
    }
}

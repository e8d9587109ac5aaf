//! Monitoring configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Console log rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => anyhow::bail!("Unknown log format: {}", s),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        };
        f.write_str(name)
    }
}

/// Naming and exposure of the model metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub namespace: String,
    pub subsystem: String,
    /// Scrape endpoint.
    pub path: String,
    /// Route whose responses carry a model signal.
    pub signal_route: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "mlops".to_string(),
            subsystem: "model".to_string(),
            path: "/metrics".to_string(),
            signal_route: "/predict".to_string(),
        }
    }
}

impl MetricsConfig {
    /// `<namespace>_<subsystem>_<name>`, skipping empty parts.
    pub fn metric_name(&self, name: &str) -> String {
        [self.namespace.as_str(), self.subsystem.as_str(), name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub metrics: MetricsConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Directory for daily rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_join_prefix() {
        let config = MetricsConfig::default();
        assert_eq!(config.metric_name("model_score"), "mlops_model_model_score");

        let bare = MetricsConfig { subsystem: String::new(), ..MetricsConfig::default() };
        assert_eq!(bare.metric_name("label"), "mlops_label");
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }
}

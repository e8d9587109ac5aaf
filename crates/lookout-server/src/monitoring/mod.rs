//! Monitoring: metric registry, side-channel middleware and tracing setup

pub mod config;
pub mod metrics;
pub mod side_channel;
pub mod tracing;

pub use self::config::{LogFormat, MetricsConfig, MonitoringConfig};
pub use self::metrics::{MetricNames, SignalMetrics};
pub use self::side_channel::record_signals;
pub use self::tracing::{TracingGuard, init_tracing};

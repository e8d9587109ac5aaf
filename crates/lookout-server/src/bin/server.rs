//! Lookout server binary

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lookout_common::FeatureRecord;
use lookout_server::config::load_config;
use lookout_server::monitoring::{LogFormat, init_tracing};
use lookout_server::{
    ArtifactBundle, ConfigBuilder, DriftRequest, InferenceService, LookoutServer, ServerConfig,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lookout-server")]
#[command(about = "Model inference gateway with side-channel metrics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Flags layered over the config file and `LOOKOUT_*` variables
#[derive(Args)]
struct Overrides {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model artifact (schema + classifier)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Outlier detector artifact
    #[arg(long, global = true)]
    outlier: Option<PathBuf>,

    /// Explainer artifact
    #[arg(long, global = true)]
    explainer: Option<PathBuf>,

    /// Drift reference artifact
    #[arg(long, global = true)]
    drift_reference: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (json, pretty, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Server host address
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Evaluate a batch of records against the drift reference and print
    /// the verdict as JSON
    Drift {
        /// JSON array of records, or an object with a `records` array
        #[arg(long)]
        input: PathBuf,

        /// Exit with status 2 when drift is detected
        #[arg(long)]
        fail_on_drift: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = base_config(&cli.overrides)?;
    apply_overrides(&mut config, &cli.overrides)?;

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let config = ConfigBuilder::from(config).validate()?.build();
            let _guard = init_tracing(&config.monitoring)?;
            serve(config).await
        }
        Command::Drift { input, fail_on_drift } => {
            let config = ConfigBuilder::from(config).validate()?.build();
            run_drift(&config, &input, fail_on_drift)
        }
    }
}

fn base_config(overrides: &Overrides) -> Result<ServerConfig> {
    match &overrides.config {
        Some(path) => Ok(ConfigBuilder::new().from_file(path)?.from_env()?.build()),
        None => load_config(),
    }
}

fn apply_overrides(config: &mut ServerConfig, overrides: &Overrides) -> Result<()> {
    let artifacts = &mut config.artifacts;
    for (slot, value) in [
        (&mut artifacts.model, &overrides.model),
        (&mut artifacts.outlier, &overrides.outlier),
        (&mut artifacts.explainer, &overrides.explainer),
        (&mut artifacts.drift_reference, &overrides.drift_reference),
    ] {
        if value.is_some() {
            slot.clone_from(value);
        }
    }
    if let Some(level) = &overrides.log_level {
        config.monitoring.log_level = level.clone();
    }
    if let Some(format) = &overrides.log_format {
        config.monitoring.log_format = format.parse::<LogFormat>()?;
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> Result<()> {
    let drain_timeout = config.server.graceful_shutdown_timeout();
    let server = LookoutServer::new(config)?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut handle = tokio::spawn(async move {
        server
            .start_with_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut handle => return joined?,
        _ = wait_for_shutdown() => {}
    }

    info!("Shutdown signal received, draining requests...");
    let _ = stop_tx.send(());
    match tokio::time::timeout(drain_timeout, handle).await {
        Ok(joined) => joined??,
        Err(_) => warn!(timeout = ?drain_timeout, "Drain timeout exceeded, exiting"),
    }

    info!("Server stopped");
    Ok(())
}

fn run_drift(config: &ServerConfig, input: &Path, fail_on_drift: bool) -> Result<()> {
    let service = InferenceService::new(ArtifactBundle::load(&config.artifacts, &config.explain)?);

    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let records = parse_records(serde_json::from_str(&text)?)?;

    let result = service.drift(&records)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if fail_on_drift && result.drift {
        std::process::exit(2);
    }
    Ok(())
}

fn parse_records(value: Value) -> Result<Vec<FeatureRecord>> {
    let items = match value {
        Value::Array(items) => items,
        other => serde_json::from_value::<DriftRequest>(other)
            .context("expected a JSON array or an object with a `records` array")?
            .records,
    };
    Ok(items.into_iter().map(FeatureRecord::from_value).collect::<Result<Vec<_>, _>>()?)
}

/// Wait for shutdown signals
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

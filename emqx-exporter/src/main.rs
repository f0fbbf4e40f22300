mod collector;
mod exporter_metrics;
mod server;
mod service_configuration;


use crate::collector::{Collector, COLLECTORS};
use crate::exporter_metrics::init_metrics;
use crate::server::{build_router, AppState};
use crate::service_configuration::ServiceConfiguration;

use anyhow::{Context, Result};
use clap::Parser;
use emqx_client::Cluster;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "emqx-exporter")]
#[command(about = "Prometheus exporter for EMQX clusters, speaking both the 4.x and 5.x admin APIs", long_about = None)]
#[command(version)]
struct Args {
    /// EMQX exporter configuration file
    #[arg(
        long,
        env = "EMQX_EXPORTER_CONFIG",
        default_value = "/etc/emqx-exporter/config.yaml"
    )]
    config_file: PathBuf,

    /// HTTP listen address for /metrics
    #[arg(long, env = "EMQX_EXPORTER_LISTEN_ADDR", default_value = "0.0.0.0:8085")]
    listen_addr: SocketAddr,

    /// Exclude metrics about the exporter itself (emqx_exporter_*)
    #[arg(long)]
    disable_exporter_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "starting emqx-exporter");

    if running_as_root() {
        warn!("EMQX exporter is running as root user. This exporter is designed to run as unprivileged user, root is not required.");
    }

    // Load the configuration from the specified YAML file
    let service_config = ServiceConfiguration::load(&args.config_file)?;
    let config_yaml = service_config
        .to_redacted_yaml()
        .context("failed to render configuration")?;
    info!(
        config_file = %args.config_file.display(),
        target = %service_config.metrics.target,
        "loaded configuration"
    );

    let handle = init_metrics()?;

    let shutdown = CancellationToken::new();
    let cluster = Cluster::connect(
        &service_config.endpoint(),
        service_config.discovery_options(),
        shutdown.child_token(),
    )
    .context("failed to create the EMQX cluster client")?;

    for collector in COLLECTORS {
        info!(collector, "enabled collector");
    }

    let state = Arc::new(AppState {
        collector: Collector::new(cluster, !args.disable_exporter_metrics),
        handle,
        config_yaml,
    });

    let listener = TcpListener::bind(args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;

    tokio::spawn(shutdown_signal(shutdown.clone()));
    server::serve(listener, build_router(state), shutdown).await
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, stopping discovery and draining connections");
    shutdown.cancel();
}

#[cfg(unix)]
fn running_as_root() -> bool {
    use std::os::unix::fs::MetadataExt;
    // /proc/self is owned by the effective uid of the process
    std::fs::metadata("/proc/self")
        .map(|m| m.uid() == 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

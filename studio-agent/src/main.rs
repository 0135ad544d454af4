//! studio-agent - creative studio orchestration service
//!
//! Runs concept and asset workflows against the generation backend and
//! serves the session over HTTP REST + SSE. Without a configured backend it
//! runs fully offline on canned services.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studio_common::config::StudioConfig;
use studio_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use studio_agent::services::{
    CannedCreativeService, CannedWorkflowClient, CreativeService, FallbackWorkflowClient,
    HttpCreativeService, HttpWorkflowClient, WorkflowClient,
};
use studio_agent::{AppState, Studio};

/// Event bus capacity before slow SSE clients lag
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for studio-agent
#[derive(Parser, Debug)]
#[command(name = "studio-agent")]
#[command(about = "Creative studio workflow orchestration service")]
#[command(version)]
struct Args {
    /// Config file (overrides STUDIO_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "STUDIO_PORT")]
    port: Option<u16>,

    /// Use the canned offline services even if a backend is configured
    #[arg(long)]
    canned: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing before config resolution so its logs are kept
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter("info").into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = StudioConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over logging.level
    if std::env::var_os("RUST_LOG").is_none() {
        if let Err(e) = filter_handle.reload(EnvFilter::new(default_filter(&config.logging.level))) {
            warn!("Failed to apply logging.level {}: {}", config.logging.level, e);
        }
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.canned {
        config.remote.use_canned = true;
    }

    info!("Starting studio-agent v{}", env!("CARGO_PKG_VERSION"));

    let (service, workflow_client) = build_services(&config)?;
    info!("Creative service: {}", service.service_name());

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let studio = Studio::new(&config, service, workflow_client, event_bus);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let app = studio_agent::build_router(AppState::new(studio.clone(), config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    studio.reset();
    info!("Server shutdown complete");
    Ok(())
}

fn default_filter(level: &str) -> String {
    format!("studio_agent={level},studio_common={level},tower_http=debug")
}

/// Pick live or canned backends
///
/// The live workflow client falls back to the canned one on transport failure.
fn build_services(config: &StudioConfig) -> Result<(Arc<dyn CreativeService>, Arc<dyn WorkflowClient>)> {
    if config.remote.is_offline() {
        info!("Running offline with canned services");
        return Ok((
            Arc::new(CannedCreativeService::new()),
            Arc::new(CannedWorkflowClient),
        ));
    }

    if config.remote.api_key.is_none() {
        warn!("No API key configured; the backend may reject requests");
    }

    let service = HttpCreativeService::new(&config.remote).context("Failed to build creative service")?;
    let primary = HttpWorkflowClient::new(&config.remote).context("Failed to build workflow client")?;
    let workflow_client = FallbackWorkflowClient::new(Arc::new(primary), Arc::new(CannedWorkflowClient));
    Ok((Arc::new(service), Arc::new(workflow_client)))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

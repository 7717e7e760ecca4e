//! Resource Server
//!
//! Serves a GET-only resource protected by bearer token authentication.

use anyhow::Context;
use bearer_auth::TokenValidationPipeline;
use resource_server::config::{Config, ServiceDocument};
use resource_server::observability::metrics::init_metrics_recorder;
use resource_server::routes::{self, AppState};
use resource_server::server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "resource_server=debug,bearer_auth=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Resource Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_config_path = %config.auth_config_path.display(),
        request_timeout_seconds = config.request_timeout.as_secs(),
        drain_seconds = config.drain_period.as_secs(),
        "Configuration loaded successfully"
    );

    // Nothing is served unless every key loads
    let document = ServiceDocument::load(&config.auth_config_path).map_err(|e| {
        error!("Failed to load service document: {}", e);
        e
    })?;
    let pipeline = TokenValidationPipeline::initialize(document.into_authentication())
        .map_err(|e| {
            error!("Failed to initialize token validation: {}", e);
            e
        })?;

    let metrics_handle = init_metrics_recorder().map_err(|e| anyhow::anyhow!(e))?;

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    let drain_period = config.drain_period;

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        config,
    });
    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Resource Server listening on {}", addr);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            server::shutdown_signal(drain_period).await;
            shutdown.cancel();
        }
    });

    server::serve(listener, app, shutdown).await?;

    info!("Resource Server shutdown complete");

    Ok(())
}

/// `RUST_LOG` selects levels; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

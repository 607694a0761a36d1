//! # sharescan server
//!
//! Locally-hosted dashboard service that scans a collaboration tenant for
//! sites, permissions and sharing exposure. Long-running scans execute on an
//! isolated background task while the request loop keeps serving short
//! requests; the browser observes progress by polling.
//!
//! ## Crate organization
//!
//! - **api/**: router and request handlers
//! - **operations/**: shared operation state, single-flight coordinator and
//!   the worker that runs one scan to completion
//! - **scans.rs**: the work units for the three scan operations
//! - **reports.rs**: latest collected scan data for report/export endpoints
//! - **config.rs**: configuration validation
//! - **error.rs**: API error type and response mapping
//! - **main.rs**: entry point and server setup

use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use axum::Router;
use clap::Parser;
use sharescan_core::client::HttpTenantConnector;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use config::Config;
use operations::OperationCoordinator;
use reports::ReportStore;

mod api;
mod config;
mod error;
mod operations;
mod reports;
mod scans;

/// Tenant sharing-exposure reporting dashboard
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root URL of the tenant admin service
    #[arg(long, env = "SHARESCAN_TENANT_URL")]
    tenant_url: Url,

    /// Client identifier used for silent re-authentication
    #[arg(long, env = "SHARESCAN_CLIENT_ID")]
    client_id: Option<String>,

    /// Access token forwarded to scan workers
    #[arg(long, env = "SHARESCAN_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Path to the local token cache backing silent re-authentication
    #[arg(long, env = "SHARESCAN_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,

    /// Acquire credentials non-interactively only
    #[arg(long, env = "SHARESCAN_HEADLESS")]
    headless: bool,

    /// Host address to bind to
    #[arg(long, env = "SHARESCAN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "SHARESCAN_PORT", default_value = "8787")]
    port: u16,

    /// Logging level (info, debug, trace)
    #[arg(long, env = "SHARESCAN_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

pub type ApiContextRef = Arc<ApiContext>;

pub struct ApiContext {
    pub config: Config,
    pub coordinator: OperationCoordinator,
    pub reports: Arc<ReportStore>,
    pub shutdown: CancellationToken,
}

impl ApiContext {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        let connector = Arc::new(HttpTenantConnector::new(config.token_cache.clone()));
        Self {
            coordinator: OperationCoordinator::new(connector),
            reports: Arc::new(ReportStore::new()),
            config,
            shutdown,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = Level::from_str(cli.log_level.to_lowercase().as_str()).unwrap_or(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        "Starting sharescan server"
    );

    let config = match Config::try_new(
        cli.tenant_url,
        cli.client_id,
        cli.access_token,
        cli.token_cache,
        cli.headless,
    ) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        tenant_url = %config.tenant_url,
        headless = config.headless,
        "Configuration validated successfully"
    );

    // Create shutdown signal handler; /api/shutdown cancels the same token
    let shutdown_token = CancellationToken::new();
    let shutdown_token_ = shutdown_token.clone();

    tokio::spawn(async move {
        handle_shutdown_signals(shutdown_token_).await;
    });

    let context = Arc::new(ApiContext::new(config, shutdown_token.clone()));

    let app = Router::new()
        .merge(api::router())
        .with_state(Arc::clone(&context));

    let addr: SocketAddr = match format!("{}:{}", cli.host, cli.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse socket address: {}", e);
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "Listening for connections");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server started, open http://{addr}/ in a browser");
    let server_handle = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_token))
        .await;

    match server_handle {
        Ok(_) => info!("Server shut down gracefully"),
        Err(e) => error!(error = %e, "Server error during shutdown"),
    }

    info!("sharescan server shutdown complete");
}

/// Handler function for shutdown signals
async fn handle_shutdown_signals(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    shutdown_token.cancel();
}

/// Returns a future that resolves when the shutdown signal is received
async fn shutdown_signal_handler(token: CancellationToken) {
    token.cancelled().await;
    info!("Shutdown signal received, starting graceful shutdown");

    // Give in-flight requests some time to complete
    tokio::time::sleep(Duration::from_secs(1)).await;
}

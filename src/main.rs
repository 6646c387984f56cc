//! lb-probe entry point.
//!
//! Initializes tracing, loads configuration from an optional TOML file,
//! builds the metadata client and router, and runs the HTTP server until a
//! shutdown signal arrives.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lb_probe::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use lb_probe::http::start_server;
use lb_probe::{create_router, AppState};

/// lb-probe: load balancer health and diagnostic endpoint
#[derive(Parser, Debug)]
#[command(name = "lb-probe", version, about)]
struct Args {
    /// Path to configuration file (optional; defaults apply when missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "lb_probe=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Bind address, overrides http.host
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides http.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Configuration first: it decides the log format
    let mut config = AppConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        config = %args.config,
        metadata_enabled = config.metadata.enabled,
        metadata_base_url = %config.metadata.base_url,
        metadata_timeout_ms = config.metadata.timeout_ms,
        parallel = config.metadata.parallel,
        "Loaded configuration"
    );

    let state = AppState::new(config.clone());
    let app = create_router(state);

    start_server(app, &config).await?;

    Ok(())
}

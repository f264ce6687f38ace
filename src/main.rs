//! Control-plane server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use control_plane::config::{Config, VERBOSE_LOG_FILTER};
use control_plane::metrics::{self, export_enabled, MetricsRegistry};
use control_plane::utils::shutdown_signal;
use control_plane::{ApiError, ControlPlaneServer, DeliveryHandler, PushRequest};

/// Internal control-plane HTTP server.
#[derive(Parser, Debug)]
#[command(name = "control-plane")]
#[command(about = "Serves health, pub/sub push routing and JSON metrics")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the control-plane routes (default).
    Run {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// Register a handler that logs deliveries for this subscription.
        #[arg(long = "log-subscription", value_name = "ID")]
        log_subscriptions: Vec<String>,
    },

    /// Check configuration validity.
    CheckConfig,
}

/// Delivery handler that logs each push and accepts it.
struct LogDeliveries;

#[async_trait]
impl DeliveryHandler for LogDeliveries {
    async fn handle(&self, request: PushRequest) -> Result<(), ApiError> {
        info!(
            subscription_id = %request.subscription_id,
            bytes = request.body.len(),
            "received push delivery"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration carries the log filter, so it loads before logging
    let config = Config::load();

    // Initialize logging
    let directive = match &config {
        _ if args.verbose => VERBOSE_LOG_FILTER,
        Ok(config) => config.log_filter(),
        Err(_) => "info",
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::Run {
            port,
            log_subscriptions,
        }) => cmd_run(config, port, log_subscriptions).await,
        None => cmd_run(config, None, Vec::new()).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(loaded: control_plane::Result<Config>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CONTROL PLANE - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match loaded {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let build = config.build_metadata();
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Revision: {}", build.commit.as_revision_string());
    println!("  Compiler: {}", build.compiler);
    println!("  Deploy ID: {}", build.deploy_id);
    println!(
        "  JSON Metrics: {}",
        if export_enabled(&config) { "Enabled" } else { "Disabled" }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Serve until a shutdown signal arrives.
async fn cmd_run(
    loaded: control_plane::Result<Config>,
    port_override: Option<u16>,
    log_subscriptions: Vec<String>,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(port) = port_override {
        config.port = port;
    }

    config.validate().map_err(|e| {
        error!("{}", e);
        e
    })?;

    // Initialize metrics
    let registry = MetricsRegistry::new();
    registry.install()?;
    metrics::init_metrics();

    let server = ControlPlaneServer::new(&config, registry);
    for subscription_id in log_subscriptions {
        server.register_delivery_handler(subscription_id, Arc::new(LogDeliveries));
    }
    info!(
        subscriptions = server.subscription_count(),
        "Delivery handlers registered"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    server.serve(listener, shutdown_signal()).await?;

    Ok(())
}

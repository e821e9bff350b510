use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camwatch::config::ConfigStore;
use camwatch::events::EventBus;
use camwatch::health::HealthMonitor;
use camwatch::state::AppState;
use camwatch::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// camwatch command line arguments
#[derive(Parser, Debug)]
#[command(name = "camwatch")]
#[command(version, about = "Networked camera viewer with motion detection and recording", long_about = None)]
struct CliArgs {
    /// Listen address (overrides database config)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides database config)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Data directory path (default: ./data)
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Recording directory (default: <data dir>/recordings)
    #[arg(short = 'r', long, value_name = "DIR")]
    recordings_dir: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting camwatch v{}", env!("CARGO_PKG_VERSION"));

    // Determine data directory (CLI arg takes precedence)
    let data_dir = args.data_dir.unwrap_or_else(get_data_dir);
    tracing::info!("Data directory: {}", data_dir.display());
    tokio::fs::create_dir_all(&data_dir).await?;

    // Initialize configuration store
    let db_path = data_dir.join("camwatch.db");
    let config_store = ConfigStore::new(&db_path).await?;
    let mut config = (*config_store.get()).clone();

    // Apply CLI argument overrides (not persisted)
    if let Some(addr) = args.address {
        config.web.bind_address = addr;
    }
    if let Some(port) = args.http_port {
        config.web.http_port = port;
    }

    let recordings_dir = args
        .recordings_dir
        .unwrap_or_else(|| config.recording.dir_path(&data_dir));
    tokio::fs::create_dir_all(&recordings_dir).await?;
    tracing::info!("Recording directory: {}", recordings_dir.display());

    let bind_ip: IpAddr = config
        .web
        .bind_address
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid bind address: {}", config.web.bind_address))?;
    let bind_addr = SocketAddr::new(bind_ip, config.web.http_port);

    let events = Arc::new(EventBus::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = AppState::new(
        config_store,
        events,
        shutdown_tx.clone(),
        recordings_dir,
    );

    // Camera health checks run independently of any viewer
    let monitor = Arc::new(HealthMonitor::new(
        &config.health,
        state.registry.clone(),
        state.cameras.clone(),
        state.events.clone(),
    )?);
    let monitor_task = monitor.spawn(state.shutdown_signal());

    let app = web::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

    // Setup graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        // Pipelines end their viewer streams on this signal
        let _ = shutdown_tx.send(());
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        tracing::error!("HTTP server error: {}", e);
    }

    let _ = monitor_task.await;
    state.config.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "camwatch=error,tower_http=error",
        LogLevel::Warn => "camwatch=warn,tower_http=warn",
        LogLevel::Info => "camwatch=info,tower_http=info",
        LogLevel::Verbose => "camwatch=debug,tower_http=info",
        LogLevel::Debug => "camwatch=debug,tower_http=debug",
        LogLevel::Trace => "camwatch=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the application data directory
fn get_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("CAMWATCH_DATA_DIR") {
        return PathBuf::from(path);
    }

    PathBuf::from("./data")
}

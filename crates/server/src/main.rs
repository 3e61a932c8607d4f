use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediarequest_core::{
    load_config, validate_config, ArrClient, Backends, BackendConfig, ConversationEngine,
    Defaults, MediaBackend, MediaKind, RequestResolver, VoiceBridge,
};
use mediarequest_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug,reqwest=warn,hyper=warn,hyper_util=warn";

/// Optional path of a log file written alongside stderr.
const LOG_FILE_ENV: &str = "MEDIAREQ_LOG_FILE";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = init_logging();

    info!("mediarequest {} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("MEDIAREQ_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration loaded successfully (hash {})", &config_hash[..16]);

    // Connect backends; either one failing aborts startup
    let series = connect_backend(MediaKind::Series, &config.sonarr).await?;
    let movie = connect_backend(MediaKind::Movie, &config.radarr).await?;

    // Resolve voice capability once
    let voice = VoiceBridge::from_config(&config.voice);

    let resolver = RequestResolver::new(
        Backends::new(series, movie),
        Defaults::from_config(&config),
        config.session.max_candidates,
    );
    let engine = Arc::new(ConversationEngine::new(
        resolver,
        voice,
        Duration::from_secs(config.session.idle_timeout_secs),
    ));
    info!(
        "Conversation engine ready (idle timeout {}s, max {} candidates)",
        config.session.idle_timeout_secs, config.session.max_candidates
    );

    // Background session sweeper
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = engine.spawn_sweeper(
        Duration::from_secs(config.session.sweep_interval_secs.max(1)),
        shutdown_rx,
    );

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&engine)));
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    let _ = sweeper.await;
    info!("Session sweeper stopped");

    Ok(())
}

/// Install the stderr subscriber, plus a plain-text file layer when
/// `MEDIAREQ_LOG_FILE` is set.
fn init_logging() -> Option<WorkerGuard> {
    let log_file = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from);
    let appender = log_file.as_deref().map(file_appender);

    let (file_writer, guard) = match appender {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    if let (Some(path), None) = (&log_file, &guard) {
        warn!("Cannot open log file {:?}, logging to stderr only", path);
    }
    guard
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("log file path has no file name")?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .context("failed to open log file")
}

/// Build a backend client and probe it.
async fn connect_backend(kind: MediaKind, config: &BackendConfig) -> Result<Arc<dyn MediaBackend>> {
    let client = ArrClient::new(kind, config)
        .with_context(|| format!("Failed to create {} client", kind))?;

    info!("Testing {} connection at {}", client.name(), config.url);
    client
        .test_connection()
        .await
        .with_context(|| format!("{} at {} is not reachable", client.name(), config.url))?;
    info!("{} connection OK", client.name());

    Ok(Arc::new(client))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

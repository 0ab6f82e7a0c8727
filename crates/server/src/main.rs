mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use steward_core::{
    load_config, validate_config, ChangeExecutor, Config, DeviceConnector, DriverRegistry,
    GmailNotifier, LogNotifier, MemoryRecordStore, Notifier, NotifierBackend, Orchestrator,
    RecordStore, RecordsBackend, RefreshingToken, SheetsRecordStore, SshConnector, StaticToken,
    TokenSource, VlanCatalog, WorkerPool,
};

use api::create_router;
use state::AppState;

/// Upper bound on waiting for an in-flight batch at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("STEWARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        vlans = config.vlans.len(),
        workers = config.orchestrator.max_workers,
        records = ?config.records.backend,
        notifier = ?config.notifier.backend,
        "Configuration summary"
    );

    let catalog = Arc::new(VlanCatalog::new(config.vlans.clone()).context("Invalid VLAN table")?);
    let drivers = Arc::new(
        DriverRegistry::from_config(&config.device).context("Failed to build driver registry")?,
    );
    let connector: Arc<dyn DeviceConnector> = Arc::new(SshConnector::new(&config.device));
    let google = create_google_tokens(&config)?;
    let records = create_record_store(&config, google.clone())?;
    info!("Record store: {}", records.name());
    let notifier = create_notifier(&config, google)?;
    info!("Notifier: {}", notifier.name());

    if config.notifier.operators.is_empty() {
        warn!("No operators configured; failure notifications are disabled");
    }

    let executor = Arc::new(ChangeExecutor::new(
        connector,
        drivers,
        Arc::clone(&catalog),
        Arc::clone(&records),
        notifier,
        config.notifier.operators.clone(),
    )
    .with_timezone(config.records.timezone));
    let pool = Arc::new(WorkerPool::new(config.orchestrator.max_workers, executor));

    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator.clone(),
        records,
        Arc::clone(&pool),
        Arc::clone(&catalog),
        config.device.port,
    )
    .with_timezone(config.records.timezone));

    if config.orchestrator.enabled {
        orchestrator.start().await;
    } else {
        info!("Orchestrator disabled in config");
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        catalog,
        Arc::clone(&orchestrator),
    ));

    // Create router
    let app = create_router(state);

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
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        if orchestrator.is_running() {
            orchestrator.stop().await;
        }
        pool.shutdown().await;
    })
    .await;
    if drained.is_err() {
        warn!(
            "In-flight jobs did not finish within {:?}; exiting anyway",
            SHUTDOWN_GRACE
        );
    }

    Ok(())
}

/// One refreshing token source shared by every Google backend, when an
/// OAuth client is configured.
fn create_google_tokens(config: &Config) -> Result<Option<Arc<dyn TokenSource>>> {
    match &config.google {
        Some(google) => {
            info!("Using Google OAuth client {}", google.client_id);
            let tokens = RefreshingToken::new(google).context("Failed to create token source")?;
            Ok(Some(Arc::new(tokens)))
        }
        None => Ok(None),
    }
}

/// The shared source, or the backend's fixed token.
fn tokens_or_static(shared: Option<Arc<dyn TokenSource>>, fixed: &str) -> Arc<dyn TokenSource> {
    shared.unwrap_or_else(|| {
        warn!("No [google] client configured; using a fixed access token that will expire");
        Arc::new(StaticToken::new(fixed))
    })
}

fn create_record_store(
    config: &Config,
    google: Option<Arc<dyn TokenSource>>,
) -> Result<Arc<dyn RecordStore>> {
    match config.records.backend {
        RecordsBackend::Sheets => {
            let sheets = config
                .records
                .sheets
                .clone()
                .ok_or_else(|| anyhow!("sheets backend selected but no [records.sheets] provided"))?;
            info!("Initializing Google Sheets store for {}", sheets.spreadsheet_id);
            let tokens = tokens_or_static(google, &sheets.access_token);
            let store =
                SheetsRecordStore::new(sheets, tokens).context("Failed to create sheets store")?;
            Ok(Arc::new(store))
        }
        RecordsBackend::Memory => {
            warn!("Using in-memory record store; nothing will be processed");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}

fn create_notifier(
    config: &Config,
    google: Option<Arc<dyn TokenSource>>,
) -> Result<Arc<dyn Notifier>> {
    match config.notifier.backend {
        NotifierBackend::Gmail => {
            let gmail = config
                .notifier
                .gmail
                .as_ref()
                .ok_or_else(|| anyhow!("gmail backend selected but no [notifier.gmail] provided"))?;
            let tokens = tokens_or_static(google, &gmail.access_token);
            let notifier =
                GmailNotifier::new(gmail, tokens).context("Failed to create Gmail notifier")?;
            Ok(Arc::new(notifier))
        }
        NotifierBackend::Log => Ok(Arc::new(LogNotifier::new())),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! chive server binary.

use anyhow::{Context, Result};
use chive_core::StaticActor;
use chive_core::config::AppConfig;
use chive_server::bootstrap::ensure_admin_token;
use chive_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// chive - an artifact version store
#[derive(Parser, Debug)]
#[command(name = "chived")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "CHIVE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration from the TOML file (if present) and `CHIVE_*` variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // CHIVE_CONFIG only names the file.
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("CHIVE_") && key != "CHIVE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: chived --config /path/to/config.toml\n  \
             2. Environment variables: CHIVE_SERVER__BIND=0.0.0.0:8080 \
             CHIVE_ADMIN__TOKEN_HASH=sha256:YOUR_TOKEN_HASH_HERE chived\n\n\
             See config/server.example.toml for example configuration.\n\
             Set CHIVE_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CHIVE_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    Ok(config)
}

/// Bring every active area back in line with its recorded pointer.
///
/// Failures are logged rather than fatal; the admin reconcile endpoint can
/// retry once the cause is fixed.
async fn reconcile_on_startup(state: &AppState) -> Result<()> {
    let report = state
        .versions
        .reconcile_active(&StaticActor::system())
        .await
        .context("startup reconciliation failed")?;

    chive_server::metrics::RECONCILE_REPAIRS.inc_by(report.repaired.len() as u64);
    if report.is_clean() {
        tracing::info!(checked = report.checked, "Active areas consistent");
    } else {
        tracing::warn!(
            checked = report.checked,
            repaired = report.repaired.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Startup reconciliation changed or could not repair active areas"
        );
    }
    if !report.untracked.is_empty() {
        tracing::warn!(
            untracked = ?report.untracked,
            "Active areas exist without a recorded pointer"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("chive v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    chive_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = chive_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    let metadata = chive_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    ensure_admin_token(metadata.as_ref(), &config.admin).await?;

    let state = AppState::new(config.clone(), storage, metadata);

    if config.versioning.reconcile_on_startup {
        if let Err(e) = reconcile_on_startup(&state).await {
            tracing::error!(error = %e, "Continuing without startup reconciliation");
        }
    } else {
        tracing::info!("Startup reconciliation disabled");
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

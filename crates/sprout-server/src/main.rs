//! Sprout server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use sprout_core::config::AppConfig;
use sprout_core::{recover_interrupted_imports, StoreHandle};
use sprout_server::{create_router, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sprout - photo journal server
#[derive(Parser, Debug)]
#[command(name = "sproutd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SPROUT_CONFIG",
        default_value = "config/sprout.toml"
    )]
    config: String,
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

    tracing::info!("Sprout v{}", env!("CARGO_PKG_VERSION"));

    // Defaults, then the optional file, then SPROUT_* env vars
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    let config_path = std::path::Path::new(&args.config);
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SPROUT_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;

    let layout = config.storage.layout();
    layout
        .ensure_dirs()
        .with_context(|| format!("failed to create data directory {}", layout.root.display()))?;

    // Must run before the store is opened: it may swap the database file
    let recovery =
        recover_interrupted_imports(&layout).context("failed to recover interrupted import")?;
    if recovery.restored > 0 {
        tracing::warn!(
            restored = recovery.restored,
            "Reverted an import that did not finish before the last shutdown"
        );
    }
    if recovery.cleaned > 0 {
        tracing::info!(cleaned = recovery.cleaned, "Removed leftover import files");
    }
    // Recovery may have removed the upload directory of a fresh install
    layout
        .ensure_dirs()
        .context("failed to create upload directory")?;

    let store = StoreHandle::open(&layout.database).context("failed to open store")?;
    tracing::info!(path = %layout.database.display(), "Store opened");

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    let state = AppState::new(config, store);
    let app = create_router(state);

    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

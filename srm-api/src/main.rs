//! srm-api - Student Records Manager service
//!
//! Serves the student record CRUD API and XML import/export over HTTP.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use srm_common::api::{load_shared_secret, SharedSecretVerifier};
use srm_common::config::{RootFolderInitializer, ServiceConfig};
use srm_common::db::{get_setting_i64, init_database};
use srm_api::db::{SequenceAllocator, StudentStore};
use srm_api::{build_router, AppState, DEFAULT_MAX_UPLOAD_BYTES};
use tracing::{error, info};

const MODULE_NAME: &str = "srm-api";

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "srm-api", version, about = "Student Records Manager service")]
struct Args {
    /// Root folder holding the database (overrides SRM_ROOT_FOLDER and config file)
    #[arg(long)]
    root_folder: Option<std::path::PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5000 (overrides SRM_BIND_ADDR and config file)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::resolve(MODULE_NAME, args.root_folder, args.bind);

    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Build identification first, before any database work
    info!(
        "Starting Student Records Manager (srm-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    if !initializer.database_exists() {
        info!("Creating new database: {}", db_path.display());
    }
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool).await?;
    if shared_secret == 0 {
        info!("API authentication disabled (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }
    let verifier = SharedSecretVerifier::new(shared_secret, config.token_ttl_secs);

    let max_upload_bytes = get_setting_i64(&pool, "max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)
        .await?
        .try_into()
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

    let store = StudentStore::new(pool, SequenceAllocator::students());
    let state = AppState::new(store, Arc::new(verifier)).with_max_upload_bytes(max_upload_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("srm-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

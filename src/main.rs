use std::process::ExitCode;
use std::sync::Arc;

use rust_catalog::{
    app,
    blob::LocalBlobStore,
    config::AppConfig,
    entities::{seed_owner, setup_schema},
    AppState,
};
use sea_orm::Database;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    setup_schema(&db).await?;
    if let Some(owner) = &config.owner {
        seed_owner(&db, owner).await?;
    }

    let blobs = LocalBlobStore::new(&config.upload_dir, &config.public_url);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
        blobs: Arc::new(blobs),
    };
    axum::serve(listener, app(state)).await?;

    Ok(())
}

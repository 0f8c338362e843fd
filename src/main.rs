use anyhow::Result;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use upload_orchestrator::{
    config, db,
    services::{UploadService, object_storage::S3Gateway, rate_limiter},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-orchestrator with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    db::ensure_parent_dir(&cfg.database_url)?;
    let pool = Arc::new(db::connect(&cfg.database_url, cfg.uploads.tx_max_wait).await?);

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&pool).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Object store gateway ---
    let gateway = S3Gateway::new(
        cfg.storage.bucket.clone(),
        cfg.storage.region.clone(),
        cfg.storage.endpoint.clone(),
    )?;
    tracing::info!(bucket = gateway.bucket(), "object store gateway ready");

    // --- Initialize core service ---
    let sweep_interval = cfg.uploads.rate_limit_sweep_interval;
    let service = UploadService::new(pool, Arc::new(gateway), cfg.uploads.clone());
    let _sweeper = rate_limiter::spawn_cleanup_task(service.limiter.clone(), sweep_interval);

    let app = upload_orchestrator::app(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

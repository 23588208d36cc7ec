use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkpost_core::{CheckpostService, CoreConfig, page_size_from_env_value};

/// Main entry point for checkpost
///
/// Resolves configuration from the environment (and an optional `.env` file),
/// opens the record store and serves the REST API with Swagger UI.
///
/// # Environment Variables
/// - `CHECKPOST_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CHECKPOST_DATA_DIR`: directory for the record snapshot; records are kept
///   in memory only when unset
/// - `CHECKPOST_SERVICES_FILE`: YAML list of services to seed the catalog with
/// - `CHECKPOST_DEFAULT_PAGE_SIZE`: page size of listings (default: 10)
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - the configuration is invalid or the record store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("checkpost=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("CHECKPOST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = non_empty_env("CHECKPOST_DATA_DIR").map(PathBuf::from);
    let services_file = non_empty_env("CHECKPOST_SERVICES_FILE").map(PathBuf::from);
    let page_size = page_size_from_env_value(std::env::var("CHECKPOST_DEFAULT_PAGE_SIZE").ok())?;

    let cfg = Arc::new(CoreConfig::new(data_dir, services_file, page_size)?);
    if let Some(snapshot) = cfg.snapshot_path() {
        tracing::info!("++ Records persisted to {}", snapshot.display());
    }

    let svc = CheckpostService::new(cfg)?;
    let app = api_rest::router(svc);

    tracing::info!("++ Starting checkpost REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

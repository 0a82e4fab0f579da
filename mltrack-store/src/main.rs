use anyhow::Context;
use mltrack_store::{Config, TrackingStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mltrack_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        path = %config.database_path.display(),
        "Initializing tracking store..."
    );

    // Creates the directory, the file and the schema as needed
    let store = TrackingStore::open(&config)
        .await
        .context("Failed to open tracking store")?;

    let experiments = store.experiment_count().await?;
    let jobs = store.job_count().await?;

    tracing::info!(experiments, jobs, "Tracking store ready");

    store.close().await;

    Ok(())
}

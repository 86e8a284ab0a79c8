use task_manager::{rocket_instance, AppConfig, TaskApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_manager=debug,rocket=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        pool_size = config.pool_size,
        "starting task manager"
    );

    let app = TaskApp::new(&config)?;
    rocket_instance(app, &config)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed: {e}"))?;
    Ok(())
}

use studyroom_server::{run_server, StudyRoomConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if present (local dev)
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = StudyRoomConfig::from_env()?;
    info!(configuration = ?config, "Loaded study room server configuration");
    run_server(config).await
}

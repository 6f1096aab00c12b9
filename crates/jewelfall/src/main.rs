use jewelfall::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), JewelfallError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        tick_hz = config.room.tick_rate_hz,
        idle_secs = config.idle_timeout.as_secs(),
        send_timeout_secs = config.send_timeout.as_secs(),
        "starting Jewelfall"
    );

    let server = JewelfallServer::builder().config(config).build().await?;
    server.run().await
}

use anyhow::Context;
use lineq_server::config::LineqConfig;
use lineq_server::{AppState, collaborators, init_tracing, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = LineqConfig::load().context("failed to load configuration")?;
    let collaborators = collaborators(&config).context("failed to set up content service")?;
    let state = AppState::new(collaborators, config.room_config());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    serve(listener, state).await.context("server stopped")?;
    Ok(())
}

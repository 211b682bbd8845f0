use anyhow::{Context, Result};
use call_session::{create_router, AppState, CallEngine, Config, NatsProvider};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "call-session", about = "Voice interview call session service")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/call-session")]
    config: String,

    /// Override the HTTP port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Call Session v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let provider = NatsProvider::connect(
        &cfg.provider.nats_url,
        cfg.provider.client_id.clone(),
        cfg.provider.public_key.clone(),
    )
    .await
    .context("Failed to connect voice provider")?;

    let engine = CallEngine::spawn(Arc::new(provider), cfg.session_config());
    let app = create_router(AppState::new(engine));

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use anilink::config::Config;
use anilink::relay::HlsRelay;
use anilink::server::AppState;
use anilink::sources::MegaCloudSource;
use anilink::transport;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let default_filter = config
        .logging
        .as_ref()
        .and_then(|l| l.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let state = Arc::new(AppState {
        megacloud: MegaCloudSource::new(&config.upstream)?,
        relay: HlsRelay::new(&config.upstream)?,
    });

    let app = transport::http_server::router(state);

    let address = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("anilink listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

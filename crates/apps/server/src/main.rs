use server::{AppState, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };
    let state = AppState::new(&config);

    info!(
        addr = %config.addr,
        public_base_url = %config.public_base_url,
        max_asset_bytes = config.max_asset_bytes,
        "image service listening"
    );
    let listener = tokio::net::TcpListener::bind(config.addr).await.unwrap();
    server::serve(listener, state).await.unwrap();
}

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use lollms_bridge::config::{Cli, Config};
use lollms_bridge::server::build_router;
use lollms_bridge::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "lollms_bridge=debug,tower_http=debug"
    } else {
        "lollms_bridge=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("lollms-bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;

    info!(
        model = config.model.model_name,
        binding = ?config.model.binding,
        antiprompts = config.antiprompt.markers.len(),
        "Configuration loaded"
    );

    info!(
        n_predict = config.generation.n_predict,
        temperature = config.generation.temperature,
        top_k = config.generation.top_k,
        top_p = config.generation.top_p,
        "Sampling defaults"
    );

    // Build application state.
    let state = Arc::new(AppState::from_config(&config)?);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen.unwrap_or(config.server.listen);
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

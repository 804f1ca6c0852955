use std::{sync::Arc, time::Duration};

use r4_music::{
    common::{
        banner::{BannerInfo, print_banner},
        logger,
    },
    configs::Config,
    server::{AppState, run_console},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    logger::init(config.logging.as_ref());
    print_banner(&BannerInfo::default());

    match serde_json::to_string(&config) {
        Ok(json) => info!("Loaded configuration: {}", json),
        Err(e) => error!("Failed to serialize configuration: {}", e),
    }

    let state = Arc::new(AppState::new(config));
    let console_shutdown = CancellationToken::new();
    let console = tokio::spawn(run_console(state.clone(), console_shutdown.clone()));

    info!(
        "Ready. Type `help` for commands (room '{}')",
        state.config.console.room_id
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutdown signal received");
    console_shutdown.cancel();
    state.registry.shutdown(SHUTDOWN_GRACE).await;
    let _ = console.await;
    info!("Bye");
}

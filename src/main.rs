use std::sync::Arc;

use bookwatch::broker::Broker;
use bookwatch::catalog::CatalogService;
use bookwatch::config::{Settings, load_config};
use bookwatch::persistence::SledStore;
use bookwatch::transport::websocket::start_websocket_server;
use bookwatch::utils::logging;
use bookwatch::watcher::{LogNotifier, Watcher};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.logging.level);

    if let Err(e) = run(config).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store = SledStore::open(&config.store.path)?;
    let broker = Broker::with_settings(&config.broker);
    let watcher = Watcher::from_settings(broker.clone(), &config.broker);
    let service = CatalogService::new(Arc::new(store.clone()), watcher, Arc::new(LogNotifier));

    let addr = config.server_addr();
    tokio::select! {
        res = start_websocket_server(&addr, service.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    service.shutdown();
    store.flush()?;
    Ok(())
}

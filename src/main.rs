//! Application entrypoint and state wiring.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use terra_ledger::model::Ledger;
use terra_ledger::storage::{self, ChainStore};
use terra_ledger::{build_router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir =
        PathBuf::from(std::env::var("TERRA_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    storage::ensure_dir(&data_dir).expect("create data dir");

    // The ledger has one explicit lifecycle: constructed here, injected into
    // the router, dropped at shutdown. No global instance.
    let ledger = Ledger::open(ChainStore::new(&data_dir));
    let stats = ledger.stats();
    info!(
        total_blocks = stats.total_blocks,
        is_valid = stats.is_valid,
        "ledger loaded"
    );

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
    };
    let app = build_router(state);

    let addr: SocketAddr = std::env::var("TERRA_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .expect("TERRA_ADDR must be host:port");
    info!(%addr, "serveur Terra Incognita démarré");
    axum::serve(
        tokio::net::TcpListener::bind(addr).await.expect("bind"),
        app,
    )
    .await
    .expect("server");
}

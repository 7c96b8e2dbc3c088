//! Terra Incognita ledger: an append-only, hash-linked chain of signed cell
//! claims over a 100x100 grid, with derived grid/leaderboard/integrity views
//! served over HTTP.

pub mod claim;
pub mod crypto;
pub mod model;
pub mod routes;
pub mod storage;

use std::sync::{Arc, Mutex};

use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use model::Ledger;

/// Shared application state passed to Axum handlers. The ledger is built once
/// at startup and every claim serializes on its mutex.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
}

/// Build the service router. Data routes carry no-cache headers so clients
/// always see the live chain.
pub fn build_router(state: AppState) -> Router {
    let no_cache = SetResponseHeaderLayer::overriding(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );

    Router::new()
        .route("/acquerir-case", post(routes::acquire_cell))
        .route("/gridstate", get(routes::grid_state))
        .route("/api/leaderboard", get(routes::leaderboard))
        .route("/blocks", get(routes::blocks))
        .route("/integrity", get(routes::integrity))
        .layer(no_cache)
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

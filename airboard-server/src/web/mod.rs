//! Web server: axum JSON API over one airport's departures feed.
//!
//! The airport is resolved and confirmed before the server starts; handlers
//! only read snapshots and invoke the controller's public operations.

use std::sync::Arc;

use axum::Router;
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use airboard_core::directory::AirportDirectory;
use airboard_core::resolver::Resolution;
use airboard_core::types::AirportRecord;

use crate::controller::FeedController;
use crate::lifecycle::LifecycleObserver;

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub controller: FeedController,
    pub airport: AirportRecord,
    pub resolution: Resolution,
    pub directory: AirportDirectory,
    pub lifecycle: LifecycleObserver,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/airport", axum::routing::get(routes::api_airport))
        .route("/api/airports", axum::routing::get(routes::api_airports))
        .route("/api/board", axum::routing::get(routes::api_board))
        .route("/api/refresh", axum::routing::post(routes::api_refresh))
        .route("/api/load-more", axum::routing::post(routes::api_load_more))
        .route(
            "/api/lifecycle",
            axum::routing::get(routes::api_lifecycle_get).post(routes::api_lifecycle_set),
        )
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> airboard_core::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Departures API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

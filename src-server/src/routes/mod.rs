//! HTTP routes, grouped by concern:
//! - `providers`: health, provider and check listings
//! - `upload`: framework document intake
//! - `configure`: mapping configuration
//! - `mapping`: batch start, status, events and cancellation
//! - `download`: job artifacts and batch archives

pub mod configure;
pub mod download;
pub mod mapping;
pub mod providers;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the router with all routes.
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        .route("/health", get(providers::health))
        .route("/providers", get(providers::list_providers))
        .route("/checks/{provider}", get(providers::list_checks))
        .route("/upload", post(upload::upload))
        .route("/configure", post(configure::configure))
        .route("/map", post(mapping::start))
        .route("/batch/{batch_id}/status", get(mapping::batch_status))
        .route("/batch/{batch_id}/events", get(mapping::events))
        .route("/batch/{batch_id}/cancel", post(mapping::cancel))
        .route("/status/{job_id}", get(mapping::job_status))
        .route("/download/batch/{batch_id}/zip", get(download::archive))
        .route("/download/{job_id}/{kind}", get(download::artifact))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Route definitions for the kitchen inventory API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/movements", movement_routes())
        .route("/dashboard", get(handlers::get_dashboard))
}

/// Stock movement routes
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route("/inflow", post(handlers::post_inflow))
        .route("/outflow", post(handlers::post_outflow))
        .route(
            "/:movement_id",
            get(handlers::get_movement).delete(handlers::delete_movement),
        )
}

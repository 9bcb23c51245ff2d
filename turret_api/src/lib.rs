//! HTTP surface: operator command endpoints, the event journal query
//! API, and the live MJPEG video feed.

pub mod error;
mod extract;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::AppState;

/// Build the router over `state`. CORS is wide open (no authenticated
/// access control on this surface, per scope).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index::index))
        .route(
            "/data",
            get(routes::data::get_data).post(routes::data::post_data),
        )
        .route(
            "/ForceSetServoDebug",
            post(routes::aim::force_set_servo_debug),
        )
        .route("/ForceSetPoint", post(routes::aim::force_set_point))
        .route(
            "/ToggleLaserForCalibration",
            post(routes::aim::toggle_laser_for_calibration),
        )
        .route("/enable", post(routes::lock::enable))
        .route("/disable", post(routes::lock::disable))
        .route("/status", get(routes::lock::status))
        .route("/video", get(routes::video::video))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

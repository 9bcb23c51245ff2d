//! Aim commands: debug angle override, normalized-point aim, and the
//! calibration-mode toggle.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use turret_common::model::{Angle, NormalizedPoint};

use crate::error::status_for;
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ServoDebugRequest {
    #[serde(rename = "angleX")]
    pub angle_x: Option<f64>,
    #[serde(rename = "angleY")]
    pub angle_y: Option<f64>,
}

pub async fn force_set_servo_debug(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ServoDebugRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    let (Some(x), Some(y)) = (body.angle_x, body.angle_y) else {
        return (
            StatusCode::BAD_REQUEST,
            message("No angle provided as parameter"),
        );
    };
    match state
        .aim
        .set_debug_angles(Angle::clamped(x), Angle::clamped(y))
    {
        Ok(msg) => (StatusCode::OK, message(msg)),
        Err(e) => (status_for(&e), message(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct ForceSetPointRequest {
    #[serde(rename = "pointX")]
    pub point_x: Option<f64>,
    #[serde(rename = "pointY")]
    pub point_y: Option<f64>,
}

pub async fn force_set_point(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForceSetPointRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    let (Some(x), Some(y)) = (body.point_x, body.point_y) else {
        return (
            StatusCode::BAD_REQUEST,
            message("No point provided as parameter"),
        );
    };
    let point = match NormalizedPoint::new(x, y) {
        Ok(p) => p,
        Err(e) => return (status_for(&e), message(e.to_string())),
    };
    match state.aim.shoot_at(point) {
        Ok(()) => (StatusCode::OK, message("point applied")),
        Err(e) => (status_for(&e), message(e.to_string())),
    }
}

pub async fn toggle_laser_for_calibration(State(state): State<AppState>) -> Json<MessageResponse> {
    if state.aim.is_calibration_active() {
        state.aim.disable_calibration();
        message("calibration mode disabled")
    } else {
        state.aim.enable_calibration();
        message("calibration mode enabled")
    }
}

//! Manual interlock veto (`/enable`, `/disable`) and the `/status` read.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use turret_common::consts::REASON_REST_API;
use turret_common::model::EventKind;

use crate::routes::aim::MessageResponse;
use crate::state::AppState;

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

pub async fn enable(State(state): State<AppState>) -> Json<MessageResponse> {
    if state
        .interlock
        .reasons()
        .iter()
        .any(|r| r == REASON_REST_API)
    {
        state.interlock.recover(REASON_REST_API);
        let _ = state.journal.insert_now(
            EventKind::LockReasonRemoved,
            REASON_REST_API,
            "REST operator cleared the manual lock",
        );
        message("RESTApi lock reason cleared")
    } else {
        message("Already unlocked by REST")
    }
}

pub async fn disable(State(state): State<AppState>) -> Json<MessageResponse> {
    if !state
        .interlock
        .reasons()
        .iter()
        .any(|r| r == REASON_REST_API)
    {
        let _ = state.journal.insert_now(
            EventKind::LockReasonAdded,
            REASON_REST_API,
            "REST operator engaged the manual lock",
        );
    }
    state.interlock.emergency_initiate(REASON_REST_API);
    message("RESTApi lock reason engaged")
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = if state.interlock.is_locked() {
        format!(
            "Locked due to an emergency (Reasons: {})",
            state.interlock.reasons().join(", ")
        )
    } else if state.aim.is_calibration_active() {
        "Calibration (active)".to_string()
    } else {
        "Armed".to_string()
    };
    Json(StatusResponse { status })
}

//! Maps `TurretError` onto the HTTP status conventions used across the
//! command endpoints: caller mistakes are 400s, everything else 500.

use axum::http::StatusCode;
use turret_common::error::TurretError;

pub fn status_for(err: &TurretError) -> StatusCode {
    if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

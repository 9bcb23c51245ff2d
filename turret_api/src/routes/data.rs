//! `GET /data` and `POST /data`: the event journal's query/insert surface.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use turret_common::model::{EventKind, EventRecord};

use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct EventJson {
    pub time: i64,
    pub event: i64,
    #[serde(rename = "className")]
    pub class_name: String,
    pub description: String,
}

impl From<EventRecord> for EventJson {
    fn from(r: EventRecord) -> Self {
        Self {
            time: r.timestamp,
            event: r.kind as i64,
            class_name: r.source,
            description: r.description,
        }
    }
}

fn parse_i64(raw: &str) -> Result<i64, ()> {
    raw.parse::<i64>().map_err(|_| ())
}

pub async fn get_data(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<EventJson>>, (StatusCode, String)> {
    let start = params.get("start");
    let end = params.get("end");

    let records = match (start, end) {
        (None, None) => state.journal.read_all(),
        (Some(s), Some(e)) => {
            let s = parse_i64(s).map_err(|_| bad_param("start"))?;
            let e = parse_i64(e).map_err(|_| bad_param("end"))?;
            state.journal.read_range(s, e)
        }
        (Some(s), None) => {
            let s = parse_i64(s).map_err(|_| bad_param("start"))?;
            state.journal.read_after(s)
        }
        (None, Some(e)) => {
            let e = parse_i64(e).map_err(|_| bad_param("end"))?;
            state.journal.read_before(e)
        }
    };

    let records = records.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(records.into_iter().map(EventJson::from).collect()))
}

fn bad_param(name: &str) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        format!("invalid '{name}' parameter (must be integer)"),
    )
}

#[derive(Debug, Serialize)]
pub struct InsertResponse {
    status: &'static str,
    message: String,
}

pub async fn post_data(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Vec<EventJson>>,
) -> Result<Json<InsertResponse>, (StatusCode, String)> {
    let mut inserted = 0usize;
    for item in body {
        let kind = EventKind::from_i64(item.event).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("unknown event kind {}", item.event),
            )
        })?;
        let record = EventRecord {
            timestamp: item.time,
            kind,
            source: item.class_name,
            description: item.description,
        };
        state
            .journal
            .insert(record)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        inserted += 1;
    }
    Ok(Json(InsertResponse {
        status: "OK",
        message: format!("Inserted {inserted} records."),
    }))
}

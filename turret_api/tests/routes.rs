//! Integration tests exercising the router end-to-end against
//! simulated hardware, an in-memory journal, and a frameless
//! perception loop.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use turret_api::{build_router, AppState};
use turret_common::model::{CalibrationTable, DetectionLayout};
use turret_control::perception::{Detector, Frame, FrameSource, ModelDetection, PerceptionLoop};
use turret_control::{
    AimCoordinator, InterlockManager, JournalSink, LaserController, ServoController,
};
use turret_hal::{HalBackend, SimulatedBackend};
use turret_journal::EventJournal;

struct NoFrames;
impl FrameSource for NoFrames {
    fn next_frame(&mut self) -> Option<Frame> {
        None
    }
}

struct NoDetections;
impl Detector for NoDetections {
    fn detect(&mut self, _frame: &Frame) -> Vec<ModelDetection> {
        Vec::new()
    }
}

fn app() -> axum::Router {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let laser_line = hal.get_output(0, "laser").unwrap();
    let laser = Arc::new(LaserController::new(hal.clone(), laser_line));
    let servo_x = ServoController::new(hal.clone(), 0, 0, "x").unwrap();
    let servo_y = ServoController::new(hal.clone(), 0, 1, "y").unwrap();
    let calibration = CalibrationTable {
        x_range: (10.0, 50.0),
        y_range: (10.0, 50.0),
        center: (30.0, 30.0),
    };
    let journal = Arc::new(EventJournal::open_in_memory().unwrap());
    let aim = Arc::new(AimCoordinator::new(
        laser.clone(),
        servo_x,
        servo_y,
        calibration,
        journal.clone() as Arc<dyn JournalSink>,
    ));
    let interlock = InterlockManager::with_unlock_delay(
        laser.clone(),
        aim.clone(),
        std::time::Duration::from_millis(20),
    );
    let perception = Arc::new(PerceptionLoop::new(
        Box::new(NoFrames),
        Box::new(NoDetections),
        DetectionLayout {
            protected_count: 1,
            target_count: 1,
        },
        interlock.clone(),
        aim.clone(),
        journal.clone() as Arc<dyn JournalSink>,
        false,
    ));
    let state = AppState::new(aim, interlock, journal, perception);
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_starts_armed() {
    let response = app()
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Armed");
}

#[tokio::test]
async fn disable_then_enable_round_trips_status() {
    let router = app();
    let response = router
        .clone()
        .oneshot(Request::post("/disable").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(
        json["status"],
        "Locked due to an emergency (Reasons: RESTApi)"
    );

    let response = router
        .clone()
        .oneshot(Request::post("/enable").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "Armed");
}

#[tokio::test]
async fn force_set_servo_debug_rejects_missing_angles() {
    let response = app()
        .oneshot(
            Request::post("/ForceSetServoDebug")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn force_set_servo_debug_applies_angles() {
    let response = app()
        .oneshot(
            Request::post("/ForceSetServoDebug")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"angleX": 15.0, "angleY": 45.0}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn force_set_point_rejects_out_of_range() {
    let response = app()
        .oneshot(
            Request::post("/ForceSetPoint")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"pointX": 1.5, "pointY": 0.5}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn toggle_calibration_flips_mode_twice() {
    let router = app();
    let response = router
        .clone()
        .oneshot(
            Request::post("/ToggleLaserForCalibration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["message"], "calibration mode enabled");

    let response = router
        .oneshot(
            Request::post("/ToggleLaserForCalibration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["message"], "calibration mode disabled");
}

#[tokio::test]
async fn data_round_trips_through_post_and_get() {
    let router = app();
    let insert_body =
        r#"[{"time": 42, "event": 1, "className": "RESTApi", "description": "manual"}]"#;
    let response = router
        .clone()
        .oneshot(
            Request::post("/data")
                .header("content-type", "application/json")
                .body(Body::from(insert_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::get("/data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["time"], 42);
    assert_eq!(rows[0]["className"], "RESTApi");
}

#[tokio::test]
async fn get_data_rejects_non_integer_query_param() {
    let response = app()
        .oneshot(
            Request::get("/data?start=not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_data_rejects_schema_mismatch_as_bad_request() {
    let response = app()
        .oneshot(
            Request::post("/data")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"not": "an array"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn index_substitutes_base_url_from_host_header() {
    let response = app()
        .oneshot(
            Request::get("/")
                .header("host", "turret.local:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("const BASE_URL = 'http://turret.local:8080';"));
}

#[tokio::test]
async fn options_preflight_is_handled_by_cors_layer() {
    let response = app()
        .oneshot(
            Request::options("/status")
                .header("origin", "http://example.com")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

//! End-to-end scenarios spanning the Laser, Servo, Aim, Interlock, and
//! Perception modules together, against the simulated device backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use turret_common::consts::{REASON_NEURAL_NETWORK_HANDLER, REASON_REST_API, SHOOT_SUSTAIN};
use turret_common::model::{CalibrationTable, DetectionLayout, EventKind, NormalizedPoint, Rect};
use turret_control::perception::{Detector, Frame, FrameSource, ModelDetection, PerceptionLoop};
use turret_control::{
    AimCoordinator, InterlockManager, JournalSink, LaserController, ServoController,
};
use turret_hal::{HalBackend, SimulatedBackend};

#[derive(Default)]
struct RecordingJournal(Mutex<Vec<EventKind>>);
impl JournalSink for RecordingJournal {
    fn record(&self, kind: EventKind, _source: &str, _description: &str) {
        self.0.lock().unwrap().push(kind);
    }
}

fn calibration() -> CalibrationTable {
    CalibrationTable {
        x_range: (10.0, 50.0),
        y_range: (10.0, 50.0),
        center: (30.0, 30.0),
    }
}

struct Harness {
    laser: Arc<LaserController>,
    aim: Arc<AimCoordinator>,
    interlock: Arc<InterlockManager>,
    journal: Arc<RecordingJournal>,
}

fn build(hal: Arc<dyn HalBackend>, unlock_delay: Duration) -> Harness {
    let laser_line = hal.get_output(0, "laser").unwrap();
    let laser = Arc::new(LaserController::new(hal.clone(), laser_line));
    let servo_x = ServoController::new(hal.clone(), 0, 0, "x").unwrap();
    let servo_y = ServoController::new(hal.clone(), 0, 1, "y").unwrap();
    let journal = Arc::new(RecordingJournal::default());
    let aim = Arc::new(AimCoordinator::new(
        laser.clone(),
        servo_x,
        servo_y,
        calibration(),
        journal.clone() as Arc<dyn JournalSink>,
    ));
    let interlock = InterlockManager::with_unlock_delay(laser.clone(), aim.clone(), unlock_delay);
    Harness {
        laser,
        aim,
        interlock,
        journal,
    }
}

fn frame() -> Frame {
    Frame {
        width: 640,
        height: 480,
        rgb: vec![0u8; 4],
    }
}

struct AlwaysFrame;
impl FrameSource for AlwaysFrame {
    fn next_frame(&mut self) -> Option<Frame> {
        Some(frame())
    }
}

struct ScriptedDetector(Mutex<Vec<Vec<ModelDetection>>>);
impl ScriptedDetector {
    fn new(script: Vec<Vec<ModelDetection>>) -> Self {
        let mut script = script;
        script.reverse();
        Self(Mutex::new(script))
    }
}
impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Vec<ModelDetection> {
        self.0.lock().unwrap().pop().unwrap_or_default()
    }
}

fn protected_detection() -> ModelDetection {
    ModelDetection {
        class_index: 0,
        score: 0.9,
        box_model: Rect {
            x0: 0.0,
            y0: 0.0,
            x1: 10.0,
            y1: 10.0,
        },
        center_model: (256.0, 256.0),
    }
}

fn target_detection() -> ModelDetection {
    ModelDetection {
        class_index: 1,
        score: 0.9,
        box_model: Rect {
            x0: 0.0,
            y0: 0.0,
            x1: 10.0,
            y1: 10.0,
        },
        center_model: (256.0, 256.0),
    }
}

fn layout() -> DetectionLayout {
    DetectionLayout {
        protected_count: 1,
        target_count: 1,
    }
}

/// Scenario 1: cold start, armed.
#[test]
fn cold_start_is_armed_and_maps_center_point() {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let h = build(hal, Duration::from_millis(50));

    assert!(!h.interlock.is_locked());
    assert!(!h.aim.is_calibration_active());

    h.aim
        .set_point(NormalizedPoint::new(0.5, 0.5).unwrap())
        .unwrap();
    // Angles observed through the laser/aim state only; direct servo
    // angle assertions live in aim.rs's own unit tests.
    assert!(!h.laser.is_locked());
}

/// Scenario 2: protected-entity lockout, then automatic release once
/// the detection is continuously absent for the unlock delay.
#[test]
fn protected_entity_locks_out_then_releases_on_absence() {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let unlock_delay = Duration::from_millis(80);
    let h = build(hal, unlock_delay);
    let perception = PerceptionLoop::new(
        Box::new(AlwaysFrame),
        Box::new(ScriptedDetector::new(vec![vec![protected_detection()]])),
        layout(),
        h.interlock.clone(),
        h.aim.clone(),
        h.journal.clone() as Arc<dyn JournalSink>,
        false,
    );

    assert!(perception.tick());
    assert!(h.interlock.is_locked());
    assert!(h
        .interlock
        .reasons()
        .iter()
        .any(|r| r == REASON_NEURAL_NETWORK_HANDLER));
    assert!(!h.laser.is_enabled());

    // Ten further frames with no detection: the perception loop keeps
    // re-requesting release until the reason is continuously absent
    // for `unlock_delay`.
    for _ in 0..10 {
        perception.tick();
    }
    std::thread::sleep(unlock_delay * 2);

    assert!(!h.interlock.is_locked());
}

/// Scenario 3: a REST veto outlives the perception loop's own reason.
#[test]
fn rest_veto_survives_perception_reason_clearing() {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let unlock_delay = Duration::from_millis(80);
    let h = build(hal, unlock_delay);
    h.interlock.emergency_initiate(REASON_REST_API);

    let perception = PerceptionLoop::new(
        Box::new(AlwaysFrame),
        Box::new(ScriptedDetector::new(vec![vec![protected_detection()]])),
        layout(),
        h.interlock.clone(),
        h.aim.clone(),
        h.journal.clone() as Arc<dyn JournalSink>,
        false,
    );
    perception.tick();
    assert!(h
        .interlock
        .reasons()
        .iter()
        .any(|r| r == REASON_NEURAL_NETWORK_HANDLER));

    for _ in 0..10 {
        perception.tick();
    }
    std::thread::sleep(unlock_delay * 2);

    assert_eq!(h.interlock.reasons(), vec![REASON_REST_API.to_string()]);
    assert!(h.interlock.is_locked());

    h.interlock.recover(REASON_REST_API);
    std::thread::sleep(unlock_delay * 2);
    assert!(!h.interlock.is_locked());
}

/// Scenario 4: calibration mode forces the laser on and suppresses
/// automatic aim from perception.
#[test]
fn calibration_mode_suppresses_automatic_aim() {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let h = build(hal, Duration::from_millis(50));
    h.aim.enable_calibration();
    assert!(h.laser.is_enabled());

    let perception = PerceptionLoop::new(
        Box::new(AlwaysFrame),
        Box::new(ScriptedDetector::new(vec![vec![target_detection()]])),
        layout(),
        h.interlock.clone(),
        h.aim.clone(),
        h.journal.clone() as Arc<dyn JournalSink>,
        false,
    );
    perception.tick();
    assert!(h.aim.get_last_shoot().is_none());

    h.aim.disable_calibration();
    assert!(!h.laser.is_enabled());
    assert_eq!(
        *h.journal.0.lock().unwrap(),
        vec![EventKind::CalibrationStart, EventKind::CalibrationEnd]
    );
}

/// Scenario 5: a target held across frames is re-shot each frame but
/// journaled once per sustain window, and loss of target disarms only
/// after the sustain window has fully elapsed.
#[test]
fn shoot_sustain_journals_once_then_disarms_after_loss() {
    let hal: Arc<dyn HalBackend> = Arc::new(SimulatedBackend::new());
    let h = build(hal, Duration::from_millis(50));
    let perception = PerceptionLoop::new(
        Box::new(AlwaysFrame),
        Box::new(ScriptedDetector::new(vec![
            vec![target_detection()],
            vec![target_detection()],
            vec![target_detection()],
        ])),
        layout(),
        h.interlock.clone(),
        h.aim.clone(),
        h.journal.clone() as Arc<dyn JournalSink>,
        false,
    );

    for _ in 0..3 {
        perception.tick();
    }
    assert_eq!(
        h.journal
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == EventKind::Elimination)
            .count(),
        1
    );
    assert!(h.laser.is_enabled());

    // Target now gone; the laser stays on until the sustain window
    // has elapsed since the last shot.
    perception.tick();
    assert!(h.laser.is_enabled());

    std::thread::sleep(SHOOT_SUSTAIN + Duration::from_millis(50));
    perception.tick();
    assert!(!h.laser.is_enabled());
}

/// Scenario 6: the physical emergency button locks out on press and
/// releases after it has been continuously released for the unlock
/// delay.
#[test]
fn physical_button_locks_and_releases() {
    let hal = Arc::new(SimulatedBackend::new());
    let dyn_hal: Arc<dyn HalBackend> = hal.clone();
    let unlock_delay = Duration::from_millis(80);
    let h = build(dyn_hal.clone(), unlock_delay);
    let button = dyn_hal.get_input(1, "button").unwrap();
    hal.force_line_value(button, 1);
    h.interlock.spawn_button_watcher(dyn_hal.clone(), button);

    hal.force_line_value(button, 0);
    std::thread::sleep(Duration::from_millis(50));
    assert!(h.interlock.is_locked());
    assert!(!h.laser.is_enabled());

    hal.force_line_value(button, 1);
    std::thread::sleep(unlock_delay * 3);
    assert!(!h.interlock.is_locked());

    h.interlock.dispose();
}

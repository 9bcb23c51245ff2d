//! Perception Loop: pulls frames from a camera, runs the detector, and
//! drives the interlock and aim coordinator from the decision table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};
use turret_common::consts::{
    MODEL_INPUT_SIZE, REASON_NEURAL_NETWORK_HANDLER, SCORE_THRESHOLD, SHOOT_SUSTAIN,
};
use turret_common::model::{
    Detection, DetectionClass, DetectionLayout, EventKind, NormalizedPoint, Rect,
};

use crate::aim::AimCoordinator;
use crate::interlock::InterlockManager;
use crate::journal_sink::JournalSink;

/// A single captured camera frame, in whatever pixel layout the
/// capture pipeline produces.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Camera collaborator; its capture pipeline is out of scope here.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// A single proposal from the detector, in model-input pixel space
/// (`[0, MODEL_INPUT_SIZE)` on both axes).
#[derive(Debug, Clone, Copy)]
pub struct ModelDetection {
    pub class_index: u32,
    pub score: f32,
    pub box_model: Rect,
    pub center_model: (f32, f32),
}

/// Neural-network inference backend; treated as a black box here.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<ModelDetection>;
}

/// Letterbox transform: pad the source frame to a square, then scale
/// to `model_size`. Returns `(scale, pad_x, pad_y)` in source pixels.
fn letterbox_params(width: u32, height: u32, model_size: u32) -> (f64, f64, f64) {
    let side = width.max(height) as f64;
    let scale = model_size as f64 / side;
    let pad_x = (side - width as f64) / 2.0;
    let pad_y = (side - height as f64) / 2.0;
    (scale, pad_x, pad_y)
}

/// Map a model-space coordinate back into source-image pixels.
fn model_to_source(model_xy: (f64, f64), scale: f64, pad: (f64, f64)) -> (f64, f64) {
    (model_xy.0 / scale - pad.0, model_xy.1 / scale - pad.1)
}

/// Map a model-space box back into source-image pixels for overlay.
fn box_to_source(box_model: Rect, scale: f64, pad: (f64, f64)) -> Rect {
    let (x0, y0) = model_to_source((box_model.x0 as f64, box_model.y0 as f64), scale, pad);
    let (x1, y1) = model_to_source((box_model.x1 as f64, box_model.y1 as f64), scale, pad);
    Rect {
        x0: x0 as f32,
        y0: y0 as f32,
        x1: x1 as f32,
        y1: y1 as f32,
    }
}

enum FrameOutcome {
    Emergency,
    Calibrating,
    ResolvingLock,
    Aim(NormalizedPoint),
    Idle,
}

/// Owns the camera handle and detector; decides and acts once per
/// captured frame.
pub struct PerceptionLoop {
    frame_source: Mutex<Box<dyn FrameSource>>,
    detector: Mutex<Box<dyn Detector>>,
    layout: DetectionLayout,
    interlock: Arc<InterlockManager>,
    aim: Arc<AimCoordinator>,
    journal: Arc<dyn JournalSink>,
    needs_resolving: AtomicBool,
    latest_frame: Mutex<Option<Frame>>,
    latest_detections: Mutex<Vec<Detection>>,
    flip: bool,
}

impl PerceptionLoop {
    pub fn new(
        frame_source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        layout: DetectionLayout,
        interlock: Arc<InterlockManager>,
        aim: Arc<AimCoordinator>,
        journal: Arc<dyn JournalSink>,
        flip: bool,
    ) -> Self {
        Self {
            frame_source: Mutex::new(frame_source),
            detector: Mutex::new(detector),
            layout,
            interlock,
            aim,
            journal,
            needs_resolving: AtomicBool::new(false),
            latest_frame: Mutex::new(None),
            latest_detections: Mutex::new(Vec::new()),
            flip,
        }
    }

    /// The most recently captured frame, if any, for the video surface
    /// to encode and stream.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest_frame.lock().unwrap().clone()
    }

    /// Detections from the most recently processed frame, in
    /// source-image coordinates, for overlay rendering.
    pub fn latest_detections(&self) -> Vec<Detection> {
        self.latest_detections.lock().unwrap().clone()
    }

    fn classify_proposals(
        &self,
        frame: &Frame,
        detections: Vec<ModelDetection>,
    ) -> (bool, Option<ModelDetection>) {
        let (scale, pad_x, pad_y) = letterbox_params(frame.width, frame.height, MODEL_INPUT_SIZE);
        let mut surviving = Vec::new();
        let mut last_target = None;
        let mut emergency = false;
        for d in detections {
            if d.score < SCORE_THRESHOLD {
                continue;
            }
            let class = self.layout.classify(d.class_index);
            surviving.push(Detection {
                class,
                score: d.score,
                box_source: box_to_source(d.box_model, scale, (pad_x, pad_y)),
                center_model: d.center_model,
            });
            match class {
                DetectionClass::Protected(_) => {
                    emergency = true;
                    break;
                }
                DetectionClass::Target(_) => last_target = Some(d),
                DetectionClass::Unknown => {}
            }
        }
        *self.latest_detections.lock().unwrap() = surviving;
        if emergency {
            return (true, None);
        }
        (false, last_target)
    }

    fn decide(&self, emergency: bool, target: Option<ModelDetection>) -> FrameOutcome {
        if emergency {
            return FrameOutcome::Emergency;
        }
        if self.aim.is_calibration_active() {
            return FrameOutcome::Calibrating;
        }
        let locked_by_me = self
            .interlock
            .reasons()
            .iter()
            .any(|r| r == REASON_NEURAL_NETWORK_HANDLER);
        if locked_by_me && self.needs_resolving.load(Ordering::Acquire) {
            return FrameOutcome::ResolvingLock;
        }
        if !self.interlock.is_locked() {
            if let Some(d) = target {
                let p = NormalizedPoint::new(
                    (d.center_model.0 / MODEL_INPUT_SIZE as f32) as f64,
                    (d.center_model.1 / MODEL_INPUT_SIZE as f32) as f64,
                )
                .unwrap_or(NormalizedPoint { u: 0.5, v: 0.5 });
                return FrameOutcome::Aim(p);
            }
        }
        FrameOutcome::Idle
    }

    fn shoot_sustain_elapsed(&self) -> bool {
        self.aim
            .get_last_shoot()
            .map(|t| Instant::now().saturating_duration_since(t) > SHOOT_SUSTAIN)
            .unwrap_or(true)
    }

    /// Process a single captured frame; returns the outcome acted on,
    /// for test assertions.
    fn step_outcome(&self, frame: &Frame) -> &'static str {
        let raw = self.detector.lock().unwrap().detect(frame);
        let (emergency, target) = self.classify_proposals(frame, raw);
        let outcome = self.decide(emergency, target);

        match outcome {
            FrameOutcome::Emergency => {
                if !self
                    .interlock
                    .reasons()
                    .iter()
                    .any(|r| r == REASON_NEURAL_NETWORK_HANDLER)
                {
                    self.journal.record(
                        EventKind::LockReasonAdded,
                        REASON_NEURAL_NETWORK_HANDLER,
                        "protected detection in frame",
                    );
                    self.interlock
                        .emergency_initiate(REASON_NEURAL_NETWORK_HANDLER);
                    self.needs_resolving.store(true, Ordering::Release);
                }
                "emergency"
            }
            FrameOutcome::Calibrating => "calibrating",
            FrameOutcome::ResolvingLock => {
                self.journal.record(
                    EventKind::LockReasonRemoved,
                    REASON_NEURAL_NETWORK_HANDLER,
                    "no protected detection, releasing lock",
                );
                self.interlock.recover(REASON_NEURAL_NETWORK_HANDLER);
                self.needs_resolving.store(false, Ordering::Release);
                "resolving"
            }
            FrameOutcome::Aim(point) => {
                if self.shoot_sustain_elapsed() {
                    self.journal.record(
                        EventKind::Elimination,
                        REASON_NEURAL_NETWORK_HANDLER,
                        "target acquired",
                    );
                }
                let _ = self.aim.shoot_at(point);
                "aim"
            }
            FrameOutcome::Idle => {
                if self.shoot_sustain_elapsed() {
                    self.aim.disarm();
                }
                "idle"
            }
        }
    }

    /// Publish the captured frame to the latest-frame slot. Overlay
    /// drawing of detection boxes belongs to the rendering surface the
    /// HTTP layer streams from, not to this decision loop.
    fn publish(&self, frame: &Frame) {
        *self.latest_frame.lock().unwrap() = Some(frame.clone());
    }

    /// Run one iteration; returns `false` if no frame was available.
    pub fn tick(&self) -> bool {
        let frame = self.frame_source.lock().unwrap().next_frame();
        let Some(frame) = frame else {
            return false;
        };
        debug!(
            width = frame.width,
            height = frame.height,
            flip = self.flip,
            "captured frame"
        );
        let _ = self.step_outcome(&frame);
        self.publish(&frame);
        true
    }

    /// Run until `cancel` is set, sleeping briefly between empty reads.
    pub fn run(&self, cancel: &AtomicBool) {
        info!("perception loop starting");
        while !cancel.load(Ordering::Acquire) {
            if !self.tick() {
                std::thread::sleep(turret_common::consts::POLL_INTERVAL);
            }
        }
        info!("perception loop stopped");
    }
}

//! Aim Coordinator: maps normalized screen coordinates to servo angles
//! through a piecewise-linear calibration, and enforces the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;
use turret_common::consts::SHOOT_SUSTAIN;
use turret_common::error::TurretError;
use turret_common::model::{Angle, CalibrationTable, EventKind, NormalizedPoint};

use crate::journal_sink::JournalSink;
use crate::laser::LaserController;
use crate::servo::ServoController;

struct Inner {
    calibration: CalibrationTable,
    default_aim: (Angle, Angle),
    calibration_active: bool,
    last_shoot: Option<Instant>,
}

/// Global, single-instance coordinator over both servos.
pub struct AimCoordinator {
    laser: Arc<LaserController>,
    servo_x: ServoController,
    servo_y: ServoController,
    locked: AtomicBool,
    state: Mutex<Inner>,
    journal: Arc<dyn JournalSink>,
}

/// Two-segment piecewise-linear map through `center`, per axis.
fn piecewise(t: f64, lo: f64, center: f64, hi: f64) -> f64 {
    if t < 0.5 {
        lo + (center - lo) * (t / 0.5)
    } else {
        center + (hi - center) * ((t - 0.5) / 0.5)
    }
}

impl AimCoordinator {
    pub fn new(
        laser: Arc<LaserController>,
        servo_x: ServoController,
        servo_y: ServoController,
        calibration: CalibrationTable,
        journal: Arc<dyn JournalSink>,
    ) -> Self {
        let default_aim = (
            Angle::clamped(calibration.x_center()),
            Angle::clamped(calibration.y_center()),
        );
        Self {
            laser,
            servo_x,
            servo_y,
            locked: AtomicBool::new(false),
            state: Mutex::new(Inner {
                calibration,
                default_aim,
                calibration_active: false,
                last_shoot: None,
            }),
            journal,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn is_calibration_active(&self) -> bool {
        self.state.lock().unwrap().calibration_active
    }

    /// Translate a normalized point into `(angleX, angleY)` under the
    /// current calibration table. `v` is flipped internally (`v' = 1 - v`).
    fn compute_angles(&self, p: NormalizedPoint) -> (Angle, Angle) {
        let cal = self.state.lock().unwrap().calibration;
        let v_flipped = 1.0 - p.v;
        let x = piecewise(p.u, cal.x_left(), cal.x_center(), cal.x_right());
        let y = piecewise(v_flipped, cal.y_bottom(), cal.y_center(), cal.y_top());
        (Angle::clamped(x), Angle::clamped(y))
    }

    pub fn set_x_angle(&self, a: Angle) -> Result<&'static str, TurretError> {
        if self.is_locked() {
            return Ok("rejected");
        }
        self.servo_x.set_angle(a);
        let mut s = self.state.lock().unwrap();
        s.default_aim.0 = a;
        Ok("x angle applied")
    }

    pub fn set_y_angle(&self, a: Angle) -> Result<&'static str, TurretError> {
        if self.is_locked() {
            return Ok("rejected");
        }
        self.servo_y.set_angle(a);
        let mut s = self.state.lock().unwrap();
        s.default_aim.1 = a;
        Ok("y angle applied")
    }

    pub fn set_angle_point(&self, x: Angle, y: Angle) -> Result<&'static str, TurretError> {
        if self.is_locked() {
            return Err(TurretError::Locked("aim coordinator is locked".into()));
        }
        self.servo_x.set_angle(x);
        self.servo_y.set_angle(y);
        Ok("angle point applied")
    }

    /// Operator debug override (the `/ForceSetServoDebug` entry point):
    /// command both servo angles directly in degrees and update
    /// `defaultAim`, bypassing the calibration map. See
    /// [`Self::set_default_state`] for the normalized-point equivalent.
    pub fn set_debug_angles(&self, x: Angle, y: Angle) -> Result<&'static str, TurretError> {
        self.set_angle_point(x, y)?;
        self.state.lock().unwrap().default_aim = (x, y);
        Ok("debug angles applied")
    }

    pub fn set_point(&self, p: NormalizedPoint) -> Result<&'static str, TurretError> {
        if self.is_locked() {
            return Err(TurretError::Locked("aim coordinator is locked".into()));
        }
        let (x, y) = self.compute_angles(p);
        self.servo_x.set_angle(x);
        self.servo_y.set_angle(y);
        Ok("point applied")
    }

    /// Enable the laser (if disabled), aim at `p`, and record the shoot
    /// time used by the perception loop's disarm-on-idle logic.
    pub fn shoot_at(&self, p: NormalizedPoint) -> Result<(), TurretError> {
        if !self.laser.is_enabled() {
            match self.laser.enable() {
                Ok(_) => {}
                Err(e) if e.is_caller_error() => {}
                Err(e) => return Err(e),
            }
        }
        self.set_point(p)?;
        self.state.lock().unwrap().last_shoot = Some(Instant::now());
        Ok(())
    }

    /// Disable the laser and return to the default aim point.
    pub fn disarm(&self) {
        if self.laser.is_enabled() {
            let _ = self.laser.disable();
        }
        self.restore_last_state();
    }

    pub fn enable_calibration(&self) {
        let mut s = self.state.lock().unwrap();
        if s.calibration_active {
            return;
        }
        s.calibration_active = true;
        drop(s);
        if !self.laser.is_enabled() {
            let _ = self.laser.enable();
        }
        self.journal.record(
            EventKind::CalibrationStart,
            "Calibration",
            "calibration mode enabled",
        );
        info!("calibration mode enabled");
    }

    pub fn disable_calibration(&self) {
        let mut s = self.state.lock().unwrap();
        if !s.calibration_active {
            return;
        }
        s.calibration_active = false;
        drop(s);
        if self.laser.is_enabled() {
            let _ = self.laser.disable();
        }
        self.journal.record(
            EventKind::CalibrationEnd,
            "Calibration",
            "calibration mode disabled",
        );
        info!("calibration mode disabled");
    }

    /// Set `defaultAim` from a normalized point run through the
    /// calibration map, commanding both servos to match. The
    /// degrees-based operator-debug entry point is
    /// [`Self::set_debug_angles`].
    pub fn set_default_state(&self, p: NormalizedPoint) -> Result<&'static str, TurretError> {
        let (x, y) = self.compute_angles(p);
        self.state.lock().unwrap().default_aim = (x, y);
        self.set_angle_point(x, y)
    }

    /// Cascade: disable calibration, lock both servos, lock the laser,
    /// and set `locked = true`.
    pub fn emergency_disable_and_lock(&self) {
        self.disable_calibration();
        self.servo_x.emergency_disable_and_lock();
        self.servo_y.emergency_disable_and_lock();
        self.laser.emergency_disable_and_lock();
        self.locked.store(true, Ordering::Release);
    }

    pub fn unlock(&self) {
        self.servo_x.unlock();
        self.servo_y.unlock();
        self.locked.store(false, Ordering::Release);
    }

    /// Reapply `defaultAim`, called after interlock release.
    pub fn restore_last_state(&self) {
        let (x, y) = self.state.lock().unwrap().default_aim;
        self.servo_x.set_angle(x);
        self.servo_y.set_angle(y);
    }

    pub fn get_last_shoot(&self) -> Option<Instant> {
        self.state.lock().unwrap().last_shoot
    }

    /// Whether at least `SHOOT_SUSTAIN` has elapsed since the last
    /// commanded shot (or no shot has ever been commanded).
    pub fn shoot_sustain_elapsed(&self) -> bool {
        match self.get_last_shoot() {
            Some(t) => t.elapsed() > SHOOT_SUSTAIN,
            None => true,
        }
    }

    /// Best-effort shutdown of both servo PWM channels.
    pub fn teardown(&self) {
        self.servo_x.teardown();
        self.servo_y.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use turret_hal::{HalBackend, SimulatedBackend};

    #[derive(Default)]
    struct RecordingJournal(StdMutex<Vec<EventKind>>);
    impl JournalSink for RecordingJournal {
        fn record(&self, kind: EventKind, _source: &str, _description: &str) {
            self.0.lock().unwrap().push(kind);
        }
    }

    fn coordinator() -> (
        Arc<SimulatedBackend>,
        Arc<LaserController>,
        Arc<RecordingJournal>,
        AimCoordinator,
    ) {
        let hal = Arc::new(SimulatedBackend::new());
        let dyn_hal: Arc<dyn HalBackend> = hal.clone();
        let laser_line = dyn_hal.get_output(0, "laser").unwrap();
        let laser = Arc::new(LaserController::new(dyn_hal.clone(), laser_line));
        let servo_x = ServoController::new(dyn_hal.clone(), 0, 0, "x").unwrap();
        let servo_y = ServoController::new(dyn_hal.clone(), 0, 1, "y").unwrap();
        let calibration = CalibrationTable {
            x_range: (10.0, 50.0),
            y_range: (10.0, 50.0),
            center: (30.0, 30.0),
        };
        let journal = Arc::new(RecordingJournal::default());
        let aim = AimCoordinator::new(
            laser.clone(),
            servo_x,
            servo_y,
            calibration,
            journal.clone() as Arc<dyn JournalSink>,
        );
        (hal, laser, journal, aim)
    }

    #[test]
    fn center_point_maps_to_center() {
        let (_, _, _, aim) = coordinator();
        aim.set_point(NormalizedPoint::new(0.5, 0.5).unwrap())
            .unwrap();
        assert_eq!(aim.servo_x.angle().degrees(), 30.0);
        assert_eq!(aim.servo_y.angle().degrees(), 30.0);
    }

    #[test]
    fn origin_maps_to_x_left_y_top_after_flip() {
        let (_, _, _, aim) = coordinator();
        aim.set_point(NormalizedPoint::new(0.0, 0.0).unwrap())
            .unwrap();
        assert_eq!(aim.servo_x.angle().degrees(), 10.0);
        assert_eq!(aim.servo_y.angle().degrees(), 50.0);
    }

    #[test]
    fn corner_one_one_maps_to_x_right_y_bottom() {
        let (_, _, _, aim) = coordinator();
        aim.set_point(NormalizedPoint::new(1.0, 1.0).unwrap())
            .unwrap();
        assert_eq!(aim.servo_x.angle().degrees(), 50.0);
        assert_eq!(aim.servo_y.angle().degrees(), 10.0);
    }

    #[test]
    fn locked_set_point_is_locked_error() {
        let (_, _, _, aim) = coordinator();
        aim.emergency_disable_and_lock();
        let result = aim.set_point(NormalizedPoint::new(0.5, 0.5).unwrap());
        assert!(matches!(result, Err(TurretError::Locked(_))));
    }

    #[test]
    fn locked_set_x_angle_is_rejected_not_error() {
        let (_, _, _, aim) = coordinator();
        aim.emergency_disable_and_lock();
        assert_eq!(aim.set_x_angle(Angle::clamped(20.0)).unwrap(), "rejected");
    }

    #[test]
    fn round_trip_default_state_through_emergency_cycle() {
        let (_, _, _, aim) = coordinator();
        let p = NormalizedPoint::new(0.25, 0.75).unwrap();
        aim.set_default_state(p).unwrap();
        let expected_x = aim.servo_x.angle();
        let expected_y = aim.servo_y.angle();

        aim.emergency_disable_and_lock();
        aim.unlock();
        aim.restore_last_state();

        assert_eq!(aim.servo_x.angle().degrees(), expected_x.degrees());
        assert_eq!(aim.servo_y.angle().degrees(), expected_y.degrees());
    }

    #[test]
    fn shoot_at_enables_laser_and_records_time() {
        let (_, laser, _, aim) = coordinator();
        assert!(!laser.is_enabled());
        aim.shoot_at(NormalizedPoint::new(0.5, 0.5).unwrap())
            .unwrap();
        assert!(laser.is_enabled());
        assert!(aim.get_last_shoot().is_some());
    }

    #[test]
    fn disarm_disables_laser_and_restores_default() {
        let (_, laser, _, aim) = coordinator();
        aim.shoot_at(NormalizedPoint::new(0.9, 0.1).unwrap())
            .unwrap();
        aim.disarm();
        assert!(!laser.is_enabled());
        assert_eq!(aim.servo_x.angle().degrees(), 30.0);
        assert_eq!(aim.servo_y.angle().degrees(), 30.0);
    }

    #[test]
    fn calibration_toggle_forces_laser_then_off() {
        let (_, laser, journal, aim) = coordinator();
        aim.enable_calibration();
        assert!(laser.is_enabled());
        assert!(aim.is_calibration_active());
        aim.disable_calibration();
        assert!(!laser.is_enabled());
        assert!(!aim.is_calibration_active());
        assert_eq!(
            *journal.0.lock().unwrap(),
            vec![EventKind::CalibrationStart, EventKind::CalibrationEnd]
        );
    }

    #[test]
    fn set_debug_angles_updates_default_aim_and_locks_reject() {
        let (_, _, _, aim) = coordinator();
        aim.set_debug_angles(Angle::clamped(15.0), Angle::clamped(45.0))
            .unwrap();
        assert_eq!(aim.servo_x.angle().degrees(), 15.0);
        assert_eq!(aim.servo_y.angle().degrees(), 45.0);

        aim.emergency_disable_and_lock();
        let result = aim.set_debug_angles(Angle::clamped(90.0), Angle::clamped(90.0));
        assert!(matches!(result, Err(TurretError::Locked(_))));
    }
}

//! Interlock Manager: a multi-reason emergency latch with delayed,
//! reason-scoped release.
//!
//! Invariants (see the component design notes):
//! 1. `locked ⇔ LockReasonSet ≠ ∅`.
//! 2. empty → non-empty fans out `emergency_disable_and_lock()` to the
//!    laser and aim coordinator before `emergency_initiate` returns.
//! 3. non-empty → empty unlocks the laser, then the aim coordinator,
//!    then asks the aim coordinator to restore its default state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use std::time::Duration;

use tracing::info;
use turret_common::consts::{POLL_INTERVAL, REASON_DEAD_LOCKER, UNLOCK_DELAY};
use turret_hal::{HalBackend, LineHandle};

use crate::aim::AimCoordinator;
use crate::laser::LaserController;

#[derive(Default)]
struct ReasonMeta {
    latest_activity: Option<Instant>,
    resolving: bool,
}

struct State {
    reasons: HashMap<String, ReasonMeta>,
}

impl State {
    fn is_locked(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Process-wide multi-reason emergency latch.
pub struct InterlockManager {
    state: Mutex<State>,
    cv: Condvar,
    laser: Arc<LaserController>,
    aim: Arc<AimCoordinator>,
    cancel: Arc<AtomicBool>,
    button_thread: Mutex<Option<JoinHandle<()>>>,
    unlock_delay: Duration,
}

impl InterlockManager {
    pub fn new(laser: Arc<LaserController>, aim: Arc<AimCoordinator>) -> Arc<Self> {
        Self::with_unlock_delay(laser, aim, UNLOCK_DELAY)
    }

    /// Build with a non-default release-delay (used by tests to avoid
    /// real multi-second sleeps).
    pub fn with_unlock_delay(
        laser: Arc<LaserController>,
        aim: Arc<AimCoordinator>,
        unlock_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                reasons: HashMap::new(),
            }),
            cv: Condvar::new(),
            laser,
            aim,
            cancel: Arc::new(AtomicBool::new(false)),
            button_thread: Mutex::new(None),
            unlock_delay,
        })
    }

    /// Current set of reason strings holding the lock.
    pub fn reasons(&self) -> Vec<String> {
        let s = self.state.lock().unwrap();
        let mut v: Vec<String> = s.reasons.keys().cloned().collect();
        v.sort();
        v
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().unwrap().is_locked()
    }

    /// Insert `caller` into the reason set, fanning out the
    /// empty→non-empty lock if this is the first reason.
    pub fn emergency_initiate(&self, caller: &str) {
        let mut s = self.state.lock().unwrap();
        let was_empty = !s.is_locked();
        let meta = s.reasons.entry(caller.to_string()).or_default();
        meta.latest_activity = Some(Instant::now());
        drop(s);

        if was_empty {
            info!(reason = caller, "emergency lock engaged");
            self.laser.emergency_disable_and_lock();
            self.aim.emergency_disable_and_lock();
        }
        self.cv.notify_all();
    }

    /// Start (if not already running for `caller`) a release-delay
    /// task; no-op if `caller` isn't currently a reason.
    pub fn recover(self: &Arc<Self>, caller: &str) {
        let mut s = self.state.lock().unwrap();
        let Some(meta) = s.reasons.get_mut(caller) else {
            return;
        };
        if meta.resolving {
            return;
        }
        meta.resolving = true;
        drop(s);

        let this = Arc::clone(self);
        let caller = caller.to_string();
        std::thread::spawn(move || this.run_release_delay(caller));
    }

    fn run_release_delay(self: Arc<Self>, caller: String) {
        let unlock_time = Instant::now();
        loop {
            if self.cancel.load(Ordering::Acquire) {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
            let mut s = self.state.lock().unwrap();
            let Some(meta) = s.reasons.get(&caller) else {
                return; // already removed by another path
            };
            if let Some(activity) = meta.latest_activity {
                if activity > unlock_time {
                    // A fresh initiate arrived for this reason; abort.
                    if let Some(m) = s.reasons.get_mut(&caller) {
                        m.resolving = false;
                    }
                    return;
                }
            }
            if unlock_time.elapsed() >= self.unlock_delay {
                s.reasons.remove(&caller);
                let now_empty = !s.is_locked();
                drop(s);
                info!(reason = %caller, "reason cleared after release delay");
                if now_empty {
                    self.fan_out_unlock();
                }
                return;
            }
        }
    }

    fn fan_out_unlock(&self) {
        info!("all emergency reasons cleared, unlocking");
        self.laser.unlock();
        self.aim.unlock();
        self.aim.restore_last_state();
    }

    /// Spawn the physical emergency-button watcher thread, polling
    /// `button` at 10 ms granularity.
    pub fn spawn_button_watcher(self: &Arc<Self>, hal: Arc<dyn HalBackend>, button: LineHandle) {
        let this = Arc::clone(self);
        let cancel = Arc::clone(&self.cancel);
        let unlock_delay = self.unlock_delay;
        let handle = std::thread::spawn(move || {
            // Pressed == 0 per the device contract.
            loop {
                if cancel.load(Ordering::Acquire) {
                    return;
                }
                match hal.read(button) {
                    Ok(0) => {
                        this.emergency_initiate(REASON_DEAD_LOCKER);
                        let _ = hal.wait_for_value(button, 1, &cancel);
                        if cancel.load(Ordering::Acquire) {
                            return;
                        }
                        // Released; wait unlock_delay of continuous release.
                        std::thread::sleep(unlock_delay);
                        if this.is_locked() {
                            this.recover(REASON_DEAD_LOCKER);
                        }
                    }
                    Ok(_) => std::thread::sleep(POLL_INTERVAL),
                    Err(_) => std::thread::sleep(POLL_INTERVAL),
                }
            }
        });
        *self.button_thread.lock().unwrap() = Some(handle);
    }

    /// Signal the cancel flag and bump every reason's activity so
    /// outstanding release-delay tasks observe their guard condition
    /// and exit promptly, then join the button watcher.
    pub fn dispose(&self) {
        self.cancel.store(true, Ordering::Release);
        {
            let mut s = self.state.lock().unwrap();
            for meta in s.reasons.values_mut() {
                meta.latest_activity = Some(Instant::now());
            }
        }
        self.cv.notify_all();
        if let Some(handle) = self.button_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

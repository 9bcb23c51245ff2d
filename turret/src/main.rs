//! Turret control core: CLI bootstrap and lifecycle supervisor.
//!
//! Wires the device backend, controllers, interlock, perception loop,
//! event journal, and HTTP surface together, then runs until a
//! termination signal arrives.

#![deny(warnings)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use turret_common::config::TurretConfig;
use turret_common::consts::REASON_MAIN;
use turret_common::model::{CalibrationTable, DetectionLayout};
use turret_control::perception::{Detector, Frame, FrameSource, ModelDetection, PerceptionLoop};
use turret_control::{
    AimCoordinator, InterlockManager, JournalSink, LaserController, ServoController,
};
use turret_hal::{HalBackend, LinuxGpioPwmBackend, SimulatedBackend};
use turret_journal::EventJournal;

/// Turret Control Core - safety-interlocked laser-targeting turret supervisor
#[derive(Parser, Debug)]
#[command(name = "turret")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Safety-interlocked turret control core")]
#[command(long_about = None)]
struct Args {
    /// Path to the root TOML configuration file
    #[arg(short, long, default_value = "/etc/turret/turret.toml")]
    config: PathBuf,

    /// Force the simulated device backend, ignoring the real GPIO/PWM chip
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Camera capture is out of scope; this never yields a frame.
struct NoFrameSource;
impl FrameSource for NoFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        None
    }
}

/// Neural-network inference is out of scope; this never detects anything.
struct NoDetector;
impl Detector for NoDetector {
    fn detect(&mut self, _frame: &Frame) -> Vec<ModelDetection> {
        Vec::new()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("turret startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!(
        "turret control core v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = TurretConfig::load(&args.config)?;
    let calibration = CalibrationTable::load_or_default(&config.calibration_path)?;

    let hal: Arc<dyn HalBackend> = if args.simulate {
        info!("simulated device backend in use");
        Arc::new(SimulatedBackend::new())
    } else {
        Arc::new(LinuxGpioPwmBackend::open(&config.gpio.chip)?)
    };

    let laser_line = hal.get_output(config.gpio.laser_offset, "laser")?;
    let laser = Arc::new(LaserController::new(hal.clone(), laser_line));

    let servo_x = ServoController::new(
        hal.clone(),
        config.servos.x.chip,
        config.servos.x.channel,
        "x",
    )?;
    let servo_y = ServoController::new(
        hal.clone(),
        config.servos.y.chip,
        config.servos.y.channel,
        "y",
    )?;

    let journal = Arc::new(EventJournal::open(&config.journal_path)?);

    let aim = Arc::new(AimCoordinator::new(
        laser.clone(),
        servo_x,
        servo_y,
        calibration,
        journal.clone() as Arc<dyn JournalSink>,
    ));

    let interlock = InterlockManager::new(laser.clone(), aim.clone()); // Arc<InterlockManager>

    let button_line = hal.get_input(config.gpio.button_offset, "button")?;
    interlock.spawn_button_watcher(hal.clone(), button_line);

    let layout = DetectionLayout {
        protected_count: config.protected_class_count,
        target_count: config.target_class_count,
    };
    let perception = Arc::new(PerceptionLoop::new(
        Box::new(NoFrameSource),
        Box::new(NoDetector),
        layout,
        interlock.clone(),
        aim.clone(),
        journal.clone() as Arc<dyn JournalSink>,
        false,
    ));

    let perception_cancel = Arc::new(AtomicBool::new(false));
    let perception_handle = {
        let perception = perception.clone();
        let cancel = perception_cancel.clone();
        std::thread::spawn(move || perception.run(&cancel))
    };

    let state = turret_api::AppState::new(
        aim.clone(),
        interlock.clone(),
        journal.clone(),
        perception.clone(),
    );
    let router = turret_api::build_router(state);

    let shutdown = Arc::new(tokio::sync::Notify::new());
    spawn_signal_thread(Arc::clone(&shutdown));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
        info!(addr = %config.http_bind, "HTTP surface listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await
    })?;

    info!("HTTP surface stopped, tearing down");
    interlock.emergency_initiate(REASON_MAIN);

    perception_cancel.store(true, Ordering::Release);
    if let Err(e) = perception_handle.join() {
        error!("perception loop thread panicked: {e:?}");
    }

    interlock.dispose();
    aim.teardown();
    laser.teardown();

    if let Err(e) = hal.release(button_line) {
        warn!(error = %e, "failed to release emergency button line during teardown");
    }

    journal.shutdown();

    info!("turret control core shutdown complete");
    Ok(())
}

/// Spawn a thread blocking on `SIGINT`/`SIGTERM`/`SIGHUP` that wakes the
/// async runtime's graceful shutdown on the first one received.
fn spawn_signal_thread(shutdown: Arc<tokio::sync::Notify>) {
    let mut signals = match Signals::new([SIGINT, SIGTERM, SIGHUP]) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to install signal handlers: {e}");
            return;
        }
    };
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "shutdown signal received");
            shutdown.notify_one();
        }
    });
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

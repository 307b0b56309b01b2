// src/main.rs
// Entry point: runs the mode controller against simulated hardware, with the
// companion bridge fed from stdin (one front-end request path per line, e.g.
// `/fwd`, `/Auto`, `/manual`).

use gridrover::core::{ModeController, ModeSwitch, Vehicle};
use gridrover::interface::{Bridge, FramedChannel, HBridgeDrive, StdClock};
use gridrover::sim::{ScriptedRanger, SimPin};
use gridrover::{Mode, RoverConfig};
use log::{error, info};
use std::error::Error;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting gridrover controller...");

    let config = match std::env::args().nth(1) {
        Some(path) => RoverConfig::load(path)?,
        None => RoverConfig::default(),
    };

    let drive = HBridgeDrive::new(SimPin::new(), SimPin::new(), SimPin::new(), SimPin::new());
    let vehicle = Vehicle::new(
        drive,
        ScriptedRanger::default(),
        StdClock::new(),
        config.sensor.proximity_threshold_cm,
    );

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let channel = FramedChannel::new(rx, config.channel.framing);
    let switch = ModeSwitch::new();
    let mut controller = ModeController::new(vehicle, channel, switch.clone(), &config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let bridge_shutdown = shutdown.clone();
    let mut bridge = Bridge::new(tx, switch, config.initial_mode == Mode::Manual);
    let reader = std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read request: {}", e);
                    break;
                }
            };
            match bridge.handle(line.trim()) {
                Ok(Some(action)) => info!("Bridge: {:?}", action),
                Ok(None) => {}
                Err(e) => error!("Bridge failed: {}", e),
            }
        }
        bridge_shutdown.store(true, Ordering::Release);
    });

    controller.run(&shutdown);
    if reader.join().is_err() {
        error!("Bridge thread panicked");
    }

    if let Some(nav) = controller.navigator() {
        let estimate = nav.dead_reckoning();
        info!(
            "Final estimate ({}, {}) after {} steps, {} aborted, {} cells unvisited",
            estimate.position.x,
            estimate.position.y,
            estimate.steps,
            estimate.aborted,
            nav.remaining()
        );
    }
    info!("Gridrover stopped");
    Ok(())
}

// core/mod.rs

// Declares the rover brainstem: rangefinder perception, dead-reckoned
// localization, the visitation grid, the mode-request API and the mode state
// machine. `Vehicle` bundles the hardware every controller acts through.

pub mod api;
pub mod localization;
pub mod memory;
pub mod perception;
pub mod state;

pub use api::{ModeLines, ModeRequest, ModeSwitch};
pub use localization::{DeadReckoning, Heading, Localization, Position};
pub use memory::{CellState, Grid};
pub use perception::{DistanceReading, EchoRanger, EchoTiming, RangeSensor};
pub use state::{Mode, ModeController};

use log::{debug, info};
use std::time::Duration;

use crate::interface::{Clock, Drivetrain};

/// A single timed maneuver used by autonomous navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    /// Drive forward, watching the rangefinder
    Forward,
    /// Quarter turn counter-clockwise
    RotateLeft,
    /// Quarter turn clockwise
    RotateRight,
}

/// How a timed maneuver ended; the drivetrain is stopped in every case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Ran for the full duration
    Completed,
    /// Forward motion cut short by a proximity reading
    Obstructed,
    /// Cut short because a mode change is pending
    Interrupted,
}

/// Drivetrain, rangefinder and clock of one rover
pub struct Vehicle<D, S, C> {
    drive: D,
    sensor: S,
    clock: C,
    threshold_cm: f64,
}

impl<D: Drivetrain, S: RangeSensor, C: Clock> Vehicle<D, S, C> {
    /// Bundle the hardware; readings below `threshold_cm` block forward motion
    pub fn new(drive: D, sensor: S, clock: C, threshold_cm: f64) -> Self {
        Vehicle {
            drive,
            sensor,
            clock,
            threshold_cm,
        }
    }

    /// Proximity threshold in centimetres
    pub fn proximity_threshold(&self) -> f64 {
        self.threshold_cm
    }

    /// Drivetrain access
    pub fn drive(&self) -> &D {
        &self.drive
    }

    /// Mutable drivetrain access
    pub fn drive_mut(&mut self) -> &mut D {
        &mut self.drive
    }

    /// Rangefinder access
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Clock access
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take one rangefinder reading
    pub fn measure(&mut self) -> DistanceReading {
        self.sensor.measure()
    }

    /// Take one reading and report whether it blocks forward motion
    pub fn sense_blocked(&mut self) -> bool {
        self.measure().is_within(self.threshold_cm)
    }

    /// Explicit stop used when a controller cedes the drivetrain
    pub fn halt(&mut self) {
        self.drive.stop();
    }

    /// Run `maneuver` for `duration`, re-checking the rangefinder (forward
    /// only) and the mode switch every `poll`. Only a request that would leave
    /// `active` cuts the maneuver short.
    pub fn timed(
        &mut self,
        maneuver: Maneuver,
        duration: Duration,
        poll: Duration,
        switch: &ModeSwitch,
        active: Mode,
    ) -> MotionOutcome {
        if switch.pending_change(active).is_some() {
            self.drive.stop();
            return MotionOutcome::Interrupted;
        }

        let start = self.clock.now();
        match maneuver {
            Maneuver::Forward => {
                let blocked = self.sense_blocked();
                self.drive.forward(blocked);
                if blocked {
                    info!("Forward step refused, obstacle within {}cm", self.threshold_cm);
                    return MotionOutcome::Obstructed;
                }
            }
            Maneuver::RotateLeft => self.drive.rotate_left(),
            Maneuver::RotateRight => self.drive.rotate_right(),
        }

        loop {
            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= duration {
                break;
            }
            self.clock.sleep(poll.min(duration - elapsed));

            if switch.pending_change(active).is_some() {
                self.drive.stop();
                debug!("{:?} interrupted by pending mode change", maneuver);
                return MotionOutcome::Interrupted;
            }
            if maneuver == Maneuver::Forward && self.sense_blocked() {
                self.drive.stop();
                info!("Forward step aborted, obstacle within {}cm", self.threshold_cm);
                return MotionOutcome::Obstructed;
            }
        }

        self.drive.stop();
        MotionOutcome::Completed
    }
}

// src/interface/drive.rs
// Drivetrain contract and the two-channel H-bridge truth table behind it.
//
// Pin order is M11, M12 (left motor) then M21, M22 (right motor).
//
// | primitive    | M11 | M12 | M21 | M22 |
// |--------------|-----|-----|-----|-----|
// | stop         |  L  |  L  |  L  |  L  |
// | forward      |  H  |  L  |  H  |  L  |
// | backward     |  L  |  H  |  L  |  H  |
// | rotate left  |  H  |  L  |  L  |  H  |
// | rotate right |  L  |  H  |  H  |  L  |

use embedded_hal::digital::v2::OutputPin;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The five discrete motion primitives of a differential drive.
///
/// Every operation is idempotent. `forward(true)` is exactly `stop()`: when the
/// caller reports an obstacle, forward motion is suppressed rather than
/// partially executed.
pub trait Drivetrain {
    /// Both motors off
    fn stop(&mut self);
    /// Both motors forward, unless `blocked`
    fn forward(&mut self, blocked: bool);
    /// Both motors reversed
    fn backward(&mut self);
    /// Motors in opposing senses, turning counter-clockwise in place
    fn rotate_left(&mut self);
    /// Motors in opposing senses, turning clockwise in place
    fn rotate_right(&mut self);
}

/// Observable drivetrain state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveState {
    /// All channels low
    Stopped,
    /// Translating forward
    Forward,
    /// Translating backward
    Backward,
    /// Rotating counter-clockwise
    RotatingLeft,
    /// Rotating clockwise
    RotatingRight,
}

impl DriveState {
    /// Channel levels `[M11, M12, M21, M22]` for this state
    pub fn levels(self) -> [bool; 4] {
        match self {
            DriveState::Stopped => [false, false, false, false],
            DriveState::Forward => [true, false, true, false],
            DriveState::Backward => [false, true, false, true],
            DriveState::RotatingLeft => [true, false, false, true],
            DriveState::RotatingRight => [false, true, true, false],
        }
    }
}

/// Drivetrain over two H-bridge channel pairs
pub struct HBridgeDrive<P: OutputPin> {
    pins: [P; 4],
    state: DriveState,
}

impl<P> HBridgeDrive<P>
where
    P: OutputPin,
    P::Error: Debug,
{
    /// Take ownership of the four direction pins and drive them all low
    pub fn new(m11: P, m12: P, m21: P, m22: P) -> Self {
        let mut drive = HBridgeDrive {
            pins: [m11, m12, m21, m22],
            state: DriveState::Stopped,
        };
        drive.apply(DriveState::Stopped);
        drive
    }

    /// Last state written to the pins
    pub fn state(&self) -> DriveState {
        self.state
    }

    /// Give the pins back, leaving them in their current state
    pub fn into_pins(self) -> [P; 4] {
        self.pins
    }

    fn apply(&mut self, state: DriveState) {
        for (index, (pin, high)) in self.pins.iter_mut().zip(state.levels()).enumerate() {
            let written = if high { pin.set_high() } else { pin.set_low() };
            if let Err(e) = written {
                error!("Drive pin {} rejected {:?}: {:?}", index, state, e);
            }
        }
        if state != self.state {
            debug!("Drive {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}

impl<P> Drivetrain for HBridgeDrive<P>
where
    P: OutputPin,
    P::Error: Debug,
{
    fn stop(&mut self) {
        self.apply(DriveState::Stopped);
    }

    fn forward(&mut self, blocked: bool) {
        if blocked {
            self.stop();
        } else {
            self.apply(DriveState::Forward);
        }
    }

    fn backward(&mut self) {
        self.apply(DriveState::Backward);
    }

    fn rotate_left(&mut self) {
        self.apply(DriveState::RotatingLeft);
    }

    fn rotate_right(&mut self) {
        self.apply(DriveState::RotatingRight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPin;

    fn drive() -> (HBridgeDrive<SimPin>, [SimPin; 4]) {
        let pins = [SimPin::new(), SimPin::new(), SimPin::new(), SimPin::new()];
        let drive = HBridgeDrive::new(
            pins[0].clone(),
            pins[1].clone(),
            pins[2].clone(),
            pins[3].clone(),
        );
        (drive, pins)
    }

    fn levels(pins: &[SimPin; 4]) -> [bool; 4] {
        [pins[0].level(), pins[1].level(), pins[2].level(), pins[3].level()]
    }

    #[test]
    fn starts_with_all_channels_low() {
        let (drive, pins) = drive();
        assert_eq!(drive.state(), DriveState::Stopped);
        assert_eq!(levels(&pins), [false; 4]);
    }

    #[test]
    fn rotations_drive_motors_in_opposing_senses() {
        let (mut drive, pins) = drive();
        drive.rotate_left();
        assert_eq!(levels(&pins), [true, false, false, true]);
        drive.rotate_right();
        assert_eq!(levels(&pins), [false, true, true, false]);
        drive.backward();
        assert_eq!(levels(&pins), [false, true, false, true]);
    }

    #[test]
    fn blocked_forward_matches_stop() {
        let (mut drive, pins) = drive();
        drive.forward(false);
        assert_eq!(levels(&pins), [true, false, true, false]);

        drive.forward(true);
        let after_blocked = levels(&pins);
        drive.stop();
        assert_eq!(after_blocked, levels(&pins));
        assert_eq!(drive.state(), DriveState::Stopped);
    }
}

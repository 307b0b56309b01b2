//! Hardware-facing interfaces for the rover
//!
//! This module holds the boundary between the controller and the outside world:
//! - The clock seam implemented by the board (or the simulator); digital pins
//!   come in through the `embedded-hal` traits
//! - The drivetrain truth table
//! - Framed command decoding for the teleoperation byte stream
//! - The companion bridge that turns front-end requests into tokens and mode events

mod bridge;
mod channel;
mod drive;

use embedded_hal::blocking::delay::DelayUs;
use std::time::{Duration, Instant};

pub use bridge::*;
pub use channel::*;
pub use drive::*;

/// Monotonic time source used by timed maneuvers and echo measurement
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// Start a clock whose origin is now
    pub fn new() -> Self {
        StdClock {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl DelayUs<u32> for StdClock {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us.into()));
    }
}

//! Simulated hardware for running the controller off-board
//!
//! Every handle here is cheap to clone and shares its state with the
//! original, so a test can keep one copy while the controller owns another.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use log::debug;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::{DistanceReading, RangeSensor};
use crate::interface::{Clock, Drivetrain};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Virtual clock: `sleep` advances time instantly, and every `now` call can
/// advance it by a fixed tick so busy-wait loops terminate
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    micros: Arc<AtomicU64>,
    tick_us: u64,
}

impl SimClock {
    /// Clock that only moves on `sleep` and `advance`
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that also moves by `tick` on every `now` call
    pub fn with_tick(tick: Duration) -> Self {
        SimClock {
            micros: Arc::new(AtomicU64::new(0)),
            tick_us: tick.as_micros() as u64,
        }
    }

    /// Current virtual time, without ticking
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Acquire))
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.micros.fetch_add(by.as_micros() as u64, Ordering::AcqRel);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.fetch_add(self.tick_us, Ordering::AcqRel))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl DelayUs<u32> for SimClock {
    fn delay_us(&mut self, us: u32) {
        self.advance(Duration::from_micros(us.into()));
    }
}

/// Shared digital line usable as either input or output
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    /// Line held low
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the line level from outside
    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }

    /// Current line level
    pub fn level(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

/// Echo line that is high during a scheduled window of virtual time
#[derive(Debug, Clone)]
pub struct SimEcho {
    clock: SimClock,
    window: Arc<Mutex<Option<(Duration, Duration)>>>,
}

impl SimEcho {
    /// Silent echo line
    pub fn new(clock: SimClock) -> Self {
        SimEcho {
            clock,
            window: Arc::new(Mutex::new(None)),
        }
    }

    /// Hold the line high from `rise` until `fall` (absolute virtual times)
    pub fn schedule(&self, rise: Duration, fall: Duration) {
        *lock(&self.window) = Some((rise, fall));
    }
}

impl SimEcho {
    fn level(&self) -> bool {
        let now = self.clock.elapsed();
        matches!(*lock(&self.window), Some((rise, fall)) if rise <= now && now < fall)
    }
}

impl InputPin for SimEcho {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

/// One call made on a drivetrain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveAction {
    /// `stop()`
    Stop,
    /// `forward(blocked)`
    Forward {
        /// Whether the caller reported an obstacle
        blocked: bool,
    },
    /// `backward()`
    Backward,
    /// `rotate_left()`
    RotateLeft,
    /// `rotate_right()`
    RotateRight,
}

/// Drivetrain that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingDrive {
    log: Arc<Mutex<Vec<DriveAction>>>,
}

impl RecordingDrive {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded call, oldest first
    pub fn actions(&self) -> Vec<DriveAction> {
        lock(&self.log).clone()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        lock(&self.log).clear();
    }

    fn record(&mut self, action: DriveAction) {
        debug!("Sim drive {:?}", action);
        lock(&self.log).push(action);
    }
}

impl Drivetrain for RecordingDrive {
    fn stop(&mut self) {
        self.record(DriveAction::Stop);
    }

    fn forward(&mut self, blocked: bool) {
        self.record(DriveAction::Forward { blocked });
    }

    fn backward(&mut self) {
        self.record(DriveAction::Backward);
    }

    fn rotate_left(&mut self) {
        self.record(DriveAction::RotateLeft);
    }

    fn rotate_right(&mut self) {
        self.record(DriveAction::RotateRight);
    }
}

/// Rangefinder returning queued readings, then a fallback
#[derive(Debug, Clone)]
pub struct ScriptedRanger {
    queue: Arc<Mutex<VecDeque<DistanceReading>>>,
    fallback: Arc<Mutex<DistanceReading>>,
    measurements: Arc<AtomicU64>,
}

impl ScriptedRanger {
    /// Ranger that reports `fallback` whenever its queue is empty
    pub fn new(fallback: DistanceReading) -> Self {
        ScriptedRanger {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(fallback)),
            measurements: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue readings to be returned in order
    pub fn push(&self, readings: impl IntoIterator<Item = DistanceReading>) {
        lock(&self.queue).extend(readings);
    }

    /// Replace the fallback reading
    pub fn set_fallback(&self, reading: DistanceReading) {
        *lock(&self.fallback) = reading;
    }

    /// Number of measurements taken so far
    pub fn measurements(&self) -> u64 {
        self.measurements.load(Ordering::Acquire)
    }
}

impl Default for ScriptedRanger {
    fn default() -> Self {
        Self::new(DistanceReading::NoEcho)
    }
}

impl RangeSensor for ScriptedRanger {
    fn measure(&mut self) -> DistanceReading {
        self.measurements.fetch_add(1, Ordering::AcqRel);
        let queued = lock(&self.queue).pop_front();
        queued.unwrap_or_else(|| *lock(&self.fallback))
    }
}

//! Gridrover - mode-switching motion controller for a differential-drive rover
//!
//! This library drives a two-motor vehicle that is either teleoperated over a
//! byte channel or runs an autonomous grid exploration, using a single-beam
//! rangefinder to gate forward motion in both modes.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod core;
pub mod interface;
pub mod navigation;
pub mod sim;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Re-export commonly used items for easier access
pub use crate::core::{
    DistanceReading, EchoRanger, Grid, Heading, Mode, ModeController, ModeRequest, ModeSwitch,
    Position, RangeSensor, Vehicle,
};
pub use crate::interface::{Command, CommandChannel, Drivetrain, Framing, FramedChannel, HBridgeDrive};
pub use crate::navigation::{AutoNavigator, GridExplorer, ManualController, Phase, Scan};

/// Main configuration structure for the rover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Exploration grid dimensions
    pub grid: GridConfig,
    /// Timed motion parameters used in automatic mode
    pub motion: MotionConfig,
    /// Rangefinder parameters
    pub sensor: SensorConfig,
    /// Command channel framing
    pub channel: ChannelConfig,
    /// Mode the controller starts in
    pub initial_mode: Mode,
    /// Pause between controller iterations, in milliseconds
    pub loop_period_ms: u64,
}

/// Grid dimensions for an autonomous session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of rows (y extent)
    pub rows: usize,
    /// Number of columns (x extent)
    pub columns: usize,
}

/// Durations of the timed maneuvers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Forward drive time to cross one grid cell
    pub cell_ms: u64,
    /// Rotation time for one quarter turn
    pub turn_ms: u64,
    /// Rangefinder polling cadence during a timed maneuver
    pub poll_ms: u64,
}

/// Rangefinder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Readings strictly below this distance block forward motion
    pub proximity_threshold_cm: f64,
    /// Echo wait bound, measured from the start of the trigger pulse
    pub echo_timeout_us: u64,
    /// Trigger pulse width
    pub trigger_pulse_us: u64,
    /// Echo high-time per centimetre of distance (round trip)
    pub us_per_cm: f64,
}

/// Command channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// How the byte stream is cut into frames
    pub framing: Framing,
}

impl Default for RoverConfig {
    fn default() -> Self {
        RoverConfig {
            grid: GridConfig {
                rows: 3,
                columns: 3,
            },
            motion: MotionConfig {
                cell_ms: 400,
                turn_ms: 350,
                poll_ms: 20,
            },
            sensor: SensorConfig {
                proximity_threshold_cm: 5.0,
                echo_timeout_us: 10_000,
                trigger_pulse_us: 10,
                us_per_cm: 58.0,
            },
            channel: ChannelConfig {
                framing: Framing::default(),
            },
            initial_mode: Mode::Manual,
            loop_period_ms: 10,
        }
    }
}

impl RoverConfig {
    /// Parse a configuration from YAML text; missing sections take defaults
    pub fn from_yaml(text: &str) -> Result<Self, RoverError> {
        let config: RoverConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RoverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), RoverError> {
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(RoverError::ConfigError(format!(
                "grid must be non-empty, got {}x{}",
                self.grid.rows, self.grid.columns
            )));
        }
        let motion = &self.motion;
        if motion.poll_ms == 0 || motion.poll_ms > motion.cell_ms || motion.poll_ms > motion.turn_ms {
            return Err(RoverError::ConfigError(format!(
                "poll interval {}ms must be non-zero and no longer than cell ({}ms) and turn ({}ms) durations",
                motion.poll_ms, motion.cell_ms, motion.turn_ms
            )));
        }
        if !(self.sensor.proximity_threshold_cm > 0.0) || !(self.sensor.us_per_cm > 0.0) {
            return Err(RoverError::ConfigError(
                "proximity threshold and echo scale must be positive".to_string(),
            ));
        }
        if let Framing::Fixed { len } = self.channel.framing {
            if len < interface::TOKEN_LEN {
                return Err(RoverError::ConfigError(format!(
                    "fixed frame length {} cannot hold a {}-byte token",
                    len,
                    interface::TOKEN_LEN
                )));
            }
        }
        Ok(())
    }

    /// Motion timing derived from the configured milliseconds
    pub fn timing(&self) -> navigation::MotionTiming {
        navigation::MotionTiming {
            cell: Duration::from_millis(self.motion.cell_ms),
            turn: Duration::from_millis(self.motion.turn_ms),
            poll: Duration::from_millis(self.motion.poll_ms),
        }
    }

    /// Controller loop pause
    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }
}

/// Rover error types
#[derive(Debug)]
pub enum RoverError {
    /// Configuration could not be read or is inconsistent
    ConfigError(String),
    /// Command channel failure
    ChannelError(String),
    /// Position outside the active grid
    GridError(String),
    /// Underlying I/O failure
    IoError(std::io::Error),
}

impl std::fmt::Display for RoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RoverError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            RoverError::ChannelError(msg) => write!(f, "Channel error: {}", msg),
            RoverError::GridError(msg) => write!(f, "Grid error: {}", msg),
            RoverError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for RoverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoverError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RoverError {
    fn from(err: std::io::Error) -> Self {
        RoverError::IoError(err)
    }
}

impl From<serde_yaml::Error> for RoverError {
    fn from(err: serde_yaml::Error) -> Self {
        RoverError::ConfigError(err.to_string())
    }
}

// src/navigation/controller.rs
// Teleoperation: one rangefinder reading and at most one channel command per
// iteration, with forward motion gated on proximity.

use log::{debug, info};

use crate::RoverError;
use crate::core::{DistanceReading, RangeSensor, Vehicle};
use crate::interface::{Clock, Command, CommandChannel, Drivetrain};

/// Manual-mode loop body
#[derive(Debug, Default)]
pub struct ManualController {
    last_reading: Option<DistanceReading>,
}

impl ManualController {
    /// Fresh controller
    pub fn new() -> Self {
        ManualController { last_reading: None }
    }

    /// Reading taken by the most recent iteration
    pub fn last_reading(&self) -> Option<DistanceReading> {
        self.last_reading
    }

    /// Run one iteration and return the command that was dispatched, if any
    pub fn iterate<D, S, C, Ch>(
        &mut self,
        vehicle: &mut Vehicle<D, S, C>,
        channel: &mut Ch,
    ) -> Result<Option<Command>, RoverError>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
        Ch: CommandChannel + ?Sized,
    {
        let reading = vehicle.measure();
        self.last_reading = Some(reading);
        let blocked = reading.is_within(vehicle.proximity_threshold());

        let Some(command) = channel.poll()? else {
            return Ok(None);
        };
        let drive = vehicle.drive_mut();
        match command {
            Command::Stop => drive.stop(),
            Command::Forward => {
                if blocked {
                    info!("Forward suppressed, obstacle at {:?}", reading);
                }
                drive.forward(blocked);
            }
            Command::Backward => drive.backward(),
            Command::RotateLeft => drive.rotate_left(),
            Command::RotateRight => drive.rotate_right(),
            Command::Unknown => {}
        }
        debug!("Manual dispatch {:?}", command);
        Ok(Some(command))
    }
}

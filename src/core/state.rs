// core/state.rs

// Top-level mode state machine. Exactly one controller drives the vehicle at
// a time; mode requests are applied only between iterations, after an
// explicit stop of the outgoing controller.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::api::{ModeRequest, ModeSwitch};
use super::perception::RangeSensor;
use super::Vehicle;
use crate::interface::{Clock, CommandChannel, Drivetrain};
use crate::navigation::{AutoNavigator, ManualController, MotionTiming, Phase};
use crate::{RoverConfig, RoverError};

/// Rover operating modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Teleoperated over the command channel
    Manual,
    /// Exploring the grid on its own
    Automatic,
}

impl From<ModeRequest> for Mode {
    fn from(request: ModeRequest) -> Self {
        match request {
            ModeRequest::Manual => Mode::Manual,
            ModeRequest::Automatic => Mode::Automatic,
        }
    }
}

// The active controller together with the state only it owns.
enum Session {
    Manual(ManualController),
    Automatic(AutoNavigator),
}

/// Owns the vehicle and the command channel and runs whichever mode is active
pub struct ModeController<D, S, C, Ch> {
    vehicle: Vehicle<D, S, C>,
    channel: Ch,
    switch: ModeSwitch,
    rows: usize,
    columns: usize,
    timing: MotionTiming,
    period: Duration,
    session: Session,
}

impl<D, S, C, Ch> ModeController<D, S, C, Ch>
where
    D: Drivetrain,
    S: RangeSensor,
    C: Clock,
    Ch: CommandChannel,
{
    /// Build the controller and enter `config.initial_mode`
    pub fn new(
        vehicle: Vehicle<D, S, C>,
        mut channel: Ch,
        switch: ModeSwitch,
        config: &RoverConfig,
    ) -> Result<Self, RoverError> {
        config.validate()?;
        let (rows, columns) = (config.grid.rows, config.grid.columns);
        let timing = config.timing();
        let session = match config.initial_mode {
            Mode::Manual => {
                channel.acquire()?;
                Session::Manual(ManualController::new())
            }
            Mode::Automatic => {
                channel.release();
                Session::Automatic(AutoNavigator::new(rows, columns, timing, switch.clone())?)
            }
        };
        info!("Mode controller starting in {:?}", config.initial_mode);
        Ok(ModeController {
            vehicle,
            channel,
            switch,
            rows,
            columns,
            timing,
            period: config.loop_period(),
            session,
        })
    }

    /// Active mode
    pub fn mode(&self) -> Mode {
        match self.session {
            Session::Manual(_) => Mode::Manual,
            Session::Automatic(_) => Mode::Automatic,
        }
    }

    /// Handle for raising mode requests from other threads
    pub fn switch(&self) -> ModeSwitch {
        self.switch.clone()
    }

    /// The autonomous session, when automatic
    pub fn navigator(&self) -> Option<&AutoNavigator> {
        match &self.session {
            Session::Automatic(nav) => Some(nav),
            Session::Manual(_) => None,
        }
    }

    /// The manual controller, when manual
    pub fn manual(&self) -> Option<&ManualController> {
        match &self.session {
            Session::Manual(manual) => Some(manual),
            Session::Automatic(_) => None,
        }
    }

    /// Hardware bundle
    pub fn vehicle(&self) -> &Vehicle<D, S, C> {
        &self.vehicle
    }

    /// Command channel
    pub fn channel(&self) -> &Ch {
        &self.channel
    }

    /// One loop pass: apply any pending mode request, then one iteration of
    /// the active controller
    pub fn step(&mut self) -> Result<(), RoverError> {
        if let Some(request) = self.switch.take() {
            self.apply(request)?;
        }
        match &mut self.session {
            Session::Manual(manual) => {
                manual.iterate(&mut self.vehicle, &mut self.channel)?;
            }
            Session::Automatic(nav) => {
                nav.step(&mut self.vehicle)?;
            }
        }
        Ok(())
    }

    /// Loop until `shutdown` is set, pausing the configured loop period
    /// between passes. Step errors are logged and the loop carries on.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Acquire) {
            if let Err(e) = self.step() {
                error!("Controller step failed: {}", e);
            }
            self.vehicle.clock().sleep(self.period);
        }
        self.vehicle.halt();
        self.channel.release();
        info!("Mode controller stopped in {:?}", self.mode());
    }

    fn apply(&mut self, request: ModeRequest) -> Result<(), RoverError> {
        let target = Mode::from(request);
        if target == self.mode() {
            let finished = matches!(self.navigator(), Some(nav) if nav.phase() == Phase::Idle);
            if !finished {
                debug!("Already in {:?}, request ignored", target);
                return Ok(());
            }
        }

        // Quiesce the outgoing controller before anything else moves.
        self.vehicle.halt();
        let session = match target {
            Mode::Manual => self
                .channel
                .acquire()
                .map(|()| Session::Manual(ManualController::new())),
            Mode::Automatic => {
                self.channel.release();
                AutoNavigator::new(self.rows, self.columns, self.timing, self.switch.clone())
                    .map(Session::Automatic)
            }
        };
        match session {
            Ok(session) => {
                info!("Mode {:?} -> {:?}", self.mode(), target);
                self.session = session;
                Ok(())
            }
            Err(e) => {
                // Stay halted in the outgoing mode and retry on the next pass.
                warn!("Mode {:?} -> {:?} failed, vehicle held: {}", self.mode(), target, e);
                self.switch.restore(request);
                Err(e)
            }
        }
    }
}

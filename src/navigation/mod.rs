//! Navigation system for the rover
//!
//! This module holds both drivers of the drivetrain:
//! - `ManualController` for teleoperation
//! - `AutoNavigator`, which explores the grid cell by cell with
//!   `GridExplorer` choosing targets and dead reckoning tracking the pose

mod controller;
mod planner;

pub use controller::ManualController;
pub use planner::{GridExplorer, Scan};

use log::{info, warn};
use std::time::Duration;

use crate::RoverError;
use crate::core::localization::Axis;
use crate::core::{
    DeadReckoning, Grid, Heading, Localization, Maneuver, Mode, ModeSwitch, MotionOutcome,
    Position, RangeSensor, Vehicle,
};
use crate::interface::{Clock, Drivetrain};

/// Durations of the timed maneuvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionTiming {
    /// Forward time to cross one cell
    pub cell: Duration,
    /// Time for one quarter turn
    pub turn: Duration,
    /// Polling cadence while a maneuver runs
    pub poll: Duration,
}

/// Autonomous session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Looking for the next target
    Searching,
    /// Driving to a target
    Navigating(Position),
    /// Exploration over, driving back to the origin
    ReturningHome,
    /// Session finished
    Idle,
}

/// How a call to `navigate` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// Bookkeeping reached the target
    Arrived,
    /// A forward step was refused or cut short; the cell ahead is reported
    Obstructed(Option<Position>),
    /// A mode change is pending; navigation was abandoned
    Interrupted,
}

/// Autonomous explorer for one session
#[derive(Debug)]
pub struct AutoNavigator {
    explorer: GridExplorer,
    localization: Localization,
    remaining: usize,
    phase: Phase,
    timing: MotionTiming,
    switch: ModeSwitch,
}

impl AutoNavigator {
    /// Fresh session on an all-unvisited `rows` x `columns` grid, at the
    /// origin facing (+1, +1), in `Searching`
    pub fn new(
        rows: usize,
        columns: usize,
        timing: MotionTiming,
        switch: ModeSwitch,
    ) -> Result<Self, RoverError> {
        let grid = Grid::new(rows, columns)?;
        Ok(AutoNavigator {
            explorer: GridExplorer::new(grid),
            localization: Localization::new(),
            remaining: rows * columns,
            phase: Phase::Searching,
            timing,
            switch,
        })
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Assumed cell
    pub fn position(&self) -> Position {
        self.localization.position()
    }

    /// Assumed heading
    pub fn heading(&self) -> Heading {
        self.localization.heading()
    }

    /// Cells not yet visited
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Grid and target selection
    pub fn explorer(&self) -> &GridExplorer {
        &self.explorer
    }

    /// Mutable grid access, for seeding known obstacles
    pub fn explorer_mut(&mut self) -> &mut GridExplorer {
        &mut self.explorer
    }

    /// Uncorrected pose estimate
    pub fn dead_reckoning(&self) -> DeadReckoning {
        self.localization.estimate()
    }

    /// Advance the session state machine by one transition
    pub fn step<D, S, C>(&mut self, vehicle: &mut Vehicle<D, S, C>) -> Result<Phase, RoverError>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
    {
        let next = match self.phase {
            Phase::Searching => match self.explorer.find_next(self.position()) {
                Scan::Next(target) => Phase::Navigating(target),
                Scan::Exhausted => {
                    info!("Exploration complete, returning home");
                    Phase::ReturningHome
                }
                Scan::Blocked(cell) => {
                    warn!("Scan halted at blocked cell ({}, {}), returning home", cell.x, cell.y);
                    Phase::ReturningHome
                }
            },
            Phase::Navigating(target) => match self.navigate(vehicle, target)? {
                NavOutcome::Arrived => {
                    if self.explorer.mark_visited(target) {
                        self.remaining -= 1;
                    }
                    Phase::Searching
                }
                NavOutcome::Obstructed(_) => {
                    warn!("Exploration stopped by obstacle, returning home");
                    Phase::ReturningHome
                }
                NavOutcome::Interrupted => self.phase,
            },
            Phase::ReturningHome => match self.navigate(vehicle, Position::ORIGIN)? {
                NavOutcome::Arrived => {
                    info!("Back at origin, {} cells unvisited", self.remaining);
                    Phase::Idle
                }
                NavOutcome::Obstructed(_) => {
                    warn!("Return home obstructed at ({}, {})", self.position().x, self.position().y);
                    Phase::Idle
                }
                NavOutcome::Interrupted => self.phase,
            },
            Phase::Idle => Phase::Idle,
        };
        if next != self.phase {
            info!("Auto phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
        Ok(next)
    }

    /// Drive the session until it is idle or a request to leave automatic
    /// mode interrupts it
    pub fn explore<D, S, C>(&mut self, vehicle: &mut Vehicle<D, S, C>) -> Result<Phase, RoverError>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
    {
        while self.phase != Phase::Idle && self.switch.pending_change(Mode::Automatic).is_none() {
            self.step(vehicle)?;
        }
        Ok(self.phase)
    }

    /// Drive from the current assumed cell to `to`: x leg first, then y leg,
    /// with rotations chosen from the heading signs.
    pub fn navigate<D, S, C>(
        &mut self,
        vehicle: &mut Vehicle<D, S, C>,
        to: Position,
    ) -> Result<NavOutcome, RoverError>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
    {
        if !self.explorer.grid().contains(to) {
            return Err(RoverError::GridError(format!(
                "target ({}, {}) outside {}x{} grid",
                to.x,
                to.y,
                self.explorer.grid().rows(),
                self.explorer.grid().columns()
            )));
        }
        let delta = self.position().delta_to(&to);
        let (dx, dy) = (delta.x, delta.y);

        // Reverse along x as two quarter turns.
        if dx.signum() * self.heading().x() < 0 {
            self.localization.heading_mut().flip_x();
            for _ in 0..2 {
                if let Some(outcome) = self.rotate(vehicle, 1) {
                    return Ok(outcome);
                }
            }
        }

        for _ in 0..dx.abs() {
            if let Some(outcome) = self.forward(vehicle, Axis::X, dx.signum())? {
                return Ok(outcome);
            }
        }

        let turn = if self.heading().x() > 0 { dy.signum() } else { -dy.signum() };
        if let Some(outcome) = self.rotate(vehicle, turn) {
            return Ok(outcome);
        }

        for _ in 0..dy.abs() {
            if let Some(outcome) = self.forward(vehicle, Axis::Y, dy.signum())? {
                return Ok(outcome);
            }
        }

        self.localization.heading_mut().set_y_sign(dy);
        let heading = self.heading();
        if let Some(outcome) = self.rotate(vehicle, -(heading.x() * heading.y())) {
            return Ok(outcome);
        }
        Ok(NavOutcome::Arrived)
    }

    // Positive turns left, negative turns right, zero does nothing. `Some`
    // carries the outcome that ends the current navigation.
    fn rotate<D, S, C>(&mut self, vehicle: &mut Vehicle<D, S, C>, amount: i64) -> Option<NavOutcome>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
    {
        let maneuver = match amount.signum() {
            1 => Maneuver::RotateLeft,
            -1 => Maneuver::RotateRight,
            _ => return None,
        };
        let turn = self.timing.turn;
        match vehicle.timed(maneuver, turn, self.timing.poll, &self.switch, Mode::Automatic) {
            MotionOutcome::Completed | MotionOutcome::Obstructed => None,
            MotionOutcome::Interrupted => {
                self.localization.record_abort();
                Some(NavOutcome::Interrupted)
            }
        }
    }

    fn forward<D, S, C>(
        &mut self,
        vehicle: &mut Vehicle<D, S, C>,
        axis: Axis,
        sign: i64,
    ) -> Result<Option<NavOutcome>, RoverError>
    where
        D: Drivetrain,
        S: RangeSensor,
        C: Clock,
    {
        let from = self.position();
        let ahead = from.stepped(axis, sign).filter(|p| self.explorer.grid().contains(*p));
        let (cell, poll) = (self.timing.cell, self.timing.poll);
        match vehicle.timed(Maneuver::Forward, cell, poll, &self.switch, Mode::Automatic) {
            MotionOutcome::Completed => {
                let next = ahead.ok_or_else(|| {
                    RoverError::GridError(format!(
                        "step {:?}{} from ({}, {}) leaves the grid",
                        axis, sign, from.x, from.y
                    ))
                })?;
                self.localization.advance_to(next);
                Ok(None)
            }
            MotionOutcome::Obstructed => {
                self.localization.record_abort();
                if let Some(cell) = ahead {
                    self.explorer.mark_blocked(cell);
                }
                Ok(Some(NavOutcome::Obstructed(ahead)))
            }
            MotionOutcome::Interrupted => {
                self.localization.record_abort();
                Ok(Some(NavOutcome::Interrupted))
            }
        }
    }
}

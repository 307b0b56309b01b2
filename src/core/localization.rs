// core/localization.rs

// Dead-reckoned pose on the exploration grid. Position and heading are
// inferred only from commanded motion; nothing ever measures where the rover
// actually is.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Grid cell coordinate, `x` the column and `y` the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column index
    pub x: usize,
    /// Row index
    pub y: usize,
}

impl Position {
    /// Starting cell of every autonomous session
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Create a position
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Signed cell offset from `self` to `to`
    pub fn delta_to(&self, to: &Position) -> Vector2<i64> {
        Vector2::new(to.x as i64 - self.x as i64, to.y as i64 - self.y as i64)
    }

    /// Neighbouring cell one step along `axis` in direction `sign`, or `None`
    /// when that would leave the non-negative quadrant
    pub fn stepped(&self, axis: Axis, sign: i64) -> Option<Position> {
        let step = |value: usize| value.checked_add_signed(sign as isize);
        match axis {
            Axis::X => Some(Position::new(step(self.x)?, self.y)),
            Axis::Y => Some(Position::new(self.x, step(self.y)?)),
        }
    }
}

/// Grid axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Columns
    X,
    /// Rows
    Y,
}

/// Per-axis facing sign; each component is always +1 or -1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    x: i8,
    y: i8,
}

impl Heading {
    /// Both axes positive
    pub const fn new() -> Self {
        Heading { x: 1, y: 1 }
    }

    /// X-axis sign
    pub fn x(&self) -> i64 {
        self.x as i64
    }

    /// Y-axis sign
    pub fn y(&self) -> i64 {
        self.y as i64
    }

    pub(crate) fn flip_x(&mut self) {
        self.x = -self.x;
    }

    // A zero sign carries no direction and leaves the axis untouched.
    pub(crate) fn set_y_sign(&mut self, sign: i64) {
        match sign.signum() {
            1 => self.y = 1,
            -1 => self.y = -1,
            _ => {}
        }
    }
}

impl Default for Heading {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the dead-reckoned estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadReckoning {
    /// Assumed cell
    pub position: Position,
    /// Assumed facing
    pub heading: Heading,
    /// Forward steps credited to the position
    pub steps: u32,
    /// Timed maneuvers cut short by an obstacle or a mode change
    pub aborted: u32,
}

impl DeadReckoning {
    /// Always `false`: no sensor confirms any cell transition
    pub fn is_confirmed(&self) -> bool {
        false
    }

    /// The physical rover may have moved without the estimate following
    pub fn drift_suspected(&self) -> bool {
        self.aborted > 0
    }
}

/// Mutable pose bookkeeping owned by the autonomous navigator
#[derive(Debug, Clone)]
pub struct Localization {
    position: Position,
    heading: Heading,
    steps: u32,
    aborted: u32,
}

impl Localization {
    /// Pose at the origin facing (+1, +1)
    pub fn new() -> Self {
        Localization {
            position: Position::ORIGIN,
            heading: Heading::new(),
            steps: 0,
            aborted: 0,
        }
    }

    /// Current assumed cell
    pub fn position(&self) -> Position {
        self.position
    }

    /// Current assumed heading
    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub(crate) fn heading_mut(&mut self) -> &mut Heading {
        &mut self.heading
    }

    pub(crate) fn advance_to(&mut self, position: Position) {
        self.position = position;
        self.steps += 1;
    }

    pub(crate) fn record_abort(&mut self) {
        self.aborted += 1;
    }

    /// Current estimate, flagged as uncorrected
    pub fn estimate(&self) -> DeadReckoning {
        DeadReckoning {
            position: self.position,
            heading: self.heading,
            steps: self.steps,
            aborted: self.aborted,
        }
    }
}

impl Default for Localization {
    fn default() -> Self {
        Self::new()
    }
}

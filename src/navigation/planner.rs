// src/navigation/planner.rs
// Picks the next exploration target from the visitation grid.

use crate::core::{CellState, Grid, Position};

/// Result of one row-major scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// First unvisited cell at or after the scan start
    Next(Position),
    /// A blocked cell was reached first; exploration should end
    Blocked(Position),
    /// No unvisited cell at or after the scan start
    Exhausted,
}

impl Scan {
    /// Target cell, if the scan produced one
    pub fn target(&self) -> Option<Position> {
        match *self {
            Scan::Next(p) => Some(p),
            _ => None,
        }
    }
}

/// Grid owner for one autonomous session
#[derive(Debug, Clone)]
pub struct GridExplorer {
    grid: Grid,
}

impl GridExplorer {
    /// Explore `grid`
    pub fn new(grid: Grid) -> Self {
        GridExplorer { grid }
    }

    /// Read access to the grid
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Scan row-major from `from` (inclusive). Visited cells are skipped; the
    /// first blocked cell halts the scan.
    pub fn find_next(&self, from: Position) -> Scan {
        for p in self.grid.row_major_from(from) {
            match self.grid.state(p) {
                Some(CellState::Unvisited) => return Scan::Next(p),
                Some(CellState::Blocked) => return Scan::Blocked(p),
                Some(CellState::Visited) | None => {}
            }
        }
        Scan::Exhausted
    }

    /// Mark `p` visited; `false` if it already left `Unvisited`
    pub fn mark_visited(&mut self, p: Position) -> bool {
        self.grid.mark_visited(p)
    }

    /// Mark `p` blocked; `false` if it already left `Unvisited`
    pub fn mark_blocked(&mut self, p: Position) -> bool {
        self.grid.mark_blocked(p)
    }
}

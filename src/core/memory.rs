// core/memory.rs

// Visitation memory for one autonomous session: a rows x columns matrix of
// cell states. Cells only ever move out of `Unvisited`.

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::localization::Position;
use crate::RoverError;

/// Visitation state of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    /// Not yet reached
    Unvisited,
    /// An obstacle kept the rover out
    Blocked,
    /// Reached as a navigation target
    Visited,
}

/// Exploration grid, indexed `(row, column)` = `(y, x)`
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: DMatrix<CellState>,
}

impl Grid {
    /// All-unvisited grid; both dimensions must be non-zero
    pub fn new(rows: usize, columns: usize) -> Result<Self, RoverError> {
        if rows == 0 || columns == 0 {
            return Err(RoverError::GridError(format!(
                "cannot explore a {}x{} grid",
                rows, columns
            )));
        }
        Ok(Grid {
            cells: DMatrix::from_element(rows, columns, CellState::Unvisited),
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.cells.ncols()
    }

    /// Whether `p` lies inside the grid
    pub fn contains(&self, p: Position) -> bool {
        p.x < self.columns() && p.y < self.rows()
    }

    /// State of `p`, `None` outside the grid
    pub fn state(&self, p: Position) -> Option<CellState> {
        self.contains(p).then(|| self.cells[(p.y, p.x)])
    }

    /// Mark an unvisited cell visited; `false` if it was not unvisited
    pub fn mark_visited(&mut self, p: Position) -> bool {
        self.transition(p, CellState::Visited)
    }

    /// Mark an unvisited cell blocked; `false` if it was not unvisited
    pub fn mark_blocked(&mut self, p: Position) -> bool {
        self.transition(p, CellState::Blocked)
    }

    fn transition(&mut self, p: Position, to: CellState) -> bool {
        if self.state(p) != Some(CellState::Unvisited) {
            return false;
        }
        self.cells[(p.y, p.x)] = to;
        debug!("Cell ({}, {}) -> {:?}", p.x, p.y, to);
        true
    }

    /// Number of cells in `state`
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&cell| cell == state).count()
    }

    /// Cells in row-major order starting at `from`: the rest of `from`'s row,
    /// then every following row from column 0. Empty if `from` is outside.
    pub fn row_major_from(&self, from: Position) -> impl Iterator<Item = Position> + '_ {
        let columns = self.columns();
        let rows = if self.contains(from) { self.rows() } else { from.y };
        (from.y..rows).flat_map(move |y| {
            let first = if y == from.y { from.x } else { 0 };
            (first..columns).map(move |x| Position::new(x, y))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_covers_last_row_and_column() {
        let grid = Grid::new(2, 3).unwrap();
        let cells: Vec<_> = grid.row_major_from(Position::new(1, 0)).collect();
        assert_eq!(
            cells,
            vec![
                Position::new(1, 0),
                Position::new(2, 0),
                Position::new(0, 1),
                Position::new(1, 1),
                Position::new(2, 1),
            ]
        );
    }

    #[test]
    fn scan_from_outside_is_empty() {
        let grid = Grid::new(2, 3).unwrap();
        assert_eq!(grid.row_major_from(Position::new(3, 0)).count(), 0);
        assert_eq!(grid.row_major_from(Position::new(0, 2)).count(), 0);
    }

    #[test]
    fn cells_never_leave_visited() {
        let mut grid = Grid::new(1, 2).unwrap();
        assert!(grid.mark_visited(Position::new(1, 0)));
        assert!(!grid.mark_visited(Position::new(1, 0)));
        assert!(!grid.mark_blocked(Position::new(1, 0)));
        assert_eq!(grid.state(Position::new(1, 0)), Some(CellState::Visited));
        assert_eq!(grid.count(CellState::Unvisited), 1);
    }

    #[test]
    fn empty_grid_is_rejected() {
        assert!(Grid::new(0, 4).is_err());
    }
}

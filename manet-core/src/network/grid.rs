use crate::defaults::{DEFAULT_GRID_SPACING, DEFAULT_GRID_WIDTH};
use serde::Serialize;
use std::fmt;

/// Position on the plane, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Row-first grid placement starting at the origin.
///
/// ```
/// # use manet_core::network::{GridLayout, Position};
/// let grid = GridLayout::new(5, 500.0);
/// assert_eq!(grid.position(0), Position { x: 0.0, y: 0.0 });
/// assert_eq!(grid.position(6), Position { x: 500.0, y: 500.0 });
/// assert_eq!(grid.position(24), Position { x: 2_000.0, y: 2_000.0 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    width: usize,
    spacing: f64,
}

impl Position {
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl GridLayout {
    /// `width` of `0` is treated as `1`.
    pub fn new(width: usize, spacing: f64) -> Self {
        Self {
            width: width.max(1),
            spacing,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn position(&self, index: usize) -> Position {
        let column = index % self.width;
        let row = index / self.width;
        Position {
            x: column as f64 * self.spacing,
            y: row as f64 * self.spacing,
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_WIDTH, DEFAULT_GRID_SPACING)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

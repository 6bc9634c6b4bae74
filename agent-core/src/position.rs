//! Position / BlockPosition (C2).

use serde::{Deserialize, Serialize};
use std::ops::{Div, Sub};

/// A floating-point world position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Div<f64> for Position {
    type Output = Position;

    fn div(self, rhs: f64) -> Position {
        Position::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// An integer block position, floor-quantized from a `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPosition {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &BlockPosition) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// The six axis-adjacent neighbors, used by placement/stand analysis.
    pub fn axis_neighbors(&self) -> [BlockPosition; 6] {
        [
            BlockPosition::new(self.x + 1, self.y, self.z),
            BlockPosition::new(self.x - 1, self.y, self.z),
            BlockPosition::new(self.x, self.y + 1, self.z),
            BlockPosition::new(self.x, self.y - 1, self.z),
            BlockPosition::new(self.x, self.y, self.z + 1),
            BlockPosition::new(self.x, self.y, self.z - 1),
        ]
    }
}

impl From<Position> for BlockPosition {
    fn from(p: Position) -> Self {
        BlockPosition::new(p.x.floor() as i64, p.y.floor() as i64, p.z.floor() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_position_floors_each_component() {
        let p = Position::new(1.9, -0.1, 3.0);
        let bp = BlockPosition::from(p);
        assert_eq!(bp, BlockPosition::new(1, -1, 3));
    }

    #[test]
    fn axis_neighbors_count_is_six() {
        let bp = BlockPosition::new(0, 64, 0);
        assert_eq!(bp.axis_neighbors().len(), 6);
    }
}

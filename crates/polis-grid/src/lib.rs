//! Grid geometry for the Polis simulation.
//!
//! Provides the 2D grid position type used to key every tile map in the
//! engine, integer distance metrics, and the fractional position
//! interpolation used to locate in-flight shipments between two tiles.

use serde::{Deserialize, Serialize};

/// Fractional grid coordinate (Q32.32 fixed-point). Used for interpolated
/// shipment positions; tile positions themselves are always integer.
pub type Coord = fixed::types::I32F32;

// ---------------------------------------------------------------------------
// GridPos
// ---------------------------------------------------------------------------

/// A position on the 2D world grid.
///
/// Ordered lexicographically (x, then y) so `BTreeMap<GridPos, _>` iteration
/// is deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position. This is the grid distance
    /// used for transport routing and adjacency checks.
    pub fn distance(&self, other: &GridPos) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Chebyshev (chessboard) distance to another position.
    pub fn chebyshev_distance(&self, other: &GridPos) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }

    /// The four orthogonal neighbors.
    pub fn neighbors(&self) -> [GridPos; 4] {
        [
            GridPos::new(self.x, self.y - 1),
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x, self.y + 1),
            GridPos::new(self.x - 1, self.y),
        ]
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// A fractional point on the grid, produced by interpolating between two
/// integer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FracPos {
    pub x: Coord,
    pub y: Coord,
}

impl FracPos {
    /// Squared Euclidean distance to an integer grid position.
    pub fn squared_distance(&self, pos: &GridPos) -> Coord {
        let dx = self.x - Coord::from_num(pos.x);
        let dy = self.y - Coord::from_num(pos.y);
        dx * dx + dy * dy
    }
}

/// Linear interpolation between two grid positions. `t` is clamped to [0, 1];
/// `t = 0` yields `from`, `t = 1` yields `to`.
pub fn interpolate(from: GridPos, to: GridPos, t: Coord) -> FracPos {
    let t = t.clamp(Coord::ZERO, Coord::ONE);
    let fx = Coord::from_num(from.x);
    let fy = Coord::from_num(from.y);
    FracPos {
        x: fx + (Coord::from_num(to.x) - fx) * t,
        y: fy + (Coord::from_num(to.y) - fy) * t,
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Errors from grid coordinate conversion.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
}

/// A bounded rectangular grid, providing position <-> linear index
/// conversion for storage layers that want flat arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a position lies inside the grid bounds.
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Convert a position to a linear row-major index.
    pub fn index_of(&self, pos: GridPos) -> Result<usize, GridError> {
        if !self.contains(pos) {
            return Err(GridError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Convert a linear row-major index back to a position.
    pub fn pos_of(&self, index: usize) -> Option<GridPos> {
        if self.width == 0 || index >= (self.width as usize * self.height as usize) {
            return None;
        }
        Some(GridPos::new(
            (index % self.width as usize) as i32,
            (index / self.width as usize) as i32,
        ))
    }

    /// Iterate all positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        let w = self.width as i32;
        let h = self.height as i32;
        (0..h).flat_map(move |y| (0..w).map(move |x| GridPos::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_manhattan() {
        let a = GridPos::new(0, 0);
        let b = GridPos::new(3, -4);
        assert_eq!(a.distance(&b), 7);
        assert_eq!(b.distance(&a), 7);
    }

    #[test]
    fn chebyshev_takes_max_axis() {
        let a = GridPos::new(1, 1);
        let b = GridPos::new(4, 2);
        assert_eq!(a.chebyshev_distance(&b), 3);
    }

    #[test]
    fn neighbors_are_distance_one() {
        let p = GridPos::new(5, 5);
        for n in p.neighbors() {
            assert_eq!(p.distance(&n), 1);
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(GridPos::new(0, 9) < GridPos::new(1, 0));
        assert!(GridPos::new(1, 0) < GridPos::new(1, 1));
    }

    #[test]
    fn interpolate_endpoints() {
        let from = GridPos::new(0, 0);
        let to = GridPos::new(4, 2);
        let start = interpolate(from, to, Coord::ZERO);
        assert_eq!(start.x, Coord::ZERO);
        assert_eq!(start.y, Coord::ZERO);
        let end = interpolate(from, to, Coord::ONE);
        assert_eq!(end.x, Coord::from_num(4));
        assert_eq!(end.y, Coord::from_num(2));
    }

    #[test]
    fn interpolate_midpoint() {
        let mid = interpolate(GridPos::new(0, 0), GridPos::new(4, 2), Coord::from_num(0.5));
        assert_eq!(mid.x, Coord::from_num(2));
        assert_eq!(mid.y, Coord::from_num(1));
    }

    #[test]
    fn interpolate_clamps_t() {
        let p = interpolate(GridPos::new(0, 0), GridPos::new(2, 0), Coord::from_num(3));
        assert_eq!(p.x, Coord::from_num(2));
    }

    #[test]
    fn squared_distance_to_tile() {
        let p = interpolate(GridPos::new(0, 0), GridPos::new(2, 0), Coord::from_num(0.5));
        let d2 = p.squared_distance(&GridPos::new(1, 1));
        assert_eq!(d2, Coord::ONE);
    }

    #[test]
    fn grid_index_round_trip() {
        let grid = Grid::new(8, 6);
        for pos in grid.positions() {
            let idx = grid.index_of(pos).unwrap();
            assert_eq!(grid.pos_of(idx), Some(pos));
        }
    }

    #[test]
    fn grid_rejects_out_of_bounds() {
        let grid = Grid::new(4, 4);
        assert!(grid.index_of(GridPos::new(4, 0)).is_err());
        assert!(grid.index_of(GridPos::new(0, -1)).is_err());
        assert!(grid.pos_of(16).is_none());
    }
}

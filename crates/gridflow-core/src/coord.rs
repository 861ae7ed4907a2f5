//! Tile and coarse-cell coordinates.
//!
//! The world is an unbounded 2D grid of signed tile coordinates. Coarse
//! cells partition the grid into fixed-size squares; all coarse-cell math
//! uses Euclidean division so negative coordinates land in the right cell.

use serde::{Deserialize, Serialize};

/// Side length of a coarse cell, in tiles.
pub const CELL_SIZE: i32 = 16;

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// The four cardinal directions.
///
/// Declaration order is the tie-break precedence used when comparing
/// equal-cost approach tiles: West beats North beats East beats South.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    West,
    North,
    East,
    South,
}

/// An axis of movement. Junction tiles expose exactly one axis at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// West/East movement.
    Horizontal,
    /// North/South movement.
    Vertical,
}

impl Direction {
    /// All four directions in tie-break precedence order.
    pub const ALL: [Direction; 4] = [
        Direction::West,
        Direction::North,
        Direction::East,
        Direction::South,
    ];

    /// The opposing direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::West => Direction::East,
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
        }
    }

    /// The axis this direction moves along.
    pub fn axis(self) -> Axis {
        match self {
            Direction::West | Direction::East => Axis::Horizontal,
            Direction::North | Direction::South => Axis::Vertical,
        }
    }

    /// Unit offset for this direction. North is negative `y`.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::West => (-1, 0),
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
        }
    }

    /// Stable index 0..4, usable for bitmask construction.
    pub fn index(self) -> u8 {
        match self {
            Direction::West => 0,
            Direction::North => 1,
            Direction::East => 2,
            Direction::South => 3,
        }
    }
}

impl Axis {
    /// The two directions that move along this axis.
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::Horizontal => [Direction::West, Direction::East],
            Axis::Vertical => [Direction::North, Direction::South],
        }
    }

    /// Whether `dir` moves along this axis.
    pub fn contains(self, dir: Direction) -> bool {
        dir.axis() == self
    }
}

// ---------------------------------------------------------------------------
// Tile coordinates
// ---------------------------------------------------------------------------

/// A tile position on the world grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile one step in `dir`.
    pub fn step(self, dir: Direction) -> TileCoord {
        let (dx, dy) = dir.offset();
        TileCoord::new(self.x + dx, self.y + dy)
    }

    /// The four cardinal neighbors, in tie-break precedence order.
    pub fn neighbors(self) -> [TileCoord; 4] {
        [
            self.step(Direction::West),
            self.step(Direction::North),
            self.step(Direction::East),
            self.step(Direction::South),
        ]
    }

    /// The direction from `self` to an adjacent tile, if any.
    pub fn direction_to(self, other: TileCoord) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&dir| self.step(dir) == other)
    }

    /// Manhattan distance in tiles.
    pub fn manhattan(self, other: TileCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The coarse cell this tile belongs to.
    pub fn cell(self) -> CellCoord {
        CellCoord {
            x: self.x.div_euclid(CELL_SIZE),
            y: self.y.div_euclid(CELL_SIZE),
        }
    }

    /// True if `other` shares an edge with `self`.
    pub fn is_adjacent(self, other: TileCoord) -> bool {
        self.manhattan(other) == 1
    }
}

// ---------------------------------------------------------------------------
// Coarse-cell coordinates
// ---------------------------------------------------------------------------

/// A coarse cell position. One cell covers `CELL_SIZE * CELL_SIZE` tiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell one step in `dir`.
    pub fn step(self, dir: Direction) -> CellCoord {
        let (dx, dy) = dir.offset();
        CellCoord::new(self.x + dx, self.y + dy)
    }

    /// North-west corner tile of this cell (inclusive).
    pub fn min_tile(self) -> TileCoord {
        TileCoord::new(self.x * CELL_SIZE, self.y * CELL_SIZE)
    }

    /// South-east corner tile of this cell (inclusive).
    pub fn max_tile(self) -> TileCoord {
        TileCoord::new(
            self.x * CELL_SIZE + CELL_SIZE - 1,
            self.y * CELL_SIZE + CELL_SIZE - 1,
        )
    }

    /// True if `tile` falls inside this cell.
    pub fn contains(self, tile: TileCoord) -> bool {
        tile.cell() == self
    }

    /// The tiles lining this cell's `edge` boundary, in scan order.
    pub fn edge_tiles(self, edge: Direction) -> Vec<TileCoord> {
        let min = self.min_tile();
        let max = self.max_tile();
        match edge {
            Direction::West => (min.y..=max.y).map(|y| TileCoord::new(min.x, y)).collect(),
            Direction::East => (min.y..=max.y).map(|y| TileCoord::new(max.x, y)).collect(),
            Direction::North => (min.x..=max.x).map(|x| TileCoord::new(x, min.y)).collect(),
            Direction::South => (min.x..=max.x).map(|x| TileCoord::new(x, max.y)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Coarse-cell bounds
// ---------------------------------------------------------------------------

/// Inclusive rectangle of coarse cells covering a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBounds {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl CellBounds {
    /// Bounds covering a single cell.
    pub fn single(cell: CellCoord) -> Self {
        Self {
            min: cell,
            max: cell,
        }
    }

    /// Extend the bounds to include `cell`.
    pub fn extend(&mut self, cell: CellCoord) {
        self.min.x = self.min.x.min(cell.x);
        self.min.y = self.min.y.min(cell.y);
        self.max.x = self.max.x.max(cell.x);
        self.max.y = self.max.y.max(cell.y);
    }

    /// Union of two bounds.
    pub fn union(self, other: CellBounds) -> CellBounds {
        let mut out = self;
        out.extend(other.min);
        out.extend(other.max);
        out
    }

    /// Iterate every cell inside the bounds, row-major.
    pub fn iter(self) -> impl Iterator<Item = CellCoord> {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| CellCoord::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_and_opposite_round_trip() {
        let origin = TileCoord::new(3, -2);
        for dir in Direction::ALL {
            assert_eq!(origin.step(dir).step(dir.opposite()), origin);
        }
    }

    #[test]
    fn direction_precedence_order() {
        // West > North > East > South, relied on by the item-network tie-break.
        assert!(Direction::West < Direction::North);
        assert!(Direction::North < Direction::East);
        assert!(Direction::East < Direction::South);
    }

    #[test]
    fn manhattan_distance() {
        let a = TileCoord::new(0, 0);
        let b = TileCoord::new(3, -4);
        assert_eq!(a.manhattan(b), 7);
        assert_eq!(b.manhattan(a), 7);
        assert_eq!(a.manhattan(a), 0);
    }

    #[test]
    fn negative_coords_map_to_correct_cell() {
        assert_eq!(TileCoord::new(0, 0).cell(), CellCoord::new(0, 0));
        assert_eq!(TileCoord::new(15, 15).cell(), CellCoord::new(0, 0));
        assert_eq!(TileCoord::new(16, 0).cell(), CellCoord::new(1, 0));
        assert_eq!(TileCoord::new(-1, -1).cell(), CellCoord::new(-1, -1));
        assert_eq!(TileCoord::new(-16, 0).cell(), CellCoord::new(-1, 0));
        assert_eq!(TileCoord::new(-17, 0).cell(), CellCoord::new(-2, 0));
    }

    #[test]
    fn cell_tile_ranges() {
        let cell = CellCoord::new(-1, 2);
        assert_eq!(cell.min_tile(), TileCoord::new(-16, 32));
        assert_eq!(cell.max_tile(), TileCoord::new(-1, 47));
        assert!(cell.contains(TileCoord::new(-8, 40)));
        assert!(!cell.contains(TileCoord::new(0, 40)));
    }

    #[test]
    fn edge_tiles_line_the_boundary() {
        let cell = CellCoord::new(0, 0);
        let west = cell.edge_tiles(Direction::West);
        assert_eq!(west.len(), CELL_SIZE as usize);
        assert!(west.iter().all(|t| t.x == 0));

        let south = cell.edge_tiles(Direction::South);
        assert!(south.iter().all(|t| t.y == CELL_SIZE - 1));
    }

    #[test]
    fn direction_to_adjacent() {
        let a = TileCoord::new(5, 5);
        assert_eq!(a.direction_to(TileCoord::new(4, 5)), Some(Direction::West));
        assert_eq!(a.direction_to(TileCoord::new(5, 4)), Some(Direction::North));
        assert_eq!(a.direction_to(TileCoord::new(7, 5)), None);
    }

    #[test]
    fn bounds_extend_and_iterate() {
        let mut bounds = CellBounds::single(CellCoord::new(0, 0));
        bounds.extend(CellCoord::new(2, 1));
        bounds.extend(CellCoord::new(-1, 0));
        let cells: Vec<CellCoord> = bounds.iter().collect();
        assert_eq!(cells.len(), 4 * 2);
        assert!(cells.contains(&CellCoord::new(-1, 1)));
        assert!(cells.contains(&CellCoord::new(2, 0)));
    }

    #[test]
    fn junction_axis_directions() {
        assert!(Axis::Horizontal.contains(Direction::West));
        assert!(Axis::Horizontal.contains(Direction::East));
        assert!(!Axis::Horizontal.contains(Direction::North));
        assert_eq!(
            Axis::Vertical.directions(),
            [Direction::North, Direction::South]
        );
    }
}

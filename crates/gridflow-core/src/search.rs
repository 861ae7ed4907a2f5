//! Single-pair shortest-path search over the tile grid.
//!
//! Best-first search with an admissible Manhattan heuristic over the four
//! cardinal neighbors. The engine knows nothing about resource semantics:
//! node existence, per-tile cost, and edge validity come from a
//! [`SearchStrategy`] implementation. Networks instantiate [`GridStrategy`],
//! which enforces junction axes, one-way pump heads, color compatibility,
//! and optional cell-interior restriction.

use crate::coord::{Direction, TileCoord};
use crate::fixed::Fixed64;
use crate::tile::TileAccess;
use std::collections::{BTreeMap, BinaryHeap};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// The three hooks a search needs: cost generation, node existence, and
/// edge validity.
pub trait SearchStrategy {
    /// Whether `coord` is a searchable node.
    fn exists(&self, coord: TileCoord) -> bool;
    /// Travel time spent entering `coord`. Must be >= 1 tick for the
    /// Manhattan heuristic to stay admissible.
    fn enter_cost(&self, coord: TileCoord) -> Fixed64;
    /// Whether the transition `from -> to` along `dir` is allowed.
    fn edge_valid(&self, from: TileCoord, to: TileCoord, dir: Direction) -> bool;
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// An optimal path: every consecutive pair is grid-adjacent, endpoints
/// inclusive. `cost` is the summed travel time of every tile after the
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub path: Vec<TileCoord>,
    pub cost: Fixed64,
}

// ---------------------------------------------------------------------------
// Open-set entry
// ---------------------------------------------------------------------------

/// Heap entry ordered so the *lowest* heuristic score pops first; ties
/// resolve by cumulative cost, then coordinate, for determinism.
#[derive(Debug, PartialEq, Eq)]
struct OpenEntry {
    score: Fixed64,
    cost: Fixed64,
    coord: TileCoord,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn heuristic(from: TileCoord, goal: TileCoord) -> Fixed64 {
    Fixed64::from_num(from.manhattan(goal))
}

/// Find the optimal path from `start` to `goal`, or `None` if unreachable.
///
/// When a coordinate already in the open set is regenerated with a better
/// score the improved entry supersedes it; otherwise the cheaper entry
/// already present wins (stale entries are discarded on pop).
pub fn find_path<S: SearchStrategy>(
    strategy: &S,
    start: TileCoord,
    goal: TileCoord,
) -> Option<PathResult> {
    if !strategy.exists(start) || !strategy.exists(goal) {
        return None;
    }
    if start == goal {
        return Some(PathResult {
            path: vec![start],
            cost: Fixed64::ZERO,
        });
    }

    let mut open = BinaryHeap::new();
    let mut best_cost: BTreeMap<TileCoord, Fixed64> = BTreeMap::new();
    let mut came_from: BTreeMap<TileCoord, TileCoord> = BTreeMap::new();

    best_cost.insert(start, Fixed64::ZERO);
    open.push(OpenEntry {
        score: heuristic(start, goal),
        cost: Fixed64::ZERO,
        coord: start,
    });

    while let Some(entry) = open.pop() {
        // A better entry for this coordinate was already expanded.
        if best_cost
            .get(&entry.coord)
            .is_some_and(|&c| entry.cost > c)
        {
            continue;
        }

        if entry.coord == goal {
            return Some(PathResult {
                path: reconstruct(&came_from, goal),
                cost: entry.cost,
            });
        }

        for dir in Direction::ALL {
            let next = entry.coord.step(dir);
            if !strategy.exists(next) {
                continue;
            }
            if !strategy.edge_valid(entry.coord, next, dir) {
                continue;
            }
            let tentative = entry.cost + strategy.enter_cost(next);
            if best_cost.get(&next).is_none_or(|&c| tentative < c) {
                best_cost.insert(next, tentative);
                came_from.insert(next, entry.coord);
                open.push(OpenEntry {
                    score: tentative + heuristic(next, goal),
                    cost: tentative,
                    coord: next,
                });
            }
        }
    }

    None
}

fn reconstruct(came_from: &BTreeMap<TileCoord, TileCoord>, goal: TileCoord) -> Vec<TileCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

// ---------------------------------------------------------------------------
// Grid-backed strategy
// ---------------------------------------------------------------------------

/// Concrete strategy over one network's membership set.
///
/// `member` answers whether a coordinate belongs to the searching network;
/// tile metadata supplies travel time and the junction / pump / color rules.
/// `bounds` restricts the search to an inclusive tile rectangle (used for
/// coarse-cell interior searches). `entry` is the direction of the path's
/// first step as dictated by the threshold being entered through; it
/// overrides a junction's stored axis at `start` only.
pub struct GridStrategy<'a, G: TileAccess, F: Fn(TileCoord) -> bool> {
    pub grid: &'a G,
    pub member: F,
    pub bounds: Option<(TileCoord, TileCoord)>,
    pub start: TileCoord,
    pub entry: Option<Direction>,
}

impl<'a, G: TileAccess, F: Fn(TileCoord) -> bool> GridStrategy<'a, G, F> {
    fn in_bounds(&self, coord: TileCoord) -> bool {
        match self.bounds {
            Some((min, max)) => {
                coord.x >= min.x && coord.x <= max.x && coord.y >= min.y && coord.y <= max.y
            }
            None => true,
        }
    }
}

impl<'a, G: TileAccess, F: Fn(TileCoord) -> bool> SearchStrategy for GridStrategy<'a, G, F> {
    fn exists(&self, coord: TileCoord) -> bool {
        self.in_bounds(coord) && (self.member)(coord)
    }

    fn enter_cost(&self, coord: TileCoord) -> Fixed64 {
        let ticks = self
            .grid
            .tile(coord)
            .map(|t| t.travel_ticks.max(1))
            .unwrap_or(1);
        Fixed64::from_num(ticks)
    }

    fn edge_valid(&self, from: TileCoord, to: TileCoord, dir: Direction) -> bool {
        let (Some(a), Some(b)) = (self.grid.tile(from), self.grid.tile(to)) else {
            return false;
        };
        if !a.connections.contains(dir) || !b.connections.contains(dir.opposite()) {
            return false;
        }
        if let (Some(ca), Some(cb)) = (a.color, b.color)
            && ca != cb
        {
            return false;
        }
        // Junctions expose one axis at a time. The entry direction supplied
        // by the caller decides the axis for the path's first step.
        if let Some(axis) = a.junction {
            let active = if from == self.start {
                self.entry.map(Direction::axis).unwrap_or(axis)
            } else {
                axis
            };
            if !active.contains(dir) {
                return false;
            }
        }
        if let Some(axis) = b.junction
            && !axis.contains(dir)
        {
            return false;
        }
        // Pump heads are one-way: the tile may only be crossed in its flow
        // direction, entering or leaving.
        if let Some(p) = a.pump
            && dir != p.direction
        {
            return false;
        }
        if let Some(p) = b.pump
            && dir != p.direction
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Axis;
    use crate::tile::{ColorTag, PumpInfo, ResourceKind, TileInfo};
    use std::collections::BTreeMap;

    struct MapGrid {
        tiles: BTreeMap<TileCoord, TileInfo>,
    }

    impl TileAccess for MapGrid {
        fn tile(&self, coord: TileCoord) -> Option<TileInfo> {
            self.tiles.get(&coord).copied()
        }
    }

    fn grid_of(coords: &[(i32, i32)]) -> MapGrid {
        let tiles = coords
            .iter()
            .map(|&(x, y)| (TileCoord::new(x, y), TileInfo::transport(ResourceKind::Items)))
            .collect();
        MapGrid { tiles }
    }

    fn search(grid: &MapGrid, start: (i32, i32), goal: (i32, i32)) -> Option<PathResult> {
        let start = TileCoord::new(start.0, start.1);
        let strategy = GridStrategy {
            grid,
            member: |c| grid.tiles.contains_key(&c),
            bounds: None,
            start,
            entry: None,
        };
        find_path(&strategy, start, TileCoord::new(goal.0, goal.1))
    }

    #[test]
    fn straight_line() {
        let grid = grid_of(&[(0, 0), (1, 0), (2, 0)]);
        let result = search(&grid, (0, 0), (2, 0)).unwrap();
        assert_eq!(
            result.path,
            vec![TileCoord::new(0, 0), TileCoord::new(1, 0), TileCoord::new(2, 0)]
        );
        assert_eq!(result.cost, Fixed64::from_num(2));
    }

    #[test]
    fn detour_around_gap() {
        // 0,0 - 1,0   gap   3,0; connected via y=1 row.
        let grid = grid_of(&[
            (0, 0), (1, 0), (3, 0),
            (0, 1), (1, 1), (2, 1), (3, 1),
        ]);
        let result = search(&grid, (0, 0), (3, 0)).unwrap();
        assert_eq!(result.path.len(), 6);
        assert_eq!(result.cost, Fixed64::from_num(5));
        for pair in result.path.windows(2) {
            assert!(pair[0].is_adjacent(pair[1]));
        }
    }

    #[test]
    fn unreachable_returns_none() {
        let grid = grid_of(&[(0, 0), (5, 5)]);
        assert!(search(&grid, (0, 0), (5, 5)).is_none());
    }

    #[test]
    fn start_equals_goal() {
        let grid = grid_of(&[(0, 0)]);
        let result = search(&grid, (0, 0), (0, 0)).unwrap();
        assert_eq!(result.path, vec![TileCoord::new(0, 0)]);
        assert_eq!(result.cost, Fixed64::ZERO);
    }

    #[test]
    fn missing_endpoint_returns_none() {
        let grid = grid_of(&[(0, 0)]);
        assert!(search(&grid, (0, 0), (1, 0)).is_none());
        assert!(search(&grid, (1, 0), (0, 0)).is_none());
    }

    #[test]
    fn slow_tiles_are_avoided() {
        // Two routes from (0,0) to (2,0): straight through a 10-tick tile,
        // or a 4-step detour of 1-tick tiles. The detour costs less.
        let mut grid = grid_of(&[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        grid.tiles
            .get_mut(&TileCoord::new(1, 0))
            .unwrap()
            .travel_ticks = 10;
        let result = search(&grid, (0, 0), (2, 0)).unwrap();
        assert_eq!(result.cost, Fixed64::from_num(4));
        assert!(!result.path.contains(&TileCoord::new(1, 0)));
    }

    #[test]
    fn pump_blocks_reverse_traversal() {
        let mut grid = grid_of(&[(0, 0), (1, 0), (2, 0)]);
        grid.tiles.get_mut(&TileCoord::new(1, 0)).unwrap().pump = Some(PumpInfo {
            direction: Direction::East,
            stack_limit: 4,
            timer_max: 20,
        });
        // Forward (west-to-east) passes through the pump.
        assert!(search(&grid, (0, 0), (2, 0)).is_some());
        // Reverse is blocked.
        assert!(search(&grid, (2, 0), (0, 0)).is_none());
    }

    #[test]
    fn junction_blocks_cross_axis() {
        // Vertical bar crossing a horizontal junction at (1,1).
        let mut grid = grid_of(&[(0, 1), (1, 1), (2, 1), (1, 0), (1, 2)]);
        grid.tiles.get_mut(&TileCoord::new(1, 1)).unwrap().junction = Some(Axis::Horizontal);
        assert!(search(&grid, (0, 1), (2, 1)).is_some());
        assert!(search(&grid, (1, 0), (1, 2)).is_none());
    }

    #[test]
    fn entry_direction_overrides_junction_axis_at_start() {
        // Start ON a horizontal junction; goal is due south. The stored axis
        // forbids it, but an entry direction on the vertical axis re-aims the
        // junction for the first step.
        let mut grid = grid_of(&[(1, 1), (1, 2), (1, 3)]);
        grid.tiles.get_mut(&TileCoord::new(1, 1)).unwrap().junction = Some(Axis::Horizontal);

        let start = TileCoord::new(1, 1);
        let blocked = GridStrategy {
            grid: &grid,
            member: |c| grid.tiles.contains_key(&c),
            bounds: None,
            start,
            entry: None,
        };
        assert!(find_path(&blocked, start, TileCoord::new(1, 3)).is_none());

        let entering_south = GridStrategy {
            grid: &grid,
            member: |c| grid.tiles.contains_key(&c),
            bounds: None,
            start,
            entry: Some(Direction::South),
        };
        assert!(find_path(&entering_south, start, TileCoord::new(1, 3)).is_some());
    }

    #[test]
    fn color_tags_block_transition() {
        let mut grid = grid_of(&[(0, 0), (1, 0), (2, 0)]);
        grid.tiles.get_mut(&TileCoord::new(0, 0)).unwrap().color = Some(ColorTag(1));
        grid.tiles.get_mut(&TileCoord::new(1, 0)).unwrap().color = Some(ColorTag(2));
        assert!(search(&grid, (0, 0), (2, 0)).is_none());
    }

    #[test]
    fn bounds_restrict_search() {
        let grid = grid_of(&[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        let start = TileCoord::new(0, 0);
        // Restricted to row 0, the detour row is invisible.
        let strategy = GridStrategy {
            grid: &grid,
            member: |c| grid.tiles.contains_key(&c),
            bounds: Some((TileCoord::new(0, 0), TileCoord::new(2, 0))),
            start,
            entry: None,
        };
        let result = find_path(&strategy, start, TileCoord::new(2, 0)).unwrap();
        assert!(result.path.iter().all(|c| c.y == 0));
    }
}

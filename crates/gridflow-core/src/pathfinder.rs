//! Hierarchical point-to-point queries.
//!
//! Same-cell queries delegate to the fine search. Cross-cell queries run a
//! best-first search over *path builders*: partial paths that end on a
//! threshold and extend by appending cached intra-cell segments. The fine
//! search is only invoked inside the first cell (seeding) and the goal cell
//! (the final partial segment), which bounds per-query cost by the number
//! of thresholds touched rather than the size of the network.

use crate::coord::{Direction, TileCoord};
use crate::fixed::Fixed64;
use crate::network::NetworkGraph;
use crate::search::PathResult;
use crate::tile::TileAccess;
use std::collections::{BTreeSet, BinaryHeap};

// ---------------------------------------------------------------------------
// Path builder
// ---------------------------------------------------------------------------

/// A partial path under construction. `heading` is the boundary edge the
/// path's final threshold faces; `visited` holds every threshold already on
/// the path so a builder never cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Builder {
    cost: Fixed64,
    path: Vec<TileCoord>,
    visited: BTreeSet<TileCoord>,
    heading: Direction,
    complete: bool,
}

impl Ord for Builder {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap by cumulative cost; completed builders win ties so the
        // optimal candidate pops before equal-cost extensions.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| self.complete.cmp(&other.complete))
            .then_with(|| other.path.len().cmp(&self.path.len()))
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for Builder {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn enter_cost(grid: &impl TileAccess, coord: TileCoord) -> Fixed64 {
    let ticks = grid
        .tile(coord)
        .map(|t| t.travel_ticks.max(1))
        .unwrap_or(1);
    Fixed64::from_num(ticks)
}

fn cell_rect(cell: crate::coord::CellCoord) -> Option<(TileCoord, TileCoord)> {
    Some((cell.min_tile(), cell.max_tile()))
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Find the cheapest path from `start` to `end` within one network.
pub fn query(
    graph: &NetworkGraph,
    grid: &impl TileAccess,
    start: TileCoord,
    end: TileCoord,
) -> Option<PathResult> {
    if !graph.contains(start) || !graph.contains(end) {
        return None;
    }
    let end_cell = end.cell();
    if start.cell() == end_cell {
        return graph.search_within(grid, start, end, None, None);
    }

    // Seed one builder per threshold reachable from `start` inside its cell.
    let start_cell = start.cell();
    let mut queue = BinaryHeap::with_capacity(graph.cached_path_total() + 8);
    if let Some(cell) = graph.cells().get(&start_cell) {
        for threshold in cell.thresholds.values() {
            let Some(head) =
                graph.search_within(grid, start, threshold.coord, cell_rect(start_cell), None)
            else {
                continue;
            };
            queue.push(Builder {
                cost: head.cost,
                path: head.path,
                visited: BTreeSet::from([threshold.coord]),
                heading: threshold.edge,
                complete: false,
            });
        }
    }

    let mut best: Option<PathResult> = None;
    while let Some(builder) = queue.pop() {
        // Min-heap: once the cheapest remaining builder cannot beat the best
        // completed candidate, everything left is prunable.
        if let Some(b) = &best
            && builder.cost >= b.cost
        {
            break;
        }
        if builder.complete {
            best = Some(PathResult {
                path: builder.path,
                cost: builder.cost,
            });
            continue;
        }

        let last = *builder.path.last().expect("builders are never empty");
        let next = last.step(builder.heading);
        let crossing = enter_cost(grid, next);

        // The goal can sit directly across the boundary.
        if next == end {
            let mut path = builder.path.clone();
            path.push(next);
            queue.push(Builder {
                cost: builder.cost + crossing,
                path,
                visited: builder.visited.clone(),
                heading: builder.heading,
                complete: true,
            });
            continue;
        }

        let next_cell = next.cell();
        let threshold = graph
            .cells()
            .get(&next_cell)
            .and_then(|c| c.threshold(next));

        // Crossing into the goal cell: attempt the final partial segment
        // with one direct in-cell search.
        if next_cell == end_cell && graph.contains(next) {
            if let Some(tail) = graph.search_within(
                grid,
                next,
                end,
                cell_rect(next_cell),
                Some(builder.heading),
            ) {
                let mut path = builder.path.clone();
                path.extend_from_slice(&tail.path);
                queue.push(Builder {
                    cost: builder.cost + crossing + tail.cost,
                    path,
                    visited: builder.visited.clone(),
                    heading: builder.heading,
                    complete: true,
                });
            }
        }

        // Branch once per cached segment out of the threshold across the
        // edge. A builder that finds no threshold and no goal cell simply
        // drops out of the queue.
        let Some(threshold) = threshold else {
            continue;
        };
        for cached in &threshold.paths {
            if builder.visited.contains(&cached.target) {
                continue;
            }
            let mut path = builder.path.clone();
            path.extend_from_slice(&cached.path);
            let mut visited = builder.visited.clone();
            visited.insert(threshold.coord);
            visited.insert(cached.target);
            queue.push(Builder {
                cost: builder.cost + crossing + cached.cost,
                path,
                visited,
                heading: cached.target_edge,
                complete: cached.target == end,
            });
        }
    }

    best
}

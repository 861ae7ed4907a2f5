//! Coarse-cell path cache.
//!
//! The world is partitioned into `CELL_SIZE`-square cells. For each cell a
//! network tracks its *thresholds*: boundary tiles with a same-network
//! neighbor across the boundary. Each threshold caches the optimal
//! intra-cell path to every other threshold of its cell, so long-distance
//! queries stitch cached segments instead of re-searching the whole grid.
//!
//! Cells are recomputed eagerly by the owning network whenever a node in the
//! cell or a directly neighboring cell changes; see
//! `NetworkGraph::refresh_cells_around`.

use crate::coord::{Direction, TileCoord};
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A precomputed intra-cell path from one threshold to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPath {
    /// The destination threshold.
    pub target: TileCoord,
    /// The boundary edge the destination threshold sits on. Stored here so
    /// the cross-cell query can keep walking without a second lookup.
    pub target_edge: Direction,
    /// Full tile sequence, source threshold inclusive.
    pub path: Vec<TileCoord>,
    /// Cumulative travel time of `path[1..]`.
    pub cost: Fixed64,
}

/// A cell-boundary tile that connects to the same network across the
/// boundary. Never contains a path that routes back through itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub coord: TileCoord,
    /// The boundary edge this threshold sits on (the direction it faces).
    pub edge: Direction,
    /// Cached paths to every other threshold reachable within the cell.
    pub paths: Vec<CachedPath>,
}

/// One coarse cell's threshold set, keyed by threshold coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarseCell {
    pub thresholds: BTreeMap<TileCoord, Threshold>,
}

impl CoarseCell {
    /// Total cached paths in this cell. Feeds the global counter that
    /// presizes the cross-cell query queue.
    pub fn path_count(&self) -> usize {
        self.thresholds.values().map(|t| t.paths.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn threshold(&self, coord: TileCoord) -> Option<&Threshold> {
        self.thresholds.get(&coord)
    }
}

//! Network graph: one connected component of same-kind tiles.
//!
//! A `NetworkGraph` owns the node map, junction set, and coarse-cell path
//! cache for a single network instance. It offers three maintenance paths:
//!
//! - [`NetworkGraph::recalculate`] -- authoritative flood-fill rebuild from a
//!   seed tile, used after structural load and after a split.
//! - [`NetworkGraph::add_entry`] / [`NetworkGraph::remove_entry`] --
//!   incremental updates touching only the changed tile, its neighbors, and
//!   the coarse cells whose boundaries may have moved.
//! - [`NetworkGraph::merge`] -- absorb another component when a new tile
//!   bridges two instances.
//!
//! The graph never decides *which* instance a tile belongs to; that is the
//! registry's job. It also never mutates tile metadata: all structure is
//! read through [`TileAccess`].

use crate::coarse::{CachedPath, CoarseCell, Threshold};
use crate::coord::{Axis, CellBounds, CellCoord, Direction, TileCoord};
use crate::search::{self, GridStrategy, PathResult};
use crate::tile::{ResourceKind, TileAccess, links};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Identifies a network instance. Unique within one resource kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NetworkId(pub u32);

/// Errors from network queries.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The instance was disposed; queries against it are invalid.
    #[error("network instance has been disposed")]
    Disposed,
}

/// One tile of a network and its same-network adjacency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub coord: TileCoord,
    /// Directly adjacent coordinates belonging to the same network.
    pub neighbors: Vec<TileCoord>,
}

/// Result of removing a tile from a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The remaining nodes are still one component.
    Intact,
    /// The network has no nodes left.
    Emptied,
    /// The removal disconnected the graph. Fragments are sorted largest
    /// first; the registry reseeds each one.
    Split(Vec<Vec<TileCoord>>),
}

// ---------------------------------------------------------------------------
// NetworkGraph
// ---------------------------------------------------------------------------

/// The connectivity state of one network instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkGraph {
    id: NetworkId,
    kind: ResourceKind,
    nodes: BTreeMap<TileCoord, Node>,
    /// Tiles whose adjacency depends on a stored axis.
    junctions: BTreeMap<TileCoord, Axis>,
    /// Coarse cells with at least one threshold.
    cells: BTreeMap<CellCoord, CoarseCell>,
    /// Bounding box of the network in coarse-cell units. Conservative: it
    /// only shrinks on `recalculate`.
    cell_bounds: Option<CellBounds>,
    /// Total cached coarse paths across all cells. Presizes the cross-cell
    /// query queue.
    cached_paths: usize,
    disposed: bool,
}

impl NetworkGraph {
    pub fn new(id: NetworkId, kind: ResourceKind) -> Self {
        Self {
            id,
            kind,
            nodes: BTreeMap::new(),
            junctions: BTreeMap::new(),
            cells: BTreeMap::new(),
            cell_bounds: None,
            cached_paths: 0,
            disposed: false,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.nodes.contains_key(&coord)
    }

    pub fn node(&self, coord: TileCoord) -> Option<&Node> {
        self.nodes.get(&coord)
    }

    /// Iterate every member coordinate in deterministic order.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.nodes.keys().copied()
    }

    pub fn junctions(&self) -> &BTreeMap<TileCoord, Axis> {
        &self.junctions
    }

    pub fn cells(&self) -> &BTreeMap<CellCoord, CoarseCell> {
        &self.cells
    }

    pub fn cell_bounds(&self) -> Option<CellBounds> {
        self.cell_bounds
    }

    /// Total cached coarse paths across all cells.
    pub fn cached_path_total(&self) -> usize {
        self.cached_paths
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Mark the instance dead. All subsequent queries fail with
    /// [`NetworkError::Disposed`].
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.nodes.clear();
        self.junctions.clear();
        self.cells.clear();
        self.cell_bounds = None;
        self.cached_paths = 0;
    }

    fn check_live(&self) -> Result<(), NetworkError> {
        if self.disposed {
            Err(NetworkError::Disposed)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Full rebuild
    // -----------------------------------------------------------------------

    /// Authoritative rebuild: flood fill from `seed`, then recompute every
    /// coarse cell inside the resulting bounds.
    pub fn recalculate(&mut self, seed: TileCoord, grid: &impl TileAccess) {
        self.nodes.clear();
        self.junctions.clear();
        self.cells.clear();
        self.cell_bounds = None;
        self.cached_paths = 0;

        let Some(seed_info) = grid.tile(seed) else {
            return;
        };
        if !seed_info.kinds.contains(self.kind) {
            return;
        }

        let mut queue = VecDeque::new();
        queue.push_back(seed);
        self.insert_node(seed, seed_info.junction);
        let mut bounds = CellBounds::single(seed.cell());

        while let Some(coord) = queue.pop_front() {
            let info = grid
                .tile(coord)
                .expect("flood fill only enqueues existing tiles");
            for dir in Direction::ALL {
                let next = coord.step(dir);
                let Some(next_info) = grid.tile(next) else {
                    continue;
                };
                if !links(&info, &next_info, dir, self.kind) {
                    continue;
                }
                let node = self.nodes.get_mut(&coord).expect("current node exists");
                if !node.neighbors.contains(&next) {
                    node.neighbors.push(next);
                }
                if !self.nodes.contains_key(&next) {
                    self.insert_node(next, next_info.junction);
                    bounds.extend(next.cell());
                    queue.push_back(next);
                }
            }
        }

        self.cell_bounds = Some(bounds);
        for cell in bounds.iter() {
            self.recompute_cell(cell, grid);
        }
    }

    fn insert_node(&mut self, coord: TileCoord, junction: Option<Axis>) {
        self.nodes.insert(
            coord,
            Node {
                coord,
                neighbors: Vec::new(),
            },
        );
        if let Some(axis) = junction {
            self.junctions.insert(coord, axis);
        }
    }

    // -----------------------------------------------------------------------
    // Incremental maintenance
    // -----------------------------------------------------------------------

    /// Add one tile: patch adjacency on the tile and its neighbors, then
    /// refresh the coarse cells whose boundaries may have changed.
    pub fn add_entry(
        &mut self,
        coord: TileCoord,
        grid: &impl TileAccess,
    ) -> Result<(), NetworkError> {
        self.check_live()?;
        if self.nodes.contains_key(&coord) {
            return Ok(());
        }
        let Some(info) = grid.tile(coord) else {
            return Ok(());
        };
        if !info.kinds.contains(self.kind) {
            return Ok(());
        }

        let neighbors = self.linked_neighbors(coord, &info, grid);
        for &n in &neighbors {
            let node = self.nodes.get_mut(&n).expect("linked neighbor exists");
            if !node.neighbors.contains(&coord) {
                node.neighbors.push(coord);
            }
        }
        self.nodes.insert(coord, Node { coord, neighbors });
        if let Some(axis) = info.junction {
            self.junctions.insert(coord, axis);
        }

        match &mut self.cell_bounds {
            Some(bounds) => bounds.extend(coord.cell()),
            None => self.cell_bounds = Some(CellBounds::single(coord.cell())),
        }
        self.refresh_cells_around(coord, grid);
        Ok(())
    }

    /// Remove one tile and report whether the component survived intact,
    /// emptied, or split into fragments.
    pub fn remove_entry(
        &mut self,
        coord: TileCoord,
        grid: &impl TileAccess,
    ) -> Result<RemovalOutcome, NetworkError> {
        self.check_live()?;
        let Some(node) = self.nodes.remove(&coord) else {
            return Ok(RemovalOutcome::Intact);
        };
        self.junctions.remove(&coord);
        for n in &node.neighbors {
            if let Some(other) = self.nodes.get_mut(n) {
                other.neighbors.retain(|&c| c != coord);
            }
        }
        self.refresh_cells_around(coord, grid);

        if self.nodes.is_empty() {
            return Ok(RemovalOutcome::Emptied);
        }
        let former: Vec<TileCoord> = node
            .neighbors
            .iter()
            .copied()
            .filter(|n| self.nodes.contains_key(n))
            .collect();
        if former.len() <= 1 {
            return Ok(RemovalOutcome::Intact);
        }

        // The removed tile had several live neighbors; check whether they
        // are still mutually reachable.
        let reached = self.reachable_from(former[0]);
        if former.iter().all(|n| reached.contains(n)) {
            return Ok(RemovalOutcome::Intact);
        }
        Ok(RemovalOutcome::Split(self.partition()))
    }

    /// Absorb another component of the same kind. Adjacency of absorbed
    /// nodes is re-derived from the grid, and every coarse cell the absorbed
    /// component touches is recomputed.
    pub fn merge(&mut self, other: NetworkGraph, grid: &impl TileAccess) {
        debug_assert_eq!(self.kind, other.kind);
        let absorbed: Vec<TileCoord> = other.nodes.keys().copied().collect();

        self.nodes.extend(other.nodes);
        self.junctions.extend(other.junctions);
        match (self.cell_bounds, other.cell_bounds) {
            (Some(a), Some(b)) => self.cell_bounds = Some(a.union(b)),
            (None, Some(b)) => self.cell_bounds = Some(b),
            _ => {}
        }

        let mut touched: BTreeSet<CellCoord> = BTreeSet::new();
        for &coord in &absorbed {
            let Some(info) = grid.tile(coord) else {
                continue;
            };
            let neighbors = self.linked_neighbors(coord, &info, grid);
            for &n in &neighbors {
                let node = self.nodes.get_mut(&n).expect("linked neighbor exists");
                if !node.neighbors.contains(&coord) {
                    node.neighbors.push(coord);
                }
            }
            self.nodes
                .get_mut(&coord)
                .expect("absorbed node exists")
                .neighbors = neighbors;

            let cell = coord.cell();
            touched.insert(cell);
            for dir in Direction::ALL {
                touched.insert(cell.step(dir));
            }
        }
        for cell in touched {
            self.recompute_cell(cell, grid);
        }
    }

    /// Neighbors of `coord` that are members and link to it under the
    /// adjacency predicate.
    fn linked_neighbors(
        &self,
        coord: TileCoord,
        info: &crate::tile::TileInfo,
        grid: &impl TileAccess,
    ) -> Vec<TileCoord> {
        let mut out = Vec::new();
        for dir in Direction::ALL {
            let next = coord.step(dir);
            if !self.nodes.contains_key(&next) {
                continue;
            }
            if let Some(next_info) = grid.tile(next)
                && links(info, &next_info, dir, self.kind)
            {
                out.push(next);
            }
        }
        out
    }

    fn reachable_from(&self, start: TileCoord) -> BTreeSet<TileCoord> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        if self.nodes.contains_key(&start) {
            seen.insert(start);
            queue.push_back(start);
        }
        while let Some(coord) = queue.pop_front() {
            let node = &self.nodes[&coord];
            for &n in &node.neighbors {
                if self.nodes.contains_key(&n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    /// Partition all remaining nodes into connected fragments, largest
    /// first (ties broken by smallest member coordinate).
    fn partition(&self) -> Vec<Vec<TileCoord>> {
        let mut unvisited: BTreeSet<TileCoord> = self.nodes.keys().copied().collect();
        let mut fragments = Vec::new();
        while let Some(&seed) = unvisited.iter().next() {
            let component = self.reachable_from(seed);
            for c in &component {
                unvisited.remove(c);
            }
            fragments.push(component.into_iter().collect::<Vec<_>>());
        }
        fragments.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        fragments
    }

    // -----------------------------------------------------------------------
    // Coarse-cell maintenance
    // -----------------------------------------------------------------------

    /// Recompute the cell containing `coord` plus all four neighboring
    /// cells, whose boundaries may have changed.
    pub fn refresh_cells_around(&mut self, coord: TileCoord, grid: &impl TileAccess) {
        let cell = coord.cell();
        self.recompute_cell(cell, grid);
        for dir in Direction::ALL {
            self.recompute_cell(cell.step(dir), grid);
        }
    }

    /// Rebuild one cell's threshold set and cached intra-cell paths, and
    /// roll the global cached-path counter forward by the difference.
    pub fn recompute_cell(&mut self, cell: CellCoord, grid: &impl TileAccess) {
        let old = self.cells.get(&cell).map(|c| c.path_count()).unwrap_or(0);

        // Thresholds: boundary tiles linked to a member across the boundary.
        // A corner tile qualifying on two edges keeps the first edge found.
        let mut found: Vec<(TileCoord, Direction)> = Vec::new();
        for edge in Direction::ALL {
            for tile in cell.edge_tiles(edge) {
                if found.iter().any(|&(t, _)| t == tile) {
                    continue;
                }
                let across = tile.step(edge);
                let linked = self
                    .nodes
                    .get(&tile)
                    .is_some_and(|n| n.neighbors.contains(&across));
                if linked {
                    found.push((tile, edge));
                }
            }
        }

        let bounds = Some((cell.min_tile(), cell.max_tile()));
        let mut rebuilt = CoarseCell::default();
        for &(a, a_edge) in &found {
            let mut paths = Vec::new();
            for &(b, b_edge) in &found {
                if b == a {
                    continue;
                }
                // The initial direction is the one the threshold faces, so a
                // junction on the threshold resolves to the crossing axis.
                if let Some(result) = self.search_within(grid, a, b, bounds, Some(a_edge)) {
                    paths.push(CachedPath {
                        target: b,
                        target_edge: b_edge,
                        path: result.path,
                        cost: result.cost,
                    });
                }
            }
            rebuilt.thresholds.insert(
                a,
                Threshold {
                    coord: a,
                    edge: a_edge,
                    paths,
                },
            );
        }

        let added = rebuilt.path_count();
        if rebuilt.is_empty() {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, rebuilt);
        }
        self.cached_paths = self.cached_paths - old + added;
    }

    // -----------------------------------------------------------------------
    // Search plumbing
    // -----------------------------------------------------------------------

    /// Run the fine search over this network's membership, optionally
    /// restricted to a tile rectangle and with an entry direction for the
    /// first step.
    pub(crate) fn search_within(
        &self,
        grid: &impl TileAccess,
        start: TileCoord,
        end: TileCoord,
        bounds: Option<(TileCoord, TileCoord)>,
        entry: Option<Direction>,
    ) -> Option<PathResult> {
        let strategy = GridStrategy {
            grid,
            member: |c| self.nodes.contains_key(&c),
            bounds,
            start,
            entry,
        };
        search::find_path(&strategy, start, end)
    }

    /// Point-to-point query through the hierarchical pathfinder.
    pub fn find_path(
        &self,
        grid: &impl TileAccess,
        start: TileCoord,
        end: TileCoord,
    ) -> Result<Option<PathResult>, NetworkError> {
        self.check_live()?;
        Ok(crate::pathfinder::query(self, grid, start, end))
    }

    // -----------------------------------------------------------------------
    // Persistence plumbing
    // -----------------------------------------------------------------------

    /// Node + adjacency dump for networks persisted in full.
    pub fn node_dump(&self) -> Vec<(TileCoord, Vec<TileCoord>)> {
        self.nodes
            .values()
            .map(|n| (n.coord, n.neighbors.clone()))
            .collect()
    }

    /// Rebuild a graph from a node + adjacency dump. The coarse cache is
    /// rederived from the dump; tile metadata is still read from `grid` for
    /// travel times and traversal rules.
    pub fn from_node_dump(
        id: NetworkId,
        kind: ResourceKind,
        dump: Vec<(TileCoord, Vec<TileCoord>)>,
        junctions: Vec<(TileCoord, Axis)>,
        grid: &impl TileAccess,
    ) -> Self {
        let mut graph = NetworkGraph::new(id, kind);
        let mut bounds: Option<CellBounds> = None;
        for (coord, neighbors) in dump {
            match &mut bounds {
                Some(b) => b.extend(coord.cell()),
                None => bounds = Some(CellBounds::single(coord.cell())),
            }
            graph.nodes.insert(coord, Node { coord, neighbors });
        }
        graph.junctions = junctions.into_iter().collect();
        graph.cell_bounds = bounds;
        if let Some(bounds) = bounds {
            for cell in bounds.iter() {
                graph.recompute_cell(cell, grid);
            }
        }
        graph
    }
}

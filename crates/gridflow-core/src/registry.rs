//! Network registry: owns every live network instance of one resource kind.
//!
//! The registry is an explicit object owned by the simulation context --
//! there is no process-wide registry state. It maintains the invariant that
//! every coordinate belongs to at most one instance per kind, and it drives
//! the create / join / merge / split protocol when tiles are placed and
//! removed. Kind-specific behavior hangs off the [`ResourceNetwork`] policy
//! trait instead of a subtype chain.

use crate::coord::{Direction, TileCoord};
use crate::machine::MachineStore;
use crate::network::{NetworkGraph, NetworkId, RemovalOutcome};
use crate::tile::{ResourceKind, TileAccess, links};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Resource policy trait
// ---------------------------------------------------------------------------

/// Kind-specific hooks layered over the shared [`NetworkGraph`].
///
/// Implementations own their graph by composition and add whatever payload
/// the resource needs (adjacent storages, pump timers, shared tanks). The
/// registry calls the hooks at well-defined points:
///
/// - `entry_added` / `entry_removed` -- incremental adjacency discovery; scan
///   only the four neighbors of the changed tile.
/// - `rebuilt` -- the graph was recalculated from scratch (load, split);
///   rebuild kind-specific collections wholesale.
/// - `absorb` -- merge another instance's graph and payload into this one.
/// - `rebalance_split` -- optionally move payload to a fragment that was just
///   split off.
pub trait ResourceNetwork: Sized {
    const KIND: ResourceKind;

    fn create(id: NetworkId) -> Self;
    fn graph(&self) -> &NetworkGraph;
    fn graph_mut(&mut self) -> &mut NetworkGraph;

    /// Merge `other` into `self`: graph first, then payload.
    fn absorb(&mut self, other: Self, grid: &impl TileAccess, machines: &MachineStore);

    fn entry_added(&mut self, coord: TileCoord, grid: &impl TileAccess, machines: &MachineStore);
    fn entry_removed(&mut self, coord: TileCoord, grid: &impl TileAccess, machines: &MachineStore);

    /// Called after any full recalculate so kind-specific collections can be
    /// rebuilt from the new node set.
    fn rebuilt(&mut self, grid: &impl TileAccess, machines: &MachineStore);

    /// Move a share of payload to a fragment split off this network.
    fn rebalance_split(&mut self, spawned: &mut Self, grid: &impl TileAccess) {
        let _ = (spawned, grid);
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Outcome of removing a tile through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    /// The instance that survived the removal, if any.
    pub kept: Option<NetworkId>,
    /// Instances newly created for split-off fragments.
    pub spawned: Vec<NetworkId>,
}

/// All live instances of one resource kind, plus the coordinate index.
#[derive(Debug)]
pub struct NetworkRegistry<N> {
    networks: BTreeMap<NetworkId, N>,
    by_coord: BTreeMap<TileCoord, NetworkId>,
    next_id: u32,
}

impl<N> Default for NetworkRegistry<N> {
    fn default() -> Self {
        Self {
            networks: BTreeMap::new(),
            by_coord: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<N: ResourceNetwork> NetworkRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> NetworkId {
        let id = NetworkId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn network(&self, id: NetworkId) -> Option<&N> {
        self.networks.get(&id)
    }

    pub fn network_mut(&mut self, id: NetworkId) -> Option<&mut N> {
        self.networks.get_mut(&id)
    }

    /// The instance id owning `coord`, if any.
    pub fn id_at(&self, coord: TileCoord) -> Option<NetworkId> {
        self.by_coord.get(&coord).copied()
    }

    pub fn network_at(&self, coord: TileCoord) -> Option<&N> {
        self.networks.get(self.by_coord.get(&coord)?)
    }

    pub fn network_at_mut(&mut self, coord: TileCoord) -> Option<&mut N> {
        self.networks.get_mut(self.by_coord.get(&coord)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, &N)> {
        self.networks.iter().map(|(&id, n)| (id, n))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NetworkId, &mut N)> {
        self.networks.iter_mut().map(|(&id, n)| (id, n))
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// A tile of this kind was placed at `coord`: create a new instance,
    /// join the adjacent one, or merge several (lowest id survives).
    /// Returns `None` when the tile does not carry this kind's bit.
    pub fn place(
        &mut self,
        coord: TileCoord,
        grid: &impl TileAccess,
        machines: &MachineStore,
    ) -> Option<NetworkId> {
        let info = grid.tile(coord)?;
        if !info.kinds.contains(N::KIND) {
            return None;
        }

        // Networks this tile would link to.
        let mut adjacent: Vec<NetworkId> = Vec::new();
        for dir in Direction::ALL {
            let neighbor = coord.step(dir);
            if let Some(&id) = self.by_coord.get(&neighbor)
                && let Some(neighbor_info) = grid.tile(neighbor)
                && links(&info, &neighbor_info, dir, N::KIND)
                && !adjacent.contains(&id)
            {
                adjacent.push(id);
            }
        }

        let id = match adjacent.as_slice() {
            [] => {
                let id = self.alloc_id();
                let mut net = N::create(id);
                net.graph_mut().recalculate(coord, grid);
                net.rebuilt(grid, machines);
                self.networks.insert(id, net);
                id
            }
            rest => {
                let survivor = *rest.iter().min().expect("non-empty");
                for &other_id in rest {
                    if other_id == survivor {
                        continue;
                    }
                    let other = self
                        .networks
                        .remove(&other_id)
                        .expect("adjacent network exists");
                    let moved: Vec<TileCoord> = other.graph().coords().collect();
                    let net = self
                        .networks
                        .get_mut(&survivor)
                        .expect("survivor network exists");
                    net.absorb(other, grid, machines);
                    for c in moved {
                        self.by_coord.insert(c, survivor);
                    }
                }
                let net = self
                    .networks
                    .get_mut(&survivor)
                    .expect("survivor network exists");
                net.graph_mut()
                    .add_entry(coord, grid)
                    .expect("registry never holds disposed networks");
                net.entry_added(coord, grid, machines);
                survivor
            }
        };

        self.by_coord.insert(coord, id);
        Some(id)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// A tile was removed from `coord`. Handles the disconnect protocol:
    /// the largest remaining fragment keeps the instance (recalculated from
    /// one of its tiles); every other fragment is reseeded as a fresh
    /// instance so no fragment is orphaned.
    pub fn remove(
        &mut self,
        coord: TileCoord,
        grid: &impl TileAccess,
        machines: &MachineStore,
    ) -> Option<RemoveReport> {
        let id = self.by_coord.remove(&coord)?;
        let outcome = {
            let net = self
                .networks
                .get_mut(&id)
                .expect("indexed network exists");
            net.entry_removed(coord, grid, machines);
            net.graph_mut()
                .remove_entry(coord, grid)
                .expect("registry never holds disposed networks")
        };

        match outcome {
            RemovalOutcome::Intact => Some(RemoveReport {
                kept: Some(id),
                spawned: Vec::new(),
            }),
            RemovalOutcome::Emptied => {
                let mut net = self.networks.remove(&id).expect("indexed network exists");
                net.graph_mut().dispose();
                Some(RemoveReport {
                    kept: None,
                    spawned: Vec::new(),
                })
            }
            RemovalOutcome::Split(fragments) => {
                // Largest fragment keeps the id.
                let kept_seed = fragments[0][0];
                {
                    let net = self.networks.get_mut(&id).expect("indexed network exists");
                    net.graph_mut().recalculate(kept_seed, grid);
                    net.rebuilt(grid, machines);
                }

                let mut spawned = Vec::new();
                for fragment in &fragments[1..] {
                    let new_id = self.alloc_id();
                    let mut fresh = N::create(new_id);
                    fresh.graph_mut().recalculate(fragment[0], grid);
                    fresh.rebuilt(grid, machines);
                    let kept = self.networks.get_mut(&id).expect("indexed network exists");
                    kept.rebalance_split(&mut fresh, grid);
                    for &c in fragment {
                        self.by_coord.insert(c, new_id);
                    }
                    self.networks.insert(new_id, fresh);
                    spawned.push(new_id);
                }
                Some(RemoveReport {
                    kept: Some(id),
                    spawned,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence plumbing
    // -----------------------------------------------------------------------

    /// Insert an instance restored from a save, reindexing its coordinates
    /// and keeping the id allocator ahead of it.
    pub fn insert_loaded(&mut self, net: N) {
        let id = net.graph().id();
        for coord in net.graph().coords() {
            self.by_coord.insert(coord, id);
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.networks.insert(id, net);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Direction;
    use crate::test_utils::GridFixture;

    fn c(x: i32, y: i32) -> TileCoord {
        TileCoord::new(x, y)
    }

    /// Minimal policy impl: just the graph, no payload.
    #[derive(Debug)]
    struct BareNetwork {
        graph: NetworkGraph,
    }

    impl ResourceNetwork for BareNetwork {
        const KIND: ResourceKind = ResourceKind::Items;

        fn create(id: NetworkId) -> Self {
            Self {
                graph: NetworkGraph::new(id, Self::KIND),
            }
        }
        fn graph(&self) -> &NetworkGraph {
            &self.graph
        }
        fn graph_mut(&mut self) -> &mut NetworkGraph {
            &mut self.graph
        }
        fn absorb(&mut self, other: Self, grid: &impl TileAccess, _machines: &MachineStore) {
            self.graph.merge(other.graph, grid);
        }
        fn entry_added(&mut self, _: TileCoord, _: &impl TileAccess, _: &MachineStore) {}
        fn entry_removed(&mut self, _: TileCoord, _: &impl TileAccess, _: &MachineStore) {}
        fn rebuilt(&mut self, _: &impl TileAccess, _: &MachineStore) {}
    }

    fn place_line(
        registry: &mut NetworkRegistry<BareNetwork>,
        grid: &mut GridFixture,
        machines: &MachineStore,
        from: TileCoord,
        dir: Direction,
        len: i32,
    ) {
        let mut coord = from;
        for _ in 0..len {
            grid.transport(ResourceKind::Items, coord);
            registry.place(coord, grid, machines).unwrap();
            coord = coord.step(dir);
        }
    }

    #[test]
    fn placing_isolated_tiles_creates_instances() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();

        grid.transport(ResourceKind::Items, c(0, 0));
        grid.transport(ResourceKind::Items, c(5, 5));
        let a = registry.place(c(0, 0), &grid, &machines).unwrap();
        let b = registry.place(c(5, 5), &grid, &machines).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.id_at(c(0, 0)), Some(a));
        assert_eq!(registry.id_at(c(5, 5)), Some(b));
    }

    #[test]
    fn placing_adjacent_tile_joins_instance() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();
        place_line(&mut registry, &mut grid, &machines, c(0, 0), Direction::East, 3);

        assert_eq!(registry.len(), 1);
        let net = registry.network_at(c(2, 0)).unwrap();
        assert_eq!(net.graph().len(), 3);
    }

    #[test]
    fn bridging_tile_merges_lowest_id_survives() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();

        grid.transport(ResourceKind::Items, c(0, 0));
        let a = registry.place(c(0, 0), &grid, &machines).unwrap();
        grid.transport(ResourceKind::Items, c(2, 0));
        let b = registry.place(c(2, 0), &grid, &machines).unwrap();
        assert_ne!(a, b);

        grid.transport(ResourceKind::Items, c(1, 0));
        let merged = registry.place(c(1, 0), &grid, &machines).unwrap();
        assert_eq!(merged, a.min(b));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_at(c(0, 0)), Some(merged));
        assert_eq!(registry.id_at(c(2, 0)), Some(merged));
        assert_eq!(registry.network(merged).unwrap().graph().len(), 3);
    }

    #[test]
    fn removal_splits_and_reseeds_every_fragment() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();
        // 2 tiles west, 3 tiles east of the cut point at (2,0).
        place_line(&mut registry, &mut grid, &machines, c(0, 0), Direction::East, 6);

        grid.remove(c(2, 0));
        let report = registry.remove(c(2, 0), &grid, &machines).unwrap();

        let kept = report.kept.unwrap();
        assert_eq!(report.spawned.len(), 1);
        let spawned = report.spawned[0];

        // The larger (eastern) fragment keeps the original instance.
        assert_eq!(registry.network(kept).unwrap().graph().len(), 3);
        assert_eq!(registry.network(spawned).unwrap().graph().len(), 2);
        assert_eq!(registry.id_at(c(3, 0)), Some(kept));
        assert_eq!(registry.id_at(c(0, 0)), Some(spawned));
        assert_eq!(registry.id_at(c(2, 0)), None);
    }

    #[test]
    fn removing_last_tile_drops_instance() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();

        grid.transport(ResourceKind::Items, c(0, 0));
        registry.place(c(0, 0), &grid, &machines).unwrap();

        grid.remove(c(0, 0));
        let report = registry.remove(c(0, 0), &grid, &machines).unwrap();
        assert_eq!(report.kept, None);
        assert!(report.spawned.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn place_rejects_wrong_kind() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();
        grid.transport(ResourceKind::Power, c(0, 0));
        assert!(registry.place(c(0, 0), &grid, &machines).is_none());
    }

    #[test]
    fn insert_loaded_reindexes_and_bumps_ids() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        grid.line(ResourceKind::Items, c(0, 0), Direction::East, 3);

        let mut net = BareNetwork::create(NetworkId(9));
        net.graph_mut().recalculate(c(0, 0), &grid);

        let mut registry: NetworkRegistry<BareNetwork> = NetworkRegistry::new();
        registry.insert_loaded(net);
        assert_eq!(registry.id_at(c(1, 0)), Some(NetworkId(9)));

        // Fresh instances allocate past the loaded id.
        grid.transport(ResourceKind::Items, c(10, 10));
        let fresh = registry.place(c(10, 10), &grid, &machines).unwrap();
        assert!(fresh.0 > 9);
    }
}

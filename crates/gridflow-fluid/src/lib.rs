//! Fluid Networks for the Gridflow engine.
//!
//! A fluid network aggregates one shared [`ResourceStorage`] sized by
//! summing each member tile's capacity contribution. Transfers between
//! storages follow a conservation law: exports clamp to availability,
//! imports clamp to headroom and fluid-kind compatibility, and anything the
//! destination rejects flows back into the source -- quantity is never
//! created or destroyed by a transfer.
//!
//! Because the contained quantity depends on exact membership, fluid
//! networks persist a full node + adjacency dump rather than a seed; blind
//! recomputation against a changed grid would silently reshape the tank.
//!
//! Events fire only on *transitions* (storage newly full / newly empty),
//! not every tick.

use gridflow_core::coord::TileCoord;
use gridflow_core::fixed::{Fixed64, Ticks};
use gridflow_core::machine::MachineStore;
use gridflow_core::network::{NetworkGraph, NetworkId};
use gridflow_core::registry::ResourceNetwork;
use gridflow_core::serialize::{
    self, LoadError, NetworkBody, NetworkRecord, SaveError,
};
use gridflow_core::storage::{self, FluidKind, ResourceStorage};
use gridflow_core::tile::{ResourceKind, TileAccess};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by [`FluidNetwork::tick`] on state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluidEvent {
    /// The shared storage reached capacity.
    StorageFull { network: NetworkId, tick: Ticks },
    /// The shared storage drained completely.
    StorageEmpty { network: NetworkId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// FluidNetwork
// ---------------------------------------------------------------------------

/// One fluid network: graph plus the shared storage.
#[derive(Debug)]
pub struct FluidNetwork {
    graph: NetworkGraph,
    storage: ResourceStorage,
    was_full: bool,
    was_empty: bool,
}

impl FluidNetwork {
    pub fn storage(&self) -> &ResourceStorage {
        &self.storage
    }

    /// Current fill as a ratio of capacity, 0..1. Zero-capacity networks
    /// report 0.
    pub fn fill_ratio(&self) -> Fixed64 {
        if self.storage.max() == Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        self.storage.current() / self.storage.max()
    }

    /// Import fluid into the shared storage. Returns the accepted amount.
    pub fn import(&mut self, kind: Option<FluidKind>, amount: Fixed64) -> Fixed64 {
        self.storage.import(kind, amount)
    }

    /// Export fluid from the shared storage. Returns the exported amount.
    pub fn export(&mut self, amount: Fixed64) -> Fixed64 {
        self.storage.export(amount)
    }

    /// Move up to `amount` into another network, conserving quantity.
    pub fn transfer_to(&mut self, other: &mut FluidNetwork, amount: Fixed64) -> Fixed64 {
        storage::transfer(&mut self.storage, &mut other.storage, amount)
    }

    /// Emit full/empty transition events for this tick.
    pub fn tick(&mut self, current_tick: Ticks) -> Vec<FluidEvent> {
        let mut events = Vec::new();
        let full = self.storage.is_full() && self.storage.max() > Fixed64::ZERO;
        if full && !self.was_full {
            events.push(FluidEvent::StorageFull {
                network: self.graph.id(),
                tick: current_tick,
            });
        }
        self.was_full = full;

        let empty = self.storage.is_empty();
        if empty && !self.was_empty {
            events.push(FluidEvent::StorageEmpty {
                network: self.graph.id(),
                tick: current_tick,
            });
        }
        self.was_empty = empty;
        events
    }

    fn capacity_of(&self, grid: &impl TileAccess) -> Fixed64 {
        self.graph
            .coords()
            .filter_map(|c| grid.tile(c))
            .map(|t| t.capacity)
            .fold(Fixed64::ZERO, |acc, v| acc + v)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist with a full node dump: contained quantity makes blind
    /// recomputation unsafe.
    pub fn to_record(&self) -> Result<NetworkRecord, SaveError> {
        let extra = FluidExtra {
            current: self.storage.current(),
            max: self.storage.max(),
            fluid: self.storage.fluid_kind(),
        };
        Ok(NetworkRecord {
            id: self.graph.id().0,
            filter: ResourceKind::Fluids.filter_byte(),
            body: NetworkBody::Full(self.graph.node_dump()),
            junctions: self
                .graph
                .junctions()
                .iter()
                .map(|(&c, &a)| (c, a))
                .collect(),
            extra: serialize::encode_extra(&extra)?,
        })
    }

    pub fn from_record(
        record: &NetworkRecord,
        grid: &impl TileAccess,
    ) -> Result<FluidNetwork, LoadError> {
        if record.kind()? != ResourceKind::Fluids {
            return Err(LoadError::BadFilter(record.filter));
        }
        let id = NetworkId(record.id);
        let graph = match &record.body {
            NetworkBody::Full(dump) => NetworkGraph::from_node_dump(
                id,
                ResourceKind::Fluids,
                dump.clone(),
                record.junctions.clone(),
                grid,
            ),
            NetworkBody::Seed(seed) => {
                let mut graph = NetworkGraph::new(id, ResourceKind::Fluids);
                graph.recalculate(*seed, grid);
                graph
            }
        };
        let extra: FluidExtra = serialize::decode_extra(&record.extra)?;
        let mut storage = ResourceStorage::new(extra.max);
        let _ = storage.import(extra.fluid, extra.current);
        Ok(FluidNetwork {
            graph,
            storage,
            was_full: false,
            was_empty: false,
        })
    }
}

/// Kind-specific persistence payload: the storage snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct FluidExtra {
    current: Fixed64,
    max: Fixed64,
    fluid: Option<FluidKind>,
}

// ---------------------------------------------------------------------------
// ResourceNetwork policy
// ---------------------------------------------------------------------------

impl ResourceNetwork for FluidNetwork {
    const KIND: ResourceKind = ResourceKind::Fluids;

    fn create(id: NetworkId) -> Self {
        Self {
            graph: NetworkGraph::new(id, Self::KIND),
            storage: ResourceStorage::new(Fixed64::ZERO),
            was_full: false,
            was_empty: true,
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
        // Capacities and contents add; the merged tank keeps its type tag.
        self.storage.merge(&other.storage);
    }

    fn entry_added(&mut self, coord: TileCoord, grid: &impl TileAccess, _machines: &MachineStore) {
        if let Some(info) = grid.tile(coord) {
            self.storage.adjust_max(info.capacity);
        }
    }

    fn entry_removed(&mut self, coord: TileCoord, grid: &impl TileAccess, _machines: &MachineStore) {
        if let Some(info) = grid.tile(coord) {
            // Shrinking may clamp contents; quantity is discarded rather
            // than relocated.
            self.storage.adjust_max(-info.capacity);
        }
    }

    fn rebuilt(&mut self, grid: &impl TileAccess, _machines: &MachineStore) {
        let capacity = self.capacity_of(grid);
        self.storage.set_max(capacity);
    }

    fn rebalance_split(&mut self, spawned: &mut Self, _grid: &impl TileAccess) {
        // Share surviving contents with the fragment in proportion to its
        // capacity.
        let total = self.storage.max() + spawned.storage.max();
        if total == Fixed64::ZERO {
            return;
        }
        let share = self.storage.current() * spawned.storage.max() / total;
        let _ = storage::transfer(&mut self.storage, &mut spawned.storage, share);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridflow_core::coord::{Direction, TileCoord};
    use gridflow_core::fixed::fixed;
    use gridflow_core::registry::NetworkRegistry;
    use gridflow_core::test_utils::GridFixture;

    fn c(x: i32, y: i32) -> TileCoord {
        TileCoord::new(x, y)
    }

    fn water() -> Option<FluidKind> {
        Some(FluidKind(0))
    }

    /// Lay a line of pipes, each contributing `per_tile` capacity, and
    /// register them through a registry.
    fn pipe_line(
        registry: &mut NetworkRegistry<FluidNetwork>,
        grid: &mut GridFixture,
        machines: &MachineStore,
        from: TileCoord,
        len: i32,
        per_tile: Fixed64,
    ) -> NetworkId {
        let mut coord = from;
        let mut id = None;
        for _ in 0..len {
            grid.transport(ResourceKind::Fluids, coord);
            grid.set_capacity(coord, per_tile);
            id = registry.place(coord, grid, machines);
            coord = coord.step(Direction::East);
        }
        id.unwrap()
    }

    #[test]
    fn capacity_sums_member_tiles() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();
        let id = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 4, fixed(25.0));

        let net = registry.network(id).unwrap();
        assert_eq!(net.storage().max(), fixed(100.0));
        assert!(net.storage().is_empty());
    }

    #[test]
    fn merge_combines_contents_and_capacity() {
        // A holds 80/100, B holds 10/100 of the same fluid; a
        // bridging pipe merges them into 90/200 with the same tag.
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();

        let a = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 2, fixed(50.0));
        let b = pipe_line(&mut registry, &mut grid, &machines, c(3, 0), 2, fixed(50.0));
        assert_ne!(a, b);
        registry.network_mut(a).unwrap().import(water(), fixed(80.0));
        registry.network_mut(b).unwrap().import(water(), fixed(10.0));

        grid.transport(ResourceKind::Fluids, c(2, 0));
        let merged = registry.place(c(2, 0), &grid, &machines).unwrap();

        let net = registry.network(merged).unwrap();
        assert_eq!(net.storage().current(), fixed(90.0));
        assert_eq!(net.storage().max(), fixed(200.0));
        assert_eq!(net.storage().fluid_kind(), water());
    }

    #[test]
    fn transfer_between_networks_conserves() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        grid.line(ResourceKind::Fluids, c(0, 0), Direction::East, 2);
        grid.line(ResourceKind::Fluids, c(0, 5), Direction::East, 2);
        for x in 0..2 {
            grid.set_capacity(c(x, 0), fixed(50.0));
            grid.set_capacity(c(x, 5), fixed(10.0));
        }

        let mut a = FluidNetwork::create(NetworkId(0));
        a.graph_mut().recalculate(c(0, 0), &grid);
        a.rebuilt(&grid, &machines);
        let mut b = FluidNetwork::create(NetworkId(1));
        b.graph_mut().recalculate(c(0, 5), &grid);
        b.rebuilt(&grid, &machines);

        a.import(water(), fixed(60.0));
        let before = a.storage().current() + b.storage().current();
        // b only has 20 headroom.
        let moved = a.transfer_to(&mut b, fixed(50.0));
        assert_eq!(moved, fixed(20.0));
        assert_eq!(a.storage().current() + b.storage().current(), before);
        assert!(b.storage().is_full());
    }

    #[test]
    fn removal_shrinks_capacity_and_clamps() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();
        let id = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 3, fixed(10.0));
        registry.network_mut(id).unwrap().import(water(), fixed(28.0));

        // Remove an end tile: capacity 30 -> 20, contents clamp 28 -> 20.
        grid.remove(c(2, 0));
        let report = registry.remove(c(2, 0), &grid, &machines).unwrap();
        assert_eq!(report.kept, Some(id));

        let net = registry.network(id).unwrap();
        assert_eq!(net.storage().max(), fixed(20.0));
        assert_eq!(net.storage().current(), fixed(20.0));
    }

    #[test]
    fn split_shares_contents_by_capacity() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();
        // 5 tiles, 10 each; cutting the middle leaves 2 + 2.
        let id = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 5, fixed(10.0));
        registry.network_mut(id).unwrap().import(water(), fixed(40.0));

        grid.remove(c(2, 0));
        let report = registry.remove(c(2, 0), &grid, &machines).unwrap();
        let kept = report.kept.unwrap();
        let spawned = report.spawned[0];

        let kept_storage = registry.network(kept).unwrap().storage();
        let spawned_storage = registry.network(spawned).unwrap().storage();
        // Surviving contents (clamped to the kept fragment's 20) are shared
        // evenly between two equal-capacity fragments.
        assert_eq!(kept_storage.max(), fixed(20.0));
        assert_eq!(spawned_storage.max(), fixed(20.0));
        assert_eq!(
            kept_storage.current() + spawned_storage.current(),
            fixed(20.0)
        );
        assert_eq!(spawned_storage.fluid_kind(), water());
    }

    #[test]
    fn tick_emits_transition_events_once() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();
        let id = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 2, fixed(5.0));
        let net = registry.network_mut(id).unwrap();

        // Empty at creation; the first tick reports it, later ticks stay
        // quiet.
        let events = net.tick(1);
        assert!(events.is_empty(), "was_empty starts true: {events:?}");
        net.import(water(), fixed(10.0));
        let events = net.tick(2);
        assert_eq!(
            events,
            vec![FluidEvent::StorageFull {
                network: id,
                tick: 2
            }]
        );
        assert!(net.tick(3).is_empty());

        net.export(fixed(10.0));
        let events = net.tick(4);
        assert_eq!(
            events,
            vec![FluidEvent::StorageEmpty {
                network: id,
                tick: 4
            }]
        );
    }

    #[test]
    fn record_round_trip_preserves_contents() {
        let mut grid = GridFixture::new();
        let machines = MachineStore::new();
        let mut registry = NetworkRegistry::new();
        let id = pipe_line(&mut registry, &mut grid, &machines, c(0, 0), 3, fixed(10.0));
        registry.network_mut(id).unwrap().import(water(), fixed(17.0));

        let record = registry.network(id).unwrap().to_record().unwrap();
        assert!(matches!(record.body, NetworkBody::Full(_)));

        let restored = FluidNetwork::from_record(&record, &grid).unwrap();
        assert_eq!(restored.graph().len(), 3);
        assert_eq!(restored.storage().current(), fixed(17.0));
        assert_eq!(restored.storage().max(), fixed(30.0));
        assert_eq!(restored.storage().fluid_kind(), water());
    }
}

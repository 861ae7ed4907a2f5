//! Item Networks for the Gridflow engine.
//!
//! An item network layers three things over the shared network graph: the
//! set of externally adjacent machine inventories (discovered by probing the
//! four neighbors of each member tile), pump timers that periodically
//! extract from the inventory behind the pump's head, and the list of
//! in-flight [`TransportUnit`]s carrying extracted stacks to a destination
//! inventory.
//!
//! # Tick order
//!
//! 1. **Pumps** -- countdown timers fire, extract up to the per-cycle stack
//!    limit, route the stack to the cheapest approach tile of the best
//!    target inventory (ties broken West > North > East > South), and spawn
//!    a unit.
//! 2. **Units** -- traveling units advance one path index per elapsed
//!    per-tile travel duration and import on arrival; wandering units
//!    re-query for a target on the configured cadence; units that left the
//!    network are grounded (import where they stand, or drop the payload).
//!
//! Events fire for unit spawn, delivery, drop, and retarget; the host
//! renders or replicates them as it sees fit.

pub mod unit;
pub use unit::{TransportUnit, UnitId, UnitState};

use gridflow_core::config::EngineConfig;
use gridflow_core::coord::{Direction, TileCoord};
use gridflow_core::item::ItemStack;
use gridflow_core::machine::MachineStore;
use gridflow_core::network::{NetworkGraph, NetworkId};
use gridflow_core::registry::ResourceNetwork;
use gridflow_core::serialize::{
    self, LoadError, NetworkBody, NetworkRecord, SaveError,
};
use gridflow_core::tile::{ResourceKind, TileAccess};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Pump state
// ---------------------------------------------------------------------------

/// Countdown state for one pump tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpState {
    /// Ticks until the next extraction cycle.
    pub remaining: u32,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by [`ItemNetwork::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    /// A pump extraction produced a unit.
    UnitSpawned {
        unit: UnitId,
        from: TileCoord,
        target: TileCoord,
    },
    /// A unit imported its payload and was destroyed.
    UnitDelivered {
        unit: UnitId,
        inventory: TileCoord,
        payload: ItemStack,
    },
    /// A unit left the network with no transport tile beneath it; the
    /// payload falls into the world.
    UnitDropped {
        unit: UnitId,
        at: TileCoord,
        payload: ItemStack,
    },
    /// A wandering unit found a new destination.
    UnitRetargeted { unit: UnitId, target: TileCoord },
}

// ---------------------------------------------------------------------------
// ItemNetwork
// ---------------------------------------------------------------------------

/// One item network: graph, adjacent inventories, pumps, units.
#[derive(Debug)]
pub struct ItemNetwork {
    graph: NetworkGraph,
    /// Coordinates of machine inventories adjacent to any member tile.
    adjacent_inventories: BTreeSet<TileCoord>,
    /// Pump countdown timers, keyed by pump tile.
    pumps: BTreeMap<TileCoord, PumpState>,
    /// In-flight units. Slot reuse on destroy comes with the arena.
    units: SlotMap<UnitId, TransportUnit>,
}

impl ItemNetwork {
    pub fn adjacent_inventories(&self) -> &BTreeSet<TileCoord> {
        &self.adjacent_inventories
    }

    pub fn pump_state(&self, coord: TileCoord) -> Option<PumpState> {
        self.pumps.get(&coord).copied()
    }

    pub fn unit(&self, id: UnitId) -> Option<&TransportUnit> {
        self.units.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &TransportUnit)> {
        self.units.iter()
    }

    /// Number of live (non-destroyed) units.
    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    /// A machine entity disappeared: forget its inventory and inform every
    /// unit that was traveling toward it.
    pub fn machine_removed(&mut self, coord: TileCoord) {
        self.adjacent_inventories.remove(&coord);
        for (_, unit) in self.units.iter_mut() {
            if unit.target == Some(coord) {
                unit.clear_target();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance pumps and units by one tick.
    pub fn tick(
        &mut self,
        grid: &impl TileAccess,
        machines: &mut MachineStore,
        config: &EngineConfig,
    ) -> Vec<ItemEvent> {
        let mut events = Vec::new();
        self.tick_pumps(grid, machines, &mut events);
        self.tick_units(grid, machines, config, &mut events);
        events
    }

    fn tick_pumps(
        &mut self,
        grid: &impl TileAccess,
        machines: &mut MachineStore,
        events: &mut Vec<ItemEvent>,
    ) {
        let pump_coords: Vec<TileCoord> = self.pumps.keys().copied().collect();
        for coord in pump_coords {
            let Some(info) = grid.tile(coord) else {
                continue;
            };
            let Some(pump) = info.pump else {
                continue;
            };
            let fired = {
                let state = self.pumps.get_mut(&coord).expect("pump key just read");
                if state.remaining > 0 {
                    state.remaining -= 1;
                }
                if state.remaining == 0 {
                    state.remaining = pump.timer_max.max(1);
                    true
                } else {
                    false
                }
            };
            if !fired {
                continue;
            }

            // The inventory behind the pump's head.
            let source = coord.step(pump.direction.opposite());
            let Some(stack) = machines
                .inventory_mut(source)
                .and_then(|inv| inv.extract(pump.stack_limit.max(1)))
            else {
                continue;
            };

            match route_to_best_inventory(
                &self.graph,
                &self.adjacent_inventories,
                coord,
                Some(source),
                grid,
                machines,
            ) {
                Some((target, path)) => {
                    let id = self.units.insert(TransportUnit::new(
                        self.graph.id(),
                        stack,
                        path,
                        Some(target),
                    ));
                    events.push(ItemEvent::UnitSpawned {
                        unit: id,
                        from: coord,
                        target,
                    });
                }
                None => {
                    // No destination: put the stack back where it came from.
                    if let Some(inv) = machines.inventory_mut(source) {
                        let _ = inv.insert(stack);
                    }
                }
            }
        }
    }

    fn tick_units(
        &mut self,
        grid: &impl TileAccess,
        machines: &mut MachineStore,
        config: &EngineConfig,
        events: &mut Vec<ItemEvent>,
    ) {
        let retry = config.wander_retry_ticks.max(1) as u64;
        let ids: Vec<UnitId> = self.units.keys().collect();
        for id in ids {
            // Split borrows so the graph and inventory set stay readable
            // while one unit is mutably held.
            let Self {
                graph,
                adjacent_inventories,
                units,
                ..
            } = self;
            let Some(unit) = units.get_mut(id) else {
                continue;
            };
            unit.alive_ticks += 1;
            let Some(coord) = unit.coord() else {
                units.remove(id);
                continue;
            };

            // Exited the network: import where it stands or drop.
            if !graph.contains(coord) {
                let mut unit = units.remove(id).expect("unit present");
                let imported = machines
                    .inventory_mut(coord)
                    .map(|inv| inv.insert(unit.payload.clone()))
                    .is_some_and(|leftover| leftover == 0);
                let payload = unit.payload.clone();
                unit.destroy();
                if imported {
                    events.push(ItemEvent::UnitDelivered {
                        unit: id,
                        inventory: coord,
                        payload,
                    });
                } else {
                    events.push(ItemEvent::UnitDropped {
                        unit: id,
                        at: coord,
                        payload,
                    });
                }
                continue;
            }

            match unit.target {
                None => {
                    if unit.alive_ticks % retry != 0 {
                        continue;
                    }
                    if let Some((target, path)) = route_to_best_inventory(
                        graph,
                        adjacent_inventories,
                        coord,
                        None,
                        grid,
                        machines,
                    ) {
                        unit.assign_route(path, target);
                        events.push(ItemEvent::UnitRetargeted { unit: id, target });
                    }
                }
                Some(target) => {
                    let ticks = grid.tile(coord).map(|t| t.travel_ticks).unwrap_or(1);
                    if !unit.advance(ticks) {
                        continue;
                    }
                    // At the approach tile: try to import into the target.
                    let leftover = machines
                        .inventory_mut(target)
                        .map(|inv| inv.insert(unit.payload.clone()));
                    match leftover {
                        Some(0) => {
                            let payload = unit.payload.clone();
                            let mut unit = units.remove(id).expect("unit present");
                            unit.destroy();
                            events.push(ItemEvent::UnitDelivered {
                                unit: id,
                                inventory: target,
                                payload,
                            });
                        }
                        Some(rest) => {
                            // Partial import; carry the remainder and wander.
                            unit.payload.quantity = rest;
                            unit.clear_target();
                        }
                        None => {
                            // Inventory gone; wander and retry later.
                            unit.clear_target();
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Adjacency bookkeeping
    // -----------------------------------------------------------------------

    fn discover_around(&mut self, coord: TileCoord, machines: &MachineStore) {
        for dir in Direction::ALL {
            let m = coord.step(dir);
            if machines.accepts(m, ResourceKind::Items) && machines.can_merge(m, dir.opposite()) {
                self.adjacent_inventories.insert(m);
            }
        }
    }

    fn register_pump(&mut self, coord: TileCoord, grid: &impl TileAccess) {
        if let Some(info) = grid.tile(coord)
            && let Some(pump) = info.pump
        {
            self.pumps.entry(coord).or_insert(PumpState {
                remaining: pump.timer_max.max(1),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist this network: item networks are reconstructible, so the body
    /// is a single seed coordinate plus the kind-specific extra block.
    pub fn to_record(&self) -> Result<NetworkRecord, SaveError> {
        let seed = self.graph.coords().next().unwrap_or_default();
        let extra = ItemExtra {
            adjacent_inventories: self.adjacent_inventories.iter().copied().collect(),
            pumps: self.pumps.iter().map(|(&c, s)| (c, s.remaining)).collect(),
            units: self.units.values().cloned().collect(),
        };
        Ok(NetworkRecord {
            id: self.graph.id().0,
            filter: ResourceKind::Items.filter_byte(),
            body: NetworkBody::Seed(seed),
            junctions: self
                .graph
                .junctions()
                .iter()
                .map(|(&c, &a)| (c, a))
                .collect(),
            extra: serialize::encode_extra(&extra)?,
        })
    }

    /// Restore a network from its record, rebuilding the graph from the
    /// seed (or the full dump, if a save carries one).
    pub fn from_record(
        record: &NetworkRecord,
        grid: &impl TileAccess,
    ) -> Result<ItemNetwork, LoadError> {
        if record.kind()? != ResourceKind::Items {
            return Err(LoadError::BadFilter(record.filter));
        }
        let id = NetworkId(record.id);
        let graph = match &record.body {
            NetworkBody::Seed(seed) => {
                let mut graph = NetworkGraph::new(id, ResourceKind::Items);
                graph.recalculate(*seed, grid);
                graph
            }
            NetworkBody::Full(dump) => NetworkGraph::from_node_dump(
                id,
                ResourceKind::Items,
                dump.clone(),
                record.junctions.clone(),
                grid,
            ),
        };
        let extra: ItemExtra = serialize::decode_extra(&record.extra)?;
        let mut units = SlotMap::with_key();
        for unit in extra.units {
            units.insert(unit);
        }
        Ok(ItemNetwork {
            graph,
            adjacent_inventories: extra.adjacent_inventories.into_iter().collect(),
            pumps: extra
                .pumps
                .into_iter()
                .map(|(c, remaining)| (c, PumpState { remaining }))
                .collect(),
            units,
        })
    }
}

/// Kind-specific persistence payload for item networks.
#[derive(Debug, Serialize, Deserialize)]
struct ItemExtra {
    adjacent_inventories: Vec<TileCoord>,
    pumps: Vec<(TileCoord, u32)>,
    units: Vec<TransportUnit>,
}

// ---------------------------------------------------------------------------
// Target selection
// ---------------------------------------------------------------------------

/// Pick the cheapest route from `from` to any approach tile of an adjacent
/// importable inventory. All four approach directions of every candidate
/// inventory are compared; cost ties resolve by West > North > East > South
/// precedence (and first-seen inventory across inventories).
fn route_to_best_inventory(
    graph: &NetworkGraph,
    adjacent: &BTreeSet<TileCoord>,
    from: TileCoord,
    exclude: Option<TileCoord>,
    grid: &impl TileAccess,
    machines: &MachineStore,
) -> Option<(TileCoord, Vec<TileCoord>)> {
    let mut best: Option<(gridflow_core::fixed::Fixed64, TileCoord, Vec<TileCoord>)> = None;
    for &inventory in adjacent {
        if Some(inventory) == exclude {
            continue;
        }
        if !machines.accepts(inventory, ResourceKind::Items) {
            continue;
        }
        if !machines
            .inventory(inventory)
            .is_some_and(|inv| inv.has_space())
        {
            continue;
        }
        for dir in Direction::ALL {
            let approach = inventory.step(dir);
            if !graph.contains(approach) {
                continue;
            }
            let Ok(Some(result)) = graph.find_path(grid, from, approach) else {
                continue;
            };
            let better = match &best {
                Some((cost, _, _)) => result.cost < *cost,
                None => true,
            };
            if better {
                best = Some((result.cost, inventory, result.path));
            }
        }
    }
    best.map(|(_, inventory, path)| (inventory, path))
}

// ---------------------------------------------------------------------------
// ResourceNetwork policy
// ---------------------------------------------------------------------------

impl ResourceNetwork for ItemNetwork {
    const KIND: ResourceKind = ResourceKind::Items;

    fn create(id: NetworkId) -> Self {
        Self {
            graph: NetworkGraph::new(id, Self::KIND),
            adjacent_inventories: BTreeSet::new(),
            pumps: BTreeMap::new(),
            units: SlotMap::with_key(),
        }
    }

    fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut NetworkGraph {
        &mut self.graph
    }

    fn absorb(&mut self, mut other: Self, grid: &impl TileAccess, _machines: &MachineStore) {
        self.graph.merge(other.graph, grid);
        self.adjacent_inventories
            .extend(other.adjacent_inventories);
        self.pumps.append(&mut other.pumps);
        let id = self.graph.id();
        for (_, mut unit) in other.units.drain() {
            unit.network = id;
            self.units.insert(unit);
        }
    }

    fn entry_added(&mut self, coord: TileCoord, grid: &impl TileAccess, machines: &MachineStore) {
        self.register_pump(coord, grid);
        self.discover_around(coord, machines);
    }

    fn entry_removed(
        &mut self,
        coord: TileCoord,
        _grid: &impl TileAccess,
        machines: &MachineStore,
    ) {
        self.pumps.remove(&coord);

        // An inventory next to the removed tile may have lost its last
        // transport neighbor. Probe only the four neighbors of the change.
        let mut dropped: Vec<TileCoord> = Vec::new();
        for dir in Direction::ALL {
            let m = coord.step(dir);
            if !self.adjacent_inventories.contains(&m) {
                continue;
            }
            let still_adjacent = Direction::ALL.into_iter().any(|d| {
                let t = m.step(d);
                t != coord && self.graph.contains(t) && machines.can_merge(m, d)
            });
            if !still_adjacent {
                self.adjacent_inventories.remove(&m);
                dropped.push(m);
            }
        }
        // The network informs units whose target just became invalid; they
        // do not discover this themselves.
        for target in dropped {
            for (_, unit) in self.units.iter_mut() {
                if unit.target == Some(target) {
                    unit.clear_target();
                }
            }
        }
    }

    fn rebuilt(&mut self, grid: &impl TileAccess, machines: &MachineStore) {
        let old_pumps = std::mem::take(&mut self.pumps);
        self.adjacent_inventories.clear();
        let coords: Vec<TileCoord> = self.graph.coords().collect();
        for coord in coords {
            if let Some(info) = grid.tile(coord)
                && let Some(pump) = info.pump
            {
                let remaining = old_pumps
                    .get(&coord)
                    .map(|s| s.remaining)
                    .unwrap_or(pump.timer_max.max(1));
                self.pumps.insert(coord, PumpState { remaining });
            }
            self.discover_around(coord, machines);
        }
        // Re-validate unit targets against the rebuilt inventory set.
        for (_, unit) in self.units.iter_mut() {
            if let Some(target) = unit.target
                && !self.adjacent_inventories.contains(&target)
            {
                unit.clear_target();
            }
        }
    }

    fn rebalance_split(&mut self, spawned: &mut Self, _grid: &impl TileAccess) {
        // Units standing in the split-off fragment move with it.
        let moving: Vec<UnitId> = self
            .units
            .iter()
            .filter(|(_, u)| u.coord().is_some_and(|c| spawned.graph.contains(c)))
            .map(|(id, _)| id)
            .collect();
        let id = spawned.graph.id();
        for unit_id in moving {
            if let Some(mut unit) = self.units.remove(unit_id) {
                unit.network = id;
                unit.clear_target();
                spawned.units.insert(unit);
            }
        }
    }
}

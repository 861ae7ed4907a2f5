//! Power Networks for the Gridflow engine.
//!
//! A power network carries a shared charge storage. Each tick it exports
//! into every adjacent consumer machine's own storage, limited per consumer
//! by the highest transfer rate of any adjacent transport tile, and tracks
//! the tick's net gain/loss for diagnostics. Generator machines work the
//! other way: they generate into their own storage, then distribute the
//! exportable surplus across adjacent networks under one of five
//! configurable priority policies.
//!
//! All quantity movement goes through the conservation-preserving
//! [`gridflow_core::storage::transfer`], so no policy can create or destroy
//! charge.

use gridflow_core::coord::{Direction, TileCoord};
use gridflow_core::fixed::Fixed64;
use gridflow_core::machine::MachineStore;
use gridflow_core::network::{NetworkGraph, NetworkId};
use gridflow_core::registry::{NetworkRegistry, ResourceNetwork};
use gridflow_core::serialize::{
    self, LoadError, NetworkBody, NetworkRecord, SaveError,
};
use gridflow_core::storage::{self, ResourceStorage};
use gridflow_core::tile::{ResourceKind, TileAccess};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Distribution policies
// ---------------------------------------------------------------------------

/// How a surplus is divided across receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributePolicy {
    /// Fill receivers in discovery order.
    FirstCome,
    /// Fill receivers in reverse discovery order.
    LastCome,
    /// Fill the receiver holding the least charge first.
    LowestFirst,
    /// Fill the receiver holding the most charge first.
    HighestFirst,
    /// Split evenly across all receivers, re-distributing any leftover a
    /// capped receiver could not take.
    EvenSplit,
}

/// One receiver's view for a distribution round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receiver {
    /// Maximum amount this receiver can take.
    pub cap: Fixed64,
    /// Charge currently held; orders the Lowest/HighestFirst policies.
    pub current: Fixed64,
}

/// Divide `amount` across `receivers` under `policy`. Returns per-receiver
/// allocations aligned with the input; no allocation exceeds its cap and
/// the allocations never sum to more than `amount`.
pub fn distribute(
    policy: DistributePolicy,
    amount: Fixed64,
    receivers: &[Receiver],
) -> Vec<Fixed64> {
    let mut alloc = vec![Fixed64::ZERO; receivers.len()];
    if amount <= Fixed64::ZERO || receivers.is_empty() {
        return alloc;
    }
    let mut remaining = amount;

    if policy == DistributePolicy::EvenSplit {
        loop {
            let active: Vec<usize> = (0..receivers.len())
                .filter(|&i| alloc[i] < receivers[i].cap)
                .collect();
            if active.is_empty() || remaining <= Fixed64::ZERO {
                break;
            }
            let mut share = remaining / Fixed64::from_num(active.len() as u32);
            if share == Fixed64::ZERO {
                // Sub-resolution dust: hand it to the first open receiver.
                share = remaining;
            }
            let mut progressed = false;
            for &i in &active {
                let room = receivers[i].cap - alloc[i];
                let give = share.min(room).min(remaining);
                if give > Fixed64::ZERO {
                    alloc[i] += give;
                    remaining -= give;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        return alloc;
    }

    let mut order: Vec<usize> = (0..receivers.len()).collect();
    match policy {
        DistributePolicy::FirstCome => {}
        DistributePolicy::LastCome => order.reverse(),
        DistributePolicy::LowestFirst => {
            order.sort_by(|&a, &b| receivers[a].current.cmp(&receivers[b].current).then(a.cmp(&b)));
        }
        DistributePolicy::HighestFirst => {
            order.sort_by(|&a, &b| receivers[b].current.cmp(&receivers[a].current).then(a.cmp(&b)));
        }
        DistributePolicy::EvenSplit => unreachable!("handled above"),
    }
    for i in order {
        if remaining <= Fixed64::ZERO {
            break;
        }
        let give = receivers[i].cap.min(remaining);
        if give > Fixed64::ZERO {
            alloc[i] = give;
            remaining -= give;
        }
    }
    alloc
}

// ---------------------------------------------------------------------------
// Power machines
// ---------------------------------------------------------------------------

/// What a power machine does with charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerRole {
    /// Draws charge from adjacent networks.
    Consumer,
    /// Generates `rate` per tick into its own storage, then distributes the
    /// surplus to adjacent networks under `policy`.
    Generator {
        rate: Fixed64,
        policy: DistributePolicy,
    },
}

/// Per-machine power state, owned by the power module and keyed by
/// coordinate (the machine-entity store pattern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUnit {
    pub storage: ResourceStorage,
    pub role: PowerRole,
}

impl PowerUnit {
    pub fn consumer(capacity: Fixed64) -> Self {
        Self {
            storage: ResourceStorage::new(capacity),
            role: PowerRole::Consumer,
        }
    }

    pub fn generator(capacity: Fixed64, rate: Fixed64, policy: DistributePolicy) -> Self {
        Self {
            storage: ResourceStorage::new(capacity),
            role: PowerRole::Generator { rate, policy },
        }
    }
}

// ---------------------------------------------------------------------------
// PowerNetwork
// ---------------------------------------------------------------------------

/// One power network: graph, shared charge storage, adjacent machine set.
#[derive(Debug)]
pub struct PowerNetwork {
    graph: NetworkGraph,
    storage: ResourceStorage,
    /// Coordinates of adjacent power machines (consumers and generators).
    adjacent_units: BTreeSet<TileCoord>,
    /// Policy for dividing exports across this network's consumers.
    pub export_policy: DistributePolicy,
    /// Net charge gained (positive) or lost (negative) this tick.
    net_flow: Fixed64,
}

impl PowerNetwork {
    pub fn storage(&self) -> &ResourceStorage {
        &self.storage
    }

    pub fn adjacent_units(&self) -> &BTreeSet<TileCoord> {
        &self.adjacent_units
    }

    /// Net gain/loss recorded during the most recent tick.
    pub fn net_flow(&self) -> Fixed64 {
        self.net_flow
    }

    /// Seed the shared storage directly (generation tests, load paths).
    pub fn import(&mut self, amount: Fixed64) -> Fixed64 {
        self.storage.import(None, amount)
    }

    /// The highest transfer rate of any member tile adjacent to `coord`.
    fn best_adjacent_rate(&self, coord: TileCoord, grid: &impl TileAccess) -> Fixed64 {
        let mut best = Fixed64::ZERO;
        for dir in Direction::ALL {
            let t = coord.step(dir);
            if !self.graph.contains(t) {
                continue;
            }
            if let Some(info) = grid.tile(t)
                && info.transfer_rate > best
            {
                best = info.transfer_rate;
            }
        }
        best
    }

    /// Export into every adjacent consumer's storage, each limited by the
    /// highest adjacent transfer rate and its own headroom. Generators are
    /// excluded. Returns the total delivered.
    pub fn tick(
        &mut self,
        grid: &impl TileAccess,
        units: &mut BTreeMap<TileCoord, PowerUnit>,
    ) -> Fixed64 {
        self.net_flow = Fixed64::ZERO;
        let consumers: Vec<TileCoord> = self
            .adjacent_units
            .iter()
            .copied()
            .filter(|c| matches!(units.get(c).map(|u| u.role), Some(PowerRole::Consumer)))
            .collect();
        let receivers: Vec<Receiver> = consumers
            .iter()
            .map(|&c| {
                let unit = &units[&c];
                Receiver {
                    cap: unit.storage.free().min(self.best_adjacent_rate(c, grid)),
                    current: unit.storage.current(),
                }
            })
            .collect();

        let alloc = distribute(self.export_policy, self.storage.current(), &receivers);
        let mut total = Fixed64::ZERO;
        for (i, &c) in consumers.iter().enumerate() {
            if alloc[i] <= Fixed64::ZERO {
                continue;
            }
            let unit = units.get_mut(&c).expect("consumer key just read");
            total += storage::transfer(&mut self.storage, &mut unit.storage, alloc[i]);
        }
        self.net_flow -= total;
        total
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Power networks are reconstructible: seed body plus storage snapshot.
    pub fn to_record(&self) -> Result<NetworkRecord, SaveError> {
        let extra = PowerExtra {
            current: self.storage.current(),
            max: self.storage.max(),
            export_policy: self.export_policy,
        };
        Ok(NetworkRecord {
            id: self.graph.id().0,
            filter: ResourceKind::Power.filter_byte(),
            body: NetworkBody::Seed(self.graph.coords().next().unwrap_or_default()),
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
    ) -> Result<PowerNetwork, LoadError> {
        if record.kind()? != ResourceKind::Power {
            return Err(LoadError::BadFilter(record.filter));
        }
        let id = NetworkId(record.id);
        let graph = match &record.body {
            NetworkBody::Seed(seed) => {
                let mut graph = NetworkGraph::new(id, ResourceKind::Power);
                graph.recalculate(*seed, grid);
                graph
            }
            NetworkBody::Full(dump) => NetworkGraph::from_node_dump(
                id,
                ResourceKind::Power,
                dump.clone(),
                record.junctions.clone(),
                grid,
            ),
        };
        let extra: PowerExtra = serialize::decode_extra(&record.extra)?;
        let mut storage = ResourceStorage::new(extra.max);
        let _ = storage.import(None, extra.current);
        Ok(PowerNetwork {
            graph,
            storage,
            adjacent_units: BTreeSet::new(),
            export_policy: extra.export_policy,
            net_flow: Fixed64::ZERO,
        })
    }
}

/// Kind-specific persistence payload: the storage snapshot and policy.
#[derive(Debug, Serialize, Deserialize)]
struct PowerExtra {
    current: Fixed64,
    max: Fixed64,
    export_policy: DistributePolicy,
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Run one generator machine for a tick: generate into its own storage,
/// then distribute the exportable surplus across adjacent networks under
/// the generator's policy. Returns the total distributed.
pub fn generator_tick(
    coord: TileCoord,
    units: &mut BTreeMap<TileCoord, PowerUnit>,
    registry: &mut NetworkRegistry<PowerNetwork>,
) -> Fixed64 {
    let Some(unit) = units.get_mut(&coord) else {
        return Fixed64::ZERO;
    };
    let PowerRole::Generator { rate, policy } = unit.role else {
        return Fixed64::ZERO;
    };
    let _ = unit.storage.import(None, rate);

    // Adjacent networks in discovery (tie-break precedence) order.
    let mut nets: Vec<NetworkId> = Vec::new();
    for dir in Direction::ALL {
        if let Some(id) = registry.id_at(coord.step(dir))
            && !nets.contains(&id)
        {
            nets.push(id);
        }
    }
    if nets.is_empty() {
        return Fixed64::ZERO;
    }

    let receivers: Vec<Receiver> = nets
        .iter()
        .map(|&id| {
            let s = registry.network(id).expect("indexed network exists").storage();
            Receiver {
                cap: s.free(),
                current: s.current(),
            }
        })
        .collect();
    let alloc = distribute(policy, unit.storage.current(), &receivers);

    let mut total = Fixed64::ZERO;
    for (i, &id) in nets.iter().enumerate() {
        if alloc[i] <= Fixed64::ZERO {
            continue;
        }
        let net = registry
            .network_mut(id)
            .expect("indexed network exists");
        let moved = storage::transfer(&mut unit.storage, &mut net.storage, alloc[i]);
        net.net_flow += moved;
        total += moved;
    }
    total
}

// ---------------------------------------------------------------------------
// ResourceNetwork policy
// ---------------------------------------------------------------------------

impl PowerNetwork {
    fn discover_around(&mut self, coord: TileCoord, machines: &MachineStore) {
        for dir in Direction::ALL {
            let m = coord.step(dir);
            if machines.accepts(m, ResourceKind::Power) && machines.can_merge(m, dir.opposite()) {
                self.adjacent_units.insert(m);
            }
        }
    }
}

impl ResourceNetwork for PowerNetwork {
    const KIND: ResourceKind = ResourceKind::Power;

    fn create(id: NetworkId) -> Self {
        Self {
            graph: NetworkGraph::new(id, Self::KIND),
            storage: ResourceStorage::new(Fixed64::ZERO),
            adjacent_units: BTreeSet::new(),
            export_policy: DistributePolicy::FirstCome,
            net_flow: Fixed64::ZERO,
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
        self.storage.merge(&other.storage);
        self.adjacent_units.extend(other.adjacent_units);
    }

    fn entry_added(&mut self, coord: TileCoord, grid: &impl TileAccess, machines: &MachineStore) {
        if let Some(info) = grid.tile(coord) {
            self.storage.adjust_max(info.capacity);
        }
        self.discover_around(coord, machines);
    }

    fn entry_removed(&mut self, coord: TileCoord, grid: &impl TileAccess, machines: &MachineStore) {
        if let Some(info) = grid.tile(coord) {
            self.storage.adjust_max(-info.capacity);
        }
        for dir in Direction::ALL {
            let m = coord.step(dir);
            if !self.adjacent_units.contains(&m) {
                continue;
            }
            let still_adjacent = Direction::ALL.into_iter().any(|d| {
                let t = m.step(d);
                t != coord && self.graph.contains(t) && machines.can_merge(m, d)
            });
            if !still_adjacent {
                self.adjacent_units.remove(&m);
            }
        }
    }

    fn rebuilt(&mut self, grid: &impl TileAccess, machines: &MachineStore) {
        let capacity = self
            .graph
            .coords()
            .filter_map(|c| grid.tile(c))
            .map(|t| t.capacity)
            .fold(Fixed64::ZERO, |acc, v| acc + v);
        self.storage.set_max(capacity);
        self.adjacent_units.clear();
        let coords: Vec<TileCoord> = self.graph.coords().collect();
        for coord in coords {
            self.discover_around(coord, machines);
        }
    }

    fn rebalance_split(&mut self, spawned: &mut Self, _grid: &impl TileAccess) {
        let total = self.storage.max() + spawned.storage.max();
        if total == Fixed64::ZERO {
            return;
        }
        let share = self.storage.current() * spawned.storage.max() / total;
        let _ = storage::transfer(&mut self.storage, &mut spawned.storage, share);
    }
}

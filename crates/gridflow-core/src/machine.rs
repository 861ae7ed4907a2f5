//! Machine-entity collaborator.
//!
//! Machines (chests, tanks, generators, assemblers) are external to the
//! network engine: networks discover them by probing tile neighbors and
//! interact through this store. Following the module-owned spec-map pattern,
//! the store keys descriptors and item inventories by coordinate; power
//! modules own their per-machine storages the same way on their side.

use crate::coord::{Direction, TileCoord};
use crate::item::Inventory;
use crate::tile::{DirMask, KindMask, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static description of one machine entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Which resource kinds the machine accepts.
    pub accepts: KindMask,
    /// Sides on which the machine may merge with an adjacent transport tile.
    pub connections: DirMask,
}

/// Registry of machine entities, keyed by coordinate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineStore {
    machines: BTreeMap<TileCoord, MachineInfo>,
    inventories: BTreeMap<TileCoord, Inventory>,
}

impl MachineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a machine. An item-accepting machine gets the provided
    /// inventory; pass `None` for machines without item storage.
    pub fn place(&mut self, coord: TileCoord, info: MachineInfo, inventory: Option<Inventory>) {
        self.machines.insert(coord, info);
        if let Some(inv) = inventory {
            self.inventories.insert(coord, inv);
        }
    }

    /// Remove a machine and its inventory.
    pub fn remove(&mut self, coord: TileCoord) {
        self.machines.remove(&coord);
        self.inventories.remove(&coord);
    }

    /// Whether a machine exists at `coord`.
    pub fn exists(&self, coord: TileCoord) -> bool {
        self.machines.contains_key(&coord)
    }

    /// Whether the machine at `coord` accepts `kind`.
    pub fn accepts(&self, coord: TileCoord, kind: ResourceKind) -> bool {
        self.machines
            .get(&coord)
            .is_some_and(|m| m.accepts.contains(kind))
    }

    /// Whether the machine at `coord` may merge with a transport tile on the
    /// side facing `dir` (i.e. the tile sits at `coord.step(dir)`).
    pub fn can_merge(&self, coord: TileCoord, dir: Direction) -> bool {
        self.machines
            .get(&coord)
            .is_some_and(|m| m.connections.contains(dir))
    }

    pub fn info(&self, coord: TileCoord) -> Option<&MachineInfo> {
        self.machines.get(&coord)
    }

    pub fn inventory(&self, coord: TileCoord) -> Option<&Inventory> {
        self.inventories.get(&coord)
    }

    pub fn inventory_mut(&mut self, coord: TileCoord) -> Option<&mut Inventory> {
        self.inventories.get_mut(&coord)
    }
}

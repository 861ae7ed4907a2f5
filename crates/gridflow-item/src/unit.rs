//! Transport units: simulated payloads traveling along computed paths.
//!
//! A unit is created when a pump extraction succeeds, advances one path
//! index per elapsed per-tile travel duration, and is destroyed when it
//! delivers, is dropped into the world, or its target becomes permanently
//! unreachable. Units live in a `SlotMap` so a destroyed unit's slot is
//! reused before the list grows.

use gridflow_core::coord::TileCoord;
use gridflow_core::item::ItemStack;
use gridflow_core::network::NetworkId;
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Identifies a transport unit within its network's unit list.
    pub struct UnitId;
}

/// Observable lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Has a target and a path; advancing.
    Traveling,
    /// No target; re-queries the network periodically.
    Wandering,
    /// Terminal. Path and target data cleared.
    Destroyed,
}

/// A payload in flight on an item network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportUnit {
    /// The network that owns this unit.
    pub network: NetworkId,
    /// Snapshot of the stack being carried.
    pub payload: ItemStack,
    /// Current route, endpoints inclusive. While wandering this holds just
    /// the tile the unit stands on.
    pub path: Vec<TileCoord>,
    /// Index of the tile the unit currently occupies.
    pub path_index: usize,
    /// Ticks spent on the current tile.
    pub progress: u32,
    /// Destination inventory coordinate, or `None` while wandering.
    pub target: Option<TileCoord>,
    /// Total ticks this unit has existed. Drives the wander retry cadence.
    pub alive_ticks: u64,
    /// Terminal flag; set just before the slot is released.
    pub destroyed: bool,
}

impl TransportUnit {
    pub fn new(
        network: NetworkId,
        payload: ItemStack,
        path: Vec<TileCoord>,
        target: Option<TileCoord>,
    ) -> Self {
        Self {
            network,
            payload,
            path,
            path_index: 0,
            progress: 0,
            target,
            alive_ticks: 0,
            destroyed: false,
        }
    }

    /// The tile the unit currently stands on.
    pub fn coord(&self) -> Option<TileCoord> {
        self.path.get(self.path_index).copied()
    }

    pub fn state(&self) -> UnitState {
        if self.destroyed {
            UnitState::Destroyed
        } else if self.target.is_some() {
            UnitState::Traveling
        } else {
            UnitState::Wandering
        }
    }

    /// Whether the unit stands on the final tile of its route.
    pub fn at_path_end(&self) -> bool {
        self.path_index + 1 >= self.path.len()
    }

    /// Drop the target and collapse the path to the current tile. The unit
    /// keeps its position and starts wandering.
    pub fn clear_target(&mut self) {
        let here = self.coord();
        self.target = None;
        self.path = here.into_iter().collect();
        self.path_index = 0;
        self.progress = 0;
    }

    /// Take on a new route. The route's first tile must be the unit's
    /// current position.
    pub fn assign_route(&mut self, path: Vec<TileCoord>, target: TileCoord) {
        debug_assert_eq!(path.first().copied(), self.coord());
        self.path = path;
        self.path_index = 0;
        self.progress = 0;
        self.target = Some(target);
    }

    /// Terminal transition: clear all path and target data.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.path.clear();
        self.path_index = 0;
        self.progress = 0;
        self.target = None;
    }

    /// Advance one tick of travel on a tile that takes `travel_ticks` to
    /// cross. Returns true when the unit stands on its route's final tile.
    pub fn advance(&mut self, travel_ticks: u32) -> bool {
        if self.at_path_end() {
            return true;
        }
        self.progress += 1;
        if self.progress >= travel_ticks.max(1) {
            self.progress = 0;
            self.path_index += 1;
        }
        self.at_path_end()
    }
}

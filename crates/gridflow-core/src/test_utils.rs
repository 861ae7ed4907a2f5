//! Shared test fixtures for unit tests, integration tests, and downstream
//! crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! helpers serve `#[cfg(test)]` modules here and the integration-test crate
//! (via the `test-utils` feature).

use crate::coord::{Axis, Direction, TileCoord};
use crate::fixed::Fixed64;
use crate::tile::{ColorTag, PumpInfo, ResourceKind, TileAccess, TileInfo};
use std::collections::BTreeMap;

/// A programmable in-memory tile grid.
#[derive(Debug, Clone, Default)]
pub struct GridFixture {
    tiles: BTreeMap<TileCoord, TileInfo>,
}

impl GridFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a plain transport tile.
    pub fn transport(&mut self, kind: ResourceKind, coord: TileCoord) {
        self.tiles.insert(coord, TileInfo::transport(kind));
    }

    /// Place `len` transport tiles starting at `from`, walking `dir`.
    pub fn line(&mut self, kind: ResourceKind, from: TileCoord, dir: Direction, len: i32) {
        let mut coord = from;
        for _ in 0..len {
            self.transport(kind, coord);
            coord = coord.step(dir);
        }
    }

    /// Place a junction tile restricted to `axis`.
    pub fn junction(&mut self, kind: ResourceKind, coord: TileCoord, axis: Axis) {
        let mut info = TileInfo::transport(kind);
        info.junction = Some(axis);
        self.tiles.insert(coord, info);
    }

    /// Place a pump tile flowing in `direction`.
    pub fn pump(
        &mut self,
        kind: ResourceKind,
        coord: TileCoord,
        direction: Direction,
        stack_limit: u32,
        timer_max: u32,
    ) {
        let mut info = TileInfo::transport(kind);
        info.pump = Some(PumpInfo {
            direction,
            stack_limit,
            timer_max,
        });
        self.tiles.insert(coord, info);
    }

    /// Remove the tile at `coord`.
    pub fn remove(&mut self, coord: TileCoord) {
        self.tiles.remove(&coord);
    }

    pub fn set_travel(&mut self, coord: TileCoord, ticks: u32) {
        if let Some(info) = self.tiles.get_mut(&coord) {
            info.travel_ticks = ticks;
        }
    }

    pub fn set_color(&mut self, coord: TileCoord, color: ColorTag) {
        if let Some(info) = self.tiles.get_mut(&coord) {
            info.color = Some(color);
        }
    }

    pub fn set_capacity(&mut self, coord: TileCoord, capacity: Fixed64) {
        if let Some(info) = self.tiles.get_mut(&coord) {
            info.capacity = capacity;
        }
    }

    pub fn set_transfer_rate(&mut self, coord: TileCoord, rate: Fixed64) {
        if let Some(info) = self.tiles.get_mut(&coord) {
            info.transfer_rate = rate;
        }
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.contains_key(&coord)
    }
}

impl TileAccess for GridFixture {
    fn tile(&self, coord: TileCoord) -> Option<TileInfo> {
        self.tiles.get(&coord).copied()
    }
}

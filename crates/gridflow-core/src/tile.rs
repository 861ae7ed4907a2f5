//! Tile-grid collaborator interface.
//!
//! The engine never owns tile storage and never assumes a memory layout for
//! tile metadata. Everything it needs is read through [`TileAccess`], one
//! [`TileInfo`] snapshot per coordinate. Hosts adapt whatever representation
//! they use (chunked arrays, hash maps, ECS components) behind this trait.

use crate::coord::{Axis, Direction, TileCoord};
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// The three resource kinds a network can carry. Each network instance
/// filters on exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Items,
    Fluids,
    Power,
}

impl ResourceKind {
    /// The bit this kind occupies in a [`KindMask`].
    pub fn bit(self) -> u8 {
        match self {
            ResourceKind::Items => 0b001,
            ResourceKind::Fluids => 0b010,
            ResourceKind::Power => 0b100,
        }
    }

    /// Persistence filter byte. Stable across save versions.
    pub fn filter_byte(self) -> u8 {
        match self {
            ResourceKind::Items => 0,
            ResourceKind::Fluids => 1,
            ResourceKind::Power => 2,
        }
    }

    /// Decode a persistence filter byte. `None` for out-of-range values.
    pub fn from_filter_byte(byte: u8) -> Option<ResourceKind> {
        match byte {
            0 => Some(ResourceKind::Items),
            1 => Some(ResourceKind::Fluids),
            2 => Some(ResourceKind::Power),
            _ => None,
        }
    }
}

/// Bitset of resource kinds a tile (or machine) participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct KindMask(pub u8);

impl KindMask {
    pub const NONE: KindMask = KindMask(0);
    pub const ITEMS: KindMask = KindMask(0b001);
    pub const FLUIDS: KindMask = KindMask(0b010);
    pub const POWER: KindMask = KindMask(0b100);

    pub fn contains(self, kind: ResourceKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn with(self, kind: ResourceKind) -> KindMask {
        KindMask(self.0 | kind.bit())
    }
}

// ---------------------------------------------------------------------------
// Direction bitset
// ---------------------------------------------------------------------------

/// Bitset of sides on which a tile may connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirMask(pub u8);

impl DirMask {
    /// All four sides open.
    pub const ALL: DirMask = DirMask(0b1111);
    pub const NONE: DirMask = DirMask(0);

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    pub fn with(self, dir: Direction) -> DirMask {
        DirMask(self.0 | (1 << dir.index()))
    }
}

impl Default for DirMask {
    fn default() -> Self {
        DirMask::ALL
    }
}

// ---------------------------------------------------------------------------
// Tile metadata
// ---------------------------------------------------------------------------

/// Opaque color tag. Tiles with differing tags never link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTag(pub u8);

/// Pump metadata for a directional extraction tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpInfo {
    /// Flow direction: resource moves from the tile behind the pump, through
    /// the pump, onward in this direction. Traversal is one-way.
    pub direction: Direction,
    /// Maximum stack size extracted per cycle.
    pub stack_limit: u32,
    /// Cycle length in ticks. The countdown timer resets to this.
    pub timer_max: u32,
}

/// Everything the engine reads about one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInfo {
    /// Which resource kinds this tile carries.
    pub kinds: KindMask,
    /// Sides on which the tile may connect to a neighbor.
    pub connections: DirMask,
    /// Optional color tag; mismatched tags block linking.
    pub color: Option<ColorTag>,
    /// Ticks a payload spends crossing this tile. Always >= 1, which keeps
    /// the Manhattan heuristic admissible.
    pub travel_ticks: u32,
    /// This tile's contribution to its network's shared storage capacity
    /// (fluid volume, power charge).
    pub capacity: Fixed64,
    /// Power moved per tick through this tile.
    pub transfer_rate: Fixed64,
    /// Junction axis, when this tile only connects along one axis at a time.
    pub junction: Option<Axis>,
    /// Pump metadata, when this tile periodically extracts from a machine.
    pub pump: Option<PumpInfo>,
}

impl TileInfo {
    /// A plain transport tile for `kind` with unit travel time.
    pub fn transport(kind: ResourceKind) -> TileInfo {
        TileInfo {
            kinds: KindMask::NONE.with(kind),
            connections: DirMask::ALL,
            color: None,
            travel_ticks: 1,
            capacity: Fixed64::ZERO,
            transfer_rate: Fixed64::ZERO,
            junction: None,
            pump: None,
        }
    }
}

/// Read access to the tile grid. The engine reads through this on every
/// structural operation; it does not cache tile metadata.
pub trait TileAccess {
    /// Metadata for `coord`, or `None` when no tile exists there.
    fn tile(&self, coord: TileCoord) -> Option<TileInfo>;
}

// ---------------------------------------------------------------------------
// Link predicate
// ---------------------------------------------------------------------------

/// Whether two adjacent tiles belong to the same `kind` network.
///
/// This is the undirected membership predicate used by flood fill and
/// incremental maintenance: kind bit on both sides, open connection bits,
/// compatible colors, and junction axes that admit `dir`. Pump one-way
/// rules restrict *traversal*, not membership, and are enforced separately
/// in the search strategy.
pub fn links(from: &TileInfo, to: &TileInfo, dir: Direction, kind: ResourceKind) -> bool {
    if !from.kinds.contains(kind) || !to.kinds.contains(kind) {
        return false;
    }
    if !from.connections.contains(dir) || !to.connections.contains(dir.opposite()) {
        return false;
    }
    if let (Some(a), Some(b)) = (from.color, to.color)
        && a != b
    {
        return false;
    }
    if let Some(axis) = from.junction
        && !axis.contains(dir)
    {
        return false;
    }
    if let Some(axis) = to.junction
        && !axis.contains(dir)
    {
        return false;
    }
    true
}

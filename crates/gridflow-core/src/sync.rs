//! Replication message kinds.
//!
//! Clients hold a mirror of network state that only changes by applying
//! authoritative messages from the server; client-initiated topology changes
//! travel as requests and take effect when the server's result replicates
//! back. This module defines the message vocabulary and its wire encoding;
//! the transport itself (an ordered, reliable byte channel) lives outside
//! this engine.
//!
//! A full-network sync is six ordered segments: reset header, nodes, coarse
//! paths, coarse bounds, junctions, and the kind-specific extra block. The
//! receiver applies them in order against the instance named by the reset
//! header; referencing an unknown instance, or a filter mismatch between
//! packet and local instance, fails that sync operation only.

use crate::coarse::CoarseCell;
use crate::coord::{Axis, CellBounds, CellCoord, TileCoord};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Replication failures. Fatal to the single sync operation, not the
/// session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("referenced network {0} not found locally")]
    UnknownNetwork(u32),
    #[error("filter mismatch: packet carries {packet}, local instance is {local}")]
    FilterMismatch { packet: u8, local: u8 },
    #[error("message decoding failed: {0}")]
    Decode(String),
    #[error("message encoding failed: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Partial or full state of one in-flight transport unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSync {
    /// Position-only update for a unit both sides already know.
    Partial {
        slot: u32,
        path_index: u32,
        progress: u32,
    },
    /// Complete unit snapshot, encoded by the item specialization.
    Full { slot: u32, data: Vec<u8> },
}

/// Every message kind the engine's replication boundary speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Authoritative metadata for a single tile. The payload is the host's
    /// tile encoding; this engine treats it as opaque.
    TileSingle { coord: TileCoord, data: Vec<u8> },
    /// Metadata for a tile and its four neighbors in one message.
    TileDiamond {
        center: TileCoord,
        data: Vec<(TileCoord, Vec<u8>)>,
    },

    // Full-network sync, segment 1 of 6: drop local state for the instance
    // and prepare to receive the rest.
    NetworkReset { network: u32, filter: u8 },
    /// Segment 2 of 6: node + adjacency lists.
    NetworkNodes {
        network: u32,
        nodes: Vec<(TileCoord, Vec<TileCoord>)>,
    },
    /// Segment 3 of 6: coarse cells with their cached threshold paths.
    NetworkCoarsePaths {
        network: u32,
        cells: Vec<(CellCoord, CoarseCell)>,
    },
    /// Segment 4 of 6: coarse bounding information.
    NetworkCoarseBounds {
        network: u32,
        bounds: Option<CellBounds>,
    },
    /// Segment 5 of 6: junction coordinates with axes.
    NetworkJunctions {
        network: u32,
        junctions: Vec<(TileCoord, Axis)>,
    },
    /// Segment 6 of 6: kind-specific extra block.
    NetworkExtra { network: u32, data: Vec<u8> },

    /// Client request to place a network tile. Takes effect only when the
    /// server's resulting state replicates back.
    EntryPlaceRequest { coord: TileCoord, filter: u8 },
    /// Client request to remove a network tile.
    EntryRemoveRequest { coord: TileCoord, filter: u8 },

    /// One transport unit, partial or full.
    Unit { network: u32, unit: UnitSync },
    /// A pump's countdown timer.
    PumpTimer { coord: TileCoord, remaining: u32 },

    /// A machine entity appeared.
    MachinePlaced { coord: TileCoord },
    /// A machine entity disappeared.
    MachineRemoved { coord: TileCoord },
}

impl SyncMessage {
    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        bitcode::serialize(self).map_err(|e| SyncError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<SyncMessage, SyncError> {
        bitcode::deserialize(data).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

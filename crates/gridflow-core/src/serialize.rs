//! Persistence framing for network instances.
//!
//! Binary serialization via `bitcode` with a versioned header. Each network
//! persists as one [`NetworkRecord`]: a resource-kind filter byte, either a
//! seed coordinate (reconstructible networks) or a full node + adjacency
//! dump (networks whose contained quantity makes blind recomputation
//! unsafe), the junction list, and a kind-specific extra block the owning
//! specialization encodes on its own.
//!
//! A malformed record aborts loading *that instance only*: the load path
//! logs a warning and continues with the remaining records.

use crate::coord::{Axis, TileCoord};
use crate::tile::ResourceKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a Gridflow world save.
pub const SAVE_MAGIC: u32 = 0x6F10_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding a save.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur while decoding a save.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("resource-kind filter byte out of range: {0}")]
    BadFilter(u8),
}

// ---------------------------------------------------------------------------
// Save structure
// ---------------------------------------------------------------------------

/// Header prepended to every save. Enables format detection and version
/// checking before touching the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the save was taken.
    pub tick: u64,
}

impl SaveHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.magic != SAVE_MAGIC {
            return Err(LoadError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(LoadError::FutureVersion(self.version));
        }
        Ok(())
    }
}

/// How a network's structure is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkBody {
    /// A single seed; the network is rebuilt by flood fill on load.
    Seed(TileCoord),
    /// Full node + adjacency dump for networks that must not be blindly
    /// recomputed (fluids, whose contents depend on exact membership).
    Full(Vec<(TileCoord, Vec<TileCoord>)>),
}

/// One persisted network instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: u32,
    /// Resource-kind filter byte; validated on load.
    pub filter: u8,
    pub body: NetworkBody,
    /// Junction coordinates with their stored axes.
    pub junctions: Vec<(TileCoord, Axis)>,
    /// Kind-specific payload, encoded by the owning specialization:
    /// fluid/power storage snapshot, or the item network's adjacent
    /// inventories, pump timers, and in-flight transport units.
    pub extra: Vec<u8>,
}

impl NetworkRecord {
    /// The decoded resource kind, or an error for out-of-range bytes.
    pub fn kind(&self) -> Result<ResourceKind, LoadError> {
        ResourceKind::from_filter_byte(self.filter).ok_or(LoadError::BadFilter(self.filter))
    }
}

/// A complete world save: header plus one record per live network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSave {
    pub header: SaveHeader,
    pub records: Vec<NetworkRecord>,
}

impl WorldSave {
    pub fn new(tick: u64, records: Vec<NetworkRecord>) -> Self {
        Self {
            header: SaveHeader::new(tick),
            records,
        }
    }

    /// Filter to records of `kind` whose filter byte is valid, logging and
    /// skipping malformed ones instead of failing the whole load.
    pub fn records_of(&self, kind: ResourceKind) -> Vec<&NetworkRecord> {
        self.records
            .iter()
            .filter(|record| match record.kind() {
                Ok(k) => k == kind,
                Err(_) => {
                    warn!(
                        id = record.id,
                        filter = record.filter,
                        "skipping network record with invalid filter byte"
                    );
                    false
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode_world(save: &WorldSave) -> Result<Vec<u8>, SaveError> {
    bitcode::serialize(save).map_err(|e| SaveError::Encode(e.to_string()))
}

pub fn decode_world(data: &[u8]) -> Result<WorldSave, LoadError> {
    let save: WorldSave =
        bitcode::deserialize(data).map_err(|e| LoadError::Decode(e.to_string()))?;
    save.header.validate()?;
    Ok(save)
}

/// Encode a kind-specific extra block.
pub fn encode_extra<T: Serialize>(value: &T) -> Result<Vec<u8>, SaveError> {
    bitcode::serialize(value).map_err(|e| SaveError::Encode(e.to_string()))
}

/// Decode a kind-specific extra block.
pub fn decode_extra<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, LoadError> {
    bitcode::deserialize(data).map_err(|e| LoadError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// State hashing
// ---------------------------------------------------------------------------

/// FNV-1a over a byte slice. Used for cheap desync fingerprints.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Fingerprint any serializable state. Returns `None` if encoding fails.
pub fn state_hash<T: Serialize>(value: &T) -> Option<u64> {
    bitcode::serialize(value).ok().map(|bytes| fnv1a(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, filter: u8) -> NetworkRecord {
        NetworkRecord {
            id,
            filter,
            body: NetworkBody::Seed(TileCoord::new(0, 0)),
            junctions: Vec::new(),
            extra: Vec::new(),
        }
    }

    #[test]
    fn world_save_round_trip() {
        let save = WorldSave::new(
            42,
            vec![
                record(0, ResourceKind::Items.filter_byte()),
                NetworkRecord {
                    id: 1,
                    filter: ResourceKind::Fluids.filter_byte(),
                    body: NetworkBody::Full(vec![(
                        TileCoord::new(1, 2),
                        vec![TileCoord::new(1, 3)],
                    )]),
                    junctions: vec![(TileCoord::new(1, 3), Axis::Vertical)],
                    extra: vec![1, 2, 3],
                },
            ],
        );
        let bytes = encode_world(&save).expect("encode save");
        let restored = decode_world(&bytes).expect("decode save");
        assert_eq!(restored.header.tick, 42);
        assert_eq!(restored.records, save.records);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut save = WorldSave::new(0, Vec::new());
        save.header.magic = 0xDEAD_BEEF;
        let bytes = encode_world(&save).unwrap();
        assert!(matches!(
            decode_world(&bytes),
            Err(LoadError::InvalidMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut save = WorldSave::new(0, Vec::new());
        save.header.version = FORMAT_VERSION + 1;
        let bytes = encode_world(&save).unwrap();
        assert!(matches!(
            decode_world(&bytes),
            Err(LoadError::FutureVersion(_))
        ));
    }

    #[test]
    fn garbage_bytes_fail_decode() {
        assert!(matches!(
            decode_world(&[0xFF, 0x01, 0x02]),
            Err(LoadError::Decode(_))
        ));
    }

    #[test]
    fn invalid_filter_byte_skips_that_record_only() {
        let save = WorldSave::new(
            0,
            vec![
                record(0, ResourceKind::Items.filter_byte()),
                record(1, 99),
                record(2, ResourceKind::Items.filter_byte()),
            ],
        );
        let items = save.records_of(ResourceKind::Items);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|r| r.id != 1));
        assert!(matches!(
            save.records[1].kind(),
            Err(LoadError::BadFilter(99))
        ));
    }

    #[test]
    fn extra_block_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Extra {
            timers: Vec<(TileCoord, u32)>,
        }
        let extra = Extra {
            timers: vec![(TileCoord::new(4, 4), 17)],
        };
        let bytes = encode_extra(&extra).unwrap();
        let restored: Extra = decode_extra(&bytes).unwrap();
        assert_eq!(restored, extra);
    }

    #[test]
    fn fnv_is_stable_and_input_sensitive() {
        let a = fnv1a(b"gridflow");
        let b = fnv1a(b"gridflow");
        let c = fnv1a(b"gridflOw");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn state_hash_detects_divergence() {
        let a = state_hash(&vec![1u32, 2, 3]).unwrap();
        let b = state_hash(&vec![1u32, 2, 4]).unwrap();
        assert_ne!(a, b);
    }
}

//! Gridflow Core -- resource-network maintenance and hierarchical
//! pathfinding over a 2D tile grid.
//!
//! Networks are connected components of same-kind tiles (items, fluids,
//! power) that players mutate tile-by-tile. This crate keeps per-network
//! connectivity correct and cheap to update as the grid changes, and
//! answers point-to-point shortest-path queries fast enough to run every
//! simulation tick.
//!
//! # Data Flow
//!
//! 1. **Tile mutation** -- the host places or removes a tile and calls
//!    [`registry::NetworkRegistry::place`] / `remove`.
//! 2. **Incremental update** -- the owning [`network::NetworkGraph`] patches
//!    adjacency on the changed tile and its neighbors; merges and splits are
//!    resolved by the registry (lowest id survives a merge, every split
//!    fragment is reseeded).
//! 3. **Coarse cache** -- the cells whose boundaries may have moved are
//!    recomputed eagerly: threshold tiles rediscovered, intra-cell paths
//!    re-searched via [`search`].
//! 4. **Queries** -- resource simulations ask [`pathfinder`] for routes;
//!    same-cell queries hit the fine search, cross-cell queries stitch
//!    cached threshold segments.
//!
//! # Key Types
//!
//! - [`network::NetworkGraph`] -- one connected component: nodes, junctions,
//!   coarse cells, incremental maintenance.
//! - [`registry::NetworkRegistry`] -- all live instances of one kind;
//!   [`registry::ResourceNetwork`] is the policy trait specializations
//!   implement.
//! - [`search::SearchStrategy`] / [`search::find_path`] -- fine-grained
//!   best-first search with junction, pump, and color rules.
//! - [`coarse::Threshold`] -- cached boundary-to-boundary path segments.
//! - [`storage::ResourceStorage`] -- clamped quantity container with
//!   conservation-preserving transfers.
//! - [`serialize`] -- versioned bitcode persistence framing.
//! - [`sync`] -- replication message vocabulary (transport lives outside).
//!
//! The host simulation advances on a single authoritative logic thread; all
//! mutation and every query runs synchronously inside the tick that
//! triggers it, so nothing here locks, suspends, or cancels.

pub mod coarse;
pub mod config;
pub mod coord;
pub mod fixed;
pub mod item;
pub mod machine;
pub mod network;
pub mod pathfinder;
pub mod registry;
pub mod search;
pub mod serialize;
pub mod storage;
pub mod sync;
pub mod tile;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

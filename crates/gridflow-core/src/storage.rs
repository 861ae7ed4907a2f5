//! Shared resource storage with conservation semantics.
//!
//! Fluid and power networks hold quantity in a [`ResourceStorage`]. All
//! mutators clamp: quantity never goes negative and never exceeds capacity,
//! so the capacity invariant is unreachable by construction rather than
//! checked. Transfers between two storages conserve quantity -- whatever the
//! destination rejects flows back into the source.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Identifies a fluid kind carried by a fluid network. Power storages leave
/// the tag unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FluidKind(pub u32);

/// A clamped quantity container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStorage {
    current: Fixed64,
    max: Fixed64,
    fluid: Option<FluidKind>,
}

impl ResourceStorage {
    /// An empty storage with the given capacity (clamped to >= 0).
    pub fn new(max: Fixed64) -> Self {
        Self {
            current: Fixed64::ZERO,
            max: max.max(Fixed64::ZERO),
            fluid: None,
        }
    }

    pub fn current(&self) -> Fixed64 {
        self.current
    }

    pub fn max(&self) -> Fixed64 {
        self.max
    }

    /// The fluid kind currently held. Always `None` when empty.
    pub fn fluid_kind(&self) -> Option<FluidKind> {
        self.fluid
    }

    /// Remaining headroom.
    pub fn free(&self) -> Fixed64 {
        self.max - self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current == Fixed64::ZERO
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Replace the capacity, clamping the held quantity down if needed.
    pub fn set_max(&mut self, max: Fixed64) {
        self.max = max.max(Fixed64::ZERO);
        if self.current > self.max {
            self.current = self.max;
        }
        if self.current == Fixed64::ZERO {
            self.fluid = None;
        }
    }

    /// Grow (or shrink, with a negative delta) the capacity.
    pub fn adjust_max(&mut self, delta: Fixed64) {
        self.set_max(self.max + delta);
    }

    /// Whether an import of `kind` would be type-compatible.
    pub fn accepts_kind(&self, kind: Option<FluidKind>) -> bool {
        match (self.fluid, kind) {
            (Some(held), Some(incoming)) => held == incoming,
            _ => true,
        }
    }

    /// Take up to `amount` out of the storage. Returns the quantity actually
    /// exported. Zero or negative requests are no-ops.
    pub fn export(&mut self, amount: Fixed64) -> Fixed64 {
        if amount <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let taken = amount.min(self.current);
        self.current -= taken;
        if self.current == Fixed64::ZERO {
            self.fluid = None;
        }
        taken
    }

    /// Put up to `amount` of `kind` into the storage. Returns the quantity
    /// actually accepted: zero when the kind is incompatible, the storage is
    /// full, or the request is non-positive.
    pub fn import(&mut self, kind: Option<FluidKind>, amount: Fixed64) -> Fixed64 {
        if amount <= Fixed64::ZERO || !self.accepts_kind(kind) {
            return Fixed64::ZERO;
        }
        let accepted = amount.min(self.free());
        if accepted > Fixed64::ZERO {
            self.current += accepted;
            if self.fluid.is_none() {
                self.fluid = kind;
            }
        }
        accepted
    }

    /// Merge another storage into this one: capacities and contents add.
    /// Contents of an incompatible fluid kind are discarded (clamp rule:
    /// quantity is never negative, never over max, and never changes type
    /// mid-fill).
    pub fn merge(&mut self, other: &ResourceStorage) {
        self.max += other.max;
        if self.accepts_kind(other.fluid) {
            let _ = self.import(other.fluid, other.current);
        }
    }
}

/// Move up to `amount` from `source` into `dest`, conserving quantity.
///
/// Exports clamp to availability; imports clamp to headroom and kind
/// compatibility; anything the destination rejects is re-imported into the
/// source. Returns the quantity that actually moved.
pub fn transfer(source: &mut ResourceStorage, dest: &mut ResourceStorage, amount: Fixed64) -> Fixed64 {
    if amount <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let kind = source.fluid_kind();
    let exported = source.export(amount);
    if exported == Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let accepted = dest.import(kind, exported);
    let rejected = exported - accepted;
    if rejected > Fixed64::ZERO {
        // The source just held this quantity; re-import cannot lose any.
        let _ = source.import(kind, rejected);
    }
    accepted
}

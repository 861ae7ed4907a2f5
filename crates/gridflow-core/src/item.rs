//! Item stacks and coordinate-keyed inventories.
//!
//! Item networks move [`ItemStack`]s between [`Inventory`] instances owned
//! by machine entities. Inventories clamp on insert and extract; callers
//! inspect the returned counts rather than handling errors.

use serde::{Deserialize, Serialize};

/// Identifies an item kind. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKindId(pub u32);

/// A stack of fungible items of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKindId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKindId, quantity: u32) -> Self {
        Self { kind, quantity }
    }
}

/// A machine inventory: per-kind stacks under a shared total capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    stacks: Vec<ItemStack>,
    capacity: u32,
}

impl Inventory {
    pub fn new(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    /// Total items across all kinds.
    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.quantity).sum()
    }

    /// Quantity of one kind.
    pub fn quantity(&self, kind: ItemKindId) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    /// Remaining space.
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.total())
    }

    pub fn has_space(&self) -> bool {
        self.free() > 0
    }

    /// Insert a stack. Returns the quantity that did not fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn insert(&mut self, stack: ItemStack) -> u32 {
        let to_add = stack.quantity.min(self.free());
        let overflow = stack.quantity - to_add;
        if to_add > 0 {
            if let Some(existing) = self.stacks.iter_mut().find(|s| s.kind == stack.kind) {
                existing.quantity += to_add;
            } else {
                self.stacks.push(ItemStack::new(stack.kind, to_add));
            }
        }
        overflow
    }

    /// Extract up to `max` items of the first non-empty kind. Returns `None`
    /// when the inventory is empty.
    pub fn extract(&mut self, max: u32) -> Option<ItemStack> {
        if max == 0 {
            return None;
        }
        let stack = self.stacks.iter_mut().find(|s| s.quantity > 0)?;
        let taken = stack.quantity.min(max);
        stack.quantity -= taken;
        let kind = stack.kind;
        self.stacks.retain(|s| s.quantity > 0);
        Some(ItemStack::new(kind, taken))
    }

    /// Extract up to `max` items of a specific kind. Returns the quantity
    /// actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn extract_kind(&mut self, kind: ItemKindId, max: u32) -> u32 {
        let Some(stack) = self.stacks.iter_mut().find(|s| s.kind == kind) else {
            return 0;
        };
        let taken = stack.quantity.min(max);
        stack.quantity -= taken;
        self.stacks.retain(|s| s.quantity > 0);
        taken
    }
}

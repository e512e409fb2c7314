//! Carried items and equipped items.

use crate::catalog::BodyPart;
use shared::ItemId;
use std::collections::BTreeMap;

/// Item id to quantity, limited to `slots` distinct ids and `ceiling` per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    items: BTreeMap<ItemId, u32>,
    slots: usize,
    ceiling: u32,
}

impl Inventory {
    pub fn new(slots: usize, ceiling: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            slots,
            ceiling,
        }
    }

    pub fn quantity(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn has_free_slot(&self) -> bool {
        self.items.len() < self.slots
    }

    /// How many units of `item` could be accepted right now.
    pub fn room_for(&self, item: &str) -> u32 {
        let held = self.quantity(item);
        if held == 0 && !self.has_free_slot() {
            return 0;
        }
        self.ceiling.saturating_sub(held)
    }

    /// Accepts up to `quantity` and returns the amount taken.
    pub fn add(&mut self, item: &str, quantity: u32) -> u32 {
        let accepted = quantity.min(self.room_for(item));
        if accepted > 0 {
            *self.items.entry(item.to_string()).or_insert(0) += accepted;
        }
        accepted
    }

    /// Removes exactly `quantity`, or nothing when fewer are held.
    /// Returns the quantity left afterwards.
    pub fn remove(&mut self, item: &str, quantity: u32) -> Option<u32> {
        let held = self.quantity(item);
        if quantity == 0 || held < quantity {
            return None;
        }
        let left = held - quantity;
        if left == 0 {
            self.items.remove(item);
        } else {
            self.items.insert(item.to_string(), left);
        }
        Some(left)
    }

    pub fn take_all(&mut self) -> Vec<(ItemId, u32)> {
        std::mem::take(&mut self.items).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &u32)> {
        self.items.iter()
    }
}

/// At most one item per body part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Equipment {
    slots: BTreeMap<BodyPart, ItemId>,
}

impl Equipment {
    /// Equips `item` on `part`, returning whatever was there before.
    pub fn equip(&mut self, part: BodyPart, item: &str) -> Option<ItemId> {
        self.slots.insert(part, item.to_string())
    }

    pub fn unequip(&mut self, item: &str) -> Option<BodyPart> {
        let part = self
            .slots
            .iter()
            .find(|(_, equipped)| equipped.as_str() == item)
            .map(|(part, _)| *part)?;
        self.slots.remove(&part);
        Some(part)
    }

    pub fn is_equipped(&self, item: &str) -> bool {
        self.slots.values().any(|equipped| equipped == item)
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.slots.values().cloned().collect()
    }

    pub fn in_slot(&self, part: BodyPart) -> Option<&ItemId> {
        self.slots.get(&part)
    }
}

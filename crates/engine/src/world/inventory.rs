use thiserror::Error;

use super::entity::EntityKind;

/// Slot count of the player's inventory bar.
pub const DEFAULT_INVENTORY_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub item: EntityKind,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error(
        "inventory full: placing {requested} {item} needs {needed_slots} new slot(s), {free_slots} free"
    )]
    Full {
        item: EntityKind,
        requested: u32,
        needed_slots: u64,
        free_slots: usize,
    },
    #[error("not enough {item}: requested {requested}, holding {available}")]
    ItemNotFound {
        item: EntityKind,
        requested: u32,
        available: u64,
    },
}

/// Fixed-capacity slotted stack container.
///
/// Every slot holds `1..=item.max_stack_size()` units. Both mutating
/// operations check feasibility first and leave the slots untouched on error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    max_slots: usize,
    slots: Vec<ItemStack>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_SLOTS)
    }
}

impl Inventory {
    pub fn new(max_slots: usize) -> Self {
        Self {
            max_slots,
            slots: Vec::new(),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        self.max_slots.saturating_sub(self.slots.len())
    }

    pub fn slots(&self) -> &[ItemStack] {
        &self.slots
    }

    /// `(item, quantity)` pairs in slot order.
    pub fn items(&self) -> impl Iterator<Item = (EntityKind, u32)> + '_ {
        self.slots.iter().map(|slot| (slot.item, slot.quantity))
    }

    pub fn total_of(&self, item: EntityKind) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.item == item)
            .map(|slot| u64::from(slot.quantity))
            .sum()
    }

    /// Tops up existing stacks of `item` in slot order, then opens new slots
    /// for whatever is left.
    pub fn add_item(&mut self, item: EntityKind, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Ok(());
        }
        let max_stack = item.max_stack_size().max(1);

        let headroom: u64 = self
            .slots
            .iter()
            .filter(|slot| slot.item == item)
            .map(|slot| u64::from(max_stack.saturating_sub(slot.quantity)))
            .sum();
        let overflow = u64::from(quantity).saturating_sub(headroom);
        let needed_slots = overflow.div_ceil(u64::from(max_stack));
        let free_slots = self.free_slots();
        if needed_slots > free_slots as u64 {
            return Err(InventoryError::Full {
                item,
                requested: quantity,
                needed_slots,
                free_slots,
            });
        }

        let mut remaining = quantity;
        for slot in self.slots.iter_mut().filter(|slot| slot.item == item) {
            if remaining == 0 {
                break;
            }
            let taken = max_stack.saturating_sub(slot.quantity).min(remaining);
            slot.quantity += taken;
            remaining -= taken;
        }
        while remaining > 0 {
            let taken = remaining.min(max_stack);
            self.slots.push(ItemStack {
                item,
                quantity: taken,
            });
            remaining -= taken;
        }
        Ok(())
    }

    /// Drains stacks of `item` in slot order; emptied slots are removed.
    pub fn remove_item(&mut self, item: EntityKind, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Ok(());
        }
        let available = self.total_of(item);
        if available < u64::from(quantity) {
            return Err(InventoryError::ItemNotFound {
                item,
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        self.slots.retain_mut(|slot| {
            if remaining == 0 || slot.item != item {
                return true;
            }
            let taken = slot.quantity.min(remaining);
            slot.quantity -= taken;
            remaining -= taken;
            slot.quantity > 0
        });
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a ItemStack;
    type IntoIter = std::slice::Iter<'a, ItemStack>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

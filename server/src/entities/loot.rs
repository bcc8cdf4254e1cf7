//! Corpse loot.

use rand::Rng;
use realm_shared::LootEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootItem {
    pub item_id: u32,
    pub quantity: u32,
}

/// Loot held by a corpse and who may take it
#[derive(Debug, Clone, Default)]
pub struct Loot {
    items: Vec<LootItem>,
    recipient: Option<u64>,
}

impl Loot {
    /// Roll every table entry against its drop chance
    pub fn roll<R: Rng + ?Sized>(table: &[LootEntry], recipient: Option<u64>, rng: &mut R) -> Self {
        let mut items = Vec::new();
        for entry in table {
            if !rng.gen_bool(entry.drop_chance.clamp(0.0, 1.0) as f64) {
                continue;
            }
            let low = entry.min_quantity.min(entry.max_quantity).max(1);
            let high = entry.max_quantity.max(low);
            items.push(LootItem {
                item_id: entry.item_id,
                quantity: rng.gen_range(low..=high),
            });
        }

        Self { items, recipient }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recipient = None;
    }

    pub fn items(&self) -> &[LootItem] {
        &self.items
    }

    pub fn recipient(&self) -> Option<u64> {
        self.recipient
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

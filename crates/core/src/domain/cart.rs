use serde::{Deserialize, Serialize};

use crate::domain::unit::Unit;

/// Decimal places kept when quantities are summed.
pub const QUANTITY_PRECISION: i32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
}

impl Item {
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.quantity, self.unit, self.name)
    }
}

/// Ordered cart lines, unique by normalized name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<Item>,
}

impl Cart {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Item> {
        let wanted = normalize_name(name);
        self.items.iter().find(|item| normalize_name(&item.name) == wanted)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Item> {
        let wanted = normalize_name(name);
        self.items.iter_mut().find(|item| normalize_name(&item.name) == wanted)
    }

    /// Appends `item`, replacing any line that already carries the same name.
    pub fn upsert(&mut self, item: Item) {
        match self.find_mut(&item.name) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Removes every line matching `name`; returns whether anything was removed.
    pub fn remove_named(&mut self, name: &str) -> bool {
        let wanted = normalize_name(name);
        let before = self.items.len();
        self.items.retain(|item| normalize_name(&item.name) != wanted);
        self.items.len() < before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Inline rendering used in prompts, e.g. `5 kg rice, 1 litre oil`.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "empty".to_string();
        }
        self.items.iter().map(Item::describe).collect::<Vec<_>>().join(", ")
    }
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn round_quantity(quantity: f64) -> f64 {
    let factor = 10f64.powi(QUANTITY_PRECISION);
    (quantity * factor).round() / factor
}

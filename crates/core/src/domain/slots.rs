use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::cart::Item;
use crate::domain::unit::Unit;
use crate::parser::ParseResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Name,
    Quantity,
    Unit,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Quantity => "quantity",
            Self::Unit => "unit",
        })
    }
}

/// How many times each slot has been asked for since the buffer was last cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskCounts {
    pub name: u32,
    pub quantity: u32,
    pub unit: u32,
}

impl AskCounts {
    pub fn get(&self, slot: Slot) -> u32 {
        match slot {
            Slot::Name => self.name,
            Slot::Quantity => self.quantity,
            Slot::Unit => self.unit,
        }
    }

    /// Records one more ask and returns the count before it.
    pub fn bump(&mut self, slot: Slot) -> u32 {
        let counter = match slot {
            Slot::Name => &mut self.name,
            Slot::Quantity => &mut self.quantity,
            Slot::Unit => &mut self.unit,
        };
        let previous = *counter;
        *counter = counter.saturating_add(1);
        previous
    }
}

/// A single item being negotiated before it reaches the cart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendingItem {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub is_accumulate: bool,
    pub is_update: bool,
    pub ask_counts: AskCounts,
}

impl PendingItem {
    /// Fills only empty slots; flags are sticky.
    pub fn merge(&mut self, parsed: &ParseResult) {
        if self.name.is_none() {
            self.name = parsed.name.clone();
        }
        if self.quantity.is_none() {
            self.quantity = parsed.quantity;
        }
        if self.unit.is_none() {
            self.unit = parsed.unit;
        }
        self.is_accumulate |= parsed.is_accumulate;
        self.is_update |= parsed.is_update;
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.quantity.is_some() && self.unit.is_some()
    }

    pub fn missing_slots(&self) -> Vec<Slot> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push(Slot::Name);
        }
        if self.quantity.is_none() {
            missing.push(Slot::Quantity);
        }
        if self.unit.is_none() {
            missing.push(Slot::Unit);
        }
        missing
    }

    pub fn next_missing(&self) -> Option<Slot> {
        self.missing_slots().into_iter().next()
    }

    pub fn to_item(&self) -> Option<Item> {
        Some(Item { name: self.name.clone()?, quantity: self.quantity?, unit: self.unit? })
    }
}

/// What the conversation is currently negotiating.
///
/// `OrderConfirmation` means the caller is being asked to confirm the whole
/// cart rather than a single item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SlotBufferRecord", into = "SlotBufferRecord")]
pub enum SlotBuffer {
    Item(PendingItem),
    OrderConfirmation,
}

impl Default for SlotBuffer {
    fn default() -> Self {
        Self::Item(PendingItem::default())
    }
}

impl SlotBuffer {
    pub fn merge(&mut self, parsed: &ParseResult) {
        if self.is_order_confirmation() {
            self.clear();
        }
        if let Self::Item(item) = self {
            item.merge(parsed);
        }
    }

    pub fn force_update_flag(&mut self) {
        if let Self::Item(item) = self {
            item.is_update = true;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending_item().is_some_and(PendingItem::is_complete)
    }

    pub fn missing_slots(&self) -> Vec<Slot> {
        self.pending_item().map(PendingItem::missing_slots).unwrap_or_default()
    }

    pub fn next_missing(&self) -> Option<Slot> {
        self.pending_item().and_then(PendingItem::next_missing)
    }

    /// Records an ask for `slot` and returns how many times it was asked before.
    pub fn record_ask(&mut self, slot: Slot) -> u32 {
        match self {
            Self::Item(item) => item.ask_counts.bump(slot),
            Self::OrderConfirmation => 0,
        }
    }

    pub fn pending_item(&self) -> Option<&PendingItem> {
        match self {
            Self::Item(item) => Some(item),
            Self::OrderConfirmation => None,
        }
    }

    pub fn is_order_confirmation(&self) -> bool {
        matches!(self, Self::OrderConfirmation)
    }

    pub fn begin_order_confirmation(&mut self) {
        *self = Self::OrderConfirmation;
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Item(item) => *item == PendingItem::default(),
            Self::OrderConfirmation => false,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotBufferRecord {
    name: Option<String>,
    quantity: Option<f64>,
    unit: Option<Unit>,
    #[serde(default)]
    is_accumulate: bool,
    #[serde(default)]
    is_update: bool,
    #[serde(default)]
    pending_order_confirmation: bool,
    #[serde(default)]
    ask_counts: AskCounts,
}

impl From<SlotBufferRecord> for SlotBuffer {
    fn from(record: SlotBufferRecord) -> Self {
        if record.pending_order_confirmation {
            return Self::OrderConfirmation;
        }
        Self::Item(PendingItem {
            name: record.name,
            quantity: record.quantity,
            unit: record.unit,
            is_accumulate: record.is_accumulate,
            is_update: record.is_update,
            ask_counts: record.ask_counts,
        })
    }
}

impl From<SlotBuffer> for SlotBufferRecord {
    fn from(buffer: SlotBuffer) -> Self {
        match buffer {
            SlotBuffer::Item(item) => Self {
                name: item.name,
                quantity: item.quantity,
                unit: item.unit,
                is_accumulate: item.is_accumulate,
                is_update: item.is_update,
                pending_order_confirmation: false,
                ask_counts: item.ask_counts,
            },
            SlotBuffer::OrderConfirmation => {
                Self { pending_order_confirmation: true, ..Self::default() }
            }
        }
    }
}

//! Cart collaborator contract and the in-memory reference implementation.
//!
//! The cart is mutated only from the dispatch step of the session engine,
//! never from the gateway or timers.

use crate::menu::Menu;
use crate::nlu::OrderItem;
use serde::{Deserialize, Serialize};

/// One priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: OrderItem,
    /// Unit price in won after size and extras adjustments.
    pub unit_price: u32,
    /// `unit_price * quantity`.
    pub line_total: u32,
}

/// Mutable collection of order lines.
pub trait Cart: Send {
    /// Add an item, merging with an existing line that has the same name
    /// and options.
    fn add_item(&mut self, item: OrderItem, unit_price: u32);
    /// Remove the most recently added line, returning it if present.
    fn remove_last(&mut self) -> Option<CartLine>;
    /// Remove every line.
    fn clear(&mut self);
    /// Snapshot of the current lines, oldest first.
    fn items(&self) -> Vec<CartLine>;
    /// Sum of all line totals in won.
    fn total(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// In-memory cart with the kiosk merge rule: a newly added item folds into
/// an existing line when name, size, temperature and options all match.
#[derive(Debug, Default)]
pub struct MemoryCart {
    lines: Vec<CartLine>,
}

impl MemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: price an item against the menu and add it.
    pub fn add_priced(&mut self, menu: &Menu, item: OrderItem) {
        let unit_price = menu
            .find(&item.name)
            .map(|entry| menu.unit_price(entry, item.size, &item.options))
            .unwrap_or(item.price);
        self.add_item(item, unit_price);
    }
}

fn same_line(line: &CartLine, item: &OrderItem) -> bool {
    line.item.name == item.name
        && line.item.size == item.size
        && line.item.temperature == item.temperature
        && line.item.options == item.options
}

impl Cart for MemoryCart {
    fn add_item(&mut self, item: OrderItem, unit_price: u32) {
        if let Some(line) = self.lines.iter_mut().find(|line| same_line(line, &item)) {
            line.item.quantity = line.item.quantity.saturating_add(item.quantity);
            line.line_total = line.unit_price.saturating_mul(line.item.quantity);
            return;
        }
        let line_total = unit_price.saturating_mul(item.quantity);
        self.lines.push(CartLine {
            item,
            unit_price,
            line_total,
        });
    }

    fn remove_last(&mut self) -> Option<CartLine> {
        self.lines.pop()
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn items(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    fn total(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |acc, line| acc.saturating_add(line.line_total))
    }
}

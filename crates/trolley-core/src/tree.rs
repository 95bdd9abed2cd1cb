//! # Item Tree
//!
//! The content of one cart instance: top-level rows in insertion order, each
//! owning its own subtree of sub-items.
//!
//! ## Lookup and Flattening
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ItemTree                                                               │
//! │  ├── A  (Hamburger)                                                     │
//! │  │   ├── A1  (Extra Bacon)                                              │
//! │  │   └── A2  (Sauce)                                                    │
//! │  │        └── A2a (Chili)                                               │
//! │  └── B  (Fries)                                                         │
//! │                                                                         │
//! │  find("A2a")        top level first, then each subtree depth-first      │
//! │  origin("A2a")      → A2 (the direct owner)                             │
//! │  flatten()          → [A, A1, A2, A2a, B]                               │
//! │                                                                         │
//! │  count / subtotal / tax / total are all computed over flatten(),        │
//! │  so sub-items are paid for like any other row.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A row id appears at most once in the whole tree. The tree itself does not
//! police that on [`ItemTree::put`]; the session checks before inserting.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::item::Item;
use crate::money::Money;
use crate::types::CartTotals;

/// Ordered collection of top-level items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTree {
    items: Vec<Item>,
}

impl ItemTree {
    pub fn new() -> Self {
        ItemTree { items: Vec::new() }
    }

    /// Number of top-level rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Top-level rows in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Top-level row by id. Does not look into sub-items.
    pub fn get(&self, row_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.row_id() == row_id)
    }

    pub fn get_mut(&mut self, row_id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.row_id() == row_id)
    }

    /// Whether `row_id` is a top-level row.
    pub fn is_top_level(&self, row_id: &str) -> bool {
        self.get(row_id).is_some()
    }

    /// Finds an item at any depth.
    pub fn find(&self, row_id: &str) -> Option<&Item> {
        self.get(row_id)
            .or_else(|| self.items.iter().find_map(|i| i.find(row_id)))
    }

    pub fn find_mut(&mut self, row_id: &str) -> Option<&mut Item> {
        let index = self.items.iter().position(|i| i.contains(row_id))?;
        self.items[index].find_mut(row_id)
    }

    /// Existence check at any depth.
    pub fn has(&self, row_id: &str) -> bool {
        self.items.iter().any(|i| i.contains(row_id))
    }

    /// The item that directly owns the sub-item `row_id`.
    ///
    /// `None` for top-level rows and unknown ids.
    pub fn find_sub_item_origin(&self, row_id: &str) -> Option<&Item> {
        self.items.iter().find_map(|i| i.find_owner(row_id))
    }

    pub fn find_sub_item_origin_mut(&mut self, row_id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find_map(|i| i.find_owner_mut(row_id))
    }

    /// Top-level rows matching `predicate`. Sub-items are not searched.
    pub fn search<F>(&self, mut predicate: F) -> Vec<&Item>
    where
        F: FnMut(&Item) -> bool,
    {
        self.items.iter().filter(|i| predicate(i)).collect()
    }

    // =========================================================================
    // Flattening
    // =========================================================================

    /// Every item, each top-level row immediately followed by its
    /// descendants (depth-first).
    pub fn flatten(&self) -> Vec<&Item> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            out.push(item);
            item.collect_descendants(&mut out);
        }
        out
    }

    /// Every nested item at any depth, without the top-level rows.
    pub fn sub_items(&self) -> Vec<&Item> {
        let mut out = Vec::new();
        for item in &self.items {
            item.collect_descendants(&mut out);
        }
        out
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Inserts a top-level row, replacing one with the same row id in place.
    ///
    /// Returns the replaced row, if any.
    pub fn put(&mut self, mut item: Item) -> Option<Item> {
        item.set_is_sub_item(false);
        match self.get_mut(item.row_id()) {
            Some(slot) => Some(std::mem::replace(slot, item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    /// Removes a top-level row.
    pub fn remove(&mut self, row_id: &str) -> Option<Item> {
        let index = self.items.iter().position(|i| i.row_id() == row_id)?;
        Some(self.items.remove(index))
    }

    /// Removes `row_id` from wherever it lives.
    pub fn detach(&mut self, row_id: &str) -> Option<Item> {
        if self.is_top_level(row_id) {
            return self.remove(row_id);
        }
        self.find_sub_item_origin_mut(row_id)?
            .remove_sub_item(row_id)
    }

    /// Puts `item` where `row_id` currently lives.
    ///
    /// Top-level rows are overwritten in place. Sub-items are detached from
    /// their owner and re-attached, which also covers a changed row id.
    /// Returns `Ok(false)` when `row_id` is not in the tree.
    pub fn replace(&mut self, row_id: &str, item: Item) -> CoreResult<bool> {
        if let Some(index) = self.items.iter().position(|i| i.row_id() == row_id) {
            let mut item = item;
            item.set_is_sub_item(false);
            self.items[index] = item;
            return Ok(true);
        }

        match self.find_sub_item_origin_mut(row_id) {
            Some(owner) => {
                owner.remove_sub_item(row_id);
                owner.add_sub_item(item)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Sum of quantities over every item at every depth.
    pub fn count(&self) -> i64 {
        self.flatten()
            .iter()
            .fold(0i64, |acc, i| acc.saturating_add(i.quantity()))
    }

    pub fn subtotal(&self) -> Money {
        self.flatten().iter().map(|i| i.subtotal()).sum()
    }

    pub fn tax(&self) -> Money {
        self.flatten()
            .iter()
            .map(|i| i.tax().multiply_quantity(i.quantity()))
            .sum()
    }

    pub fn total(&self) -> Money {
        self.flatten().iter().map(|i| i.total()).sum()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

impl<'a> IntoIterator for &'a ItemTree {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Item> for ItemTree {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        let mut tree = ItemTree::new();
        for item in iter {
            tree.put(item);
        }
        tree
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Domain Types
//!
//! Small value types shared by items, the tree and the session layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │   CartTotals    │   │     Item        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  (item.rs)      │       │
//! │  │  bps (u32)      │   │  row_count      │   │                 │       │
//! │  │  1900 = 19%     │   │  count          │   │  row_id, id     │       │
//! │  └─────────────────┘   │  subtotal       │   │  price, qty     │       │
//! │                        │  tax, total     │   │  sub_items      │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::tree::ItemTree;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1900 bps = 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (`19.0` = 19%).
    ///
    /// Negative input clamps to zero.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Aggregate summary of a whole tree, sub-items included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Number of top-level rows.
    pub row_count: usize,
    /// Sum of quantities over every item at every depth.
    pub count: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl From<&ItemTree> for CartTotals {
    fn from(tree: &ItemTree) -> Self {
        let mut totals = CartTotals {
            row_count: tree.len(),
            ..CartTotals::default()
        };

        for item in tree.flatten() {
            totals.count = totals.count.saturating_add(item.quantity());
            totals.subtotal += item.subtotal();
            totals.tax += item.tax().multiply_quantity(item.quantity());
            totals.total += item.total();
        }

        totals
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

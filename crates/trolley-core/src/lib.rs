//! # trolley-core: Pure Cart Logic
//!
//! Items, row identity, the nested item tree and every cart calculation.
//! Nothing in this crate touches a store, an event bus or the file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Trolley Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host application                                │   │
//! │  │      session store  •  event bus  •  model lookup               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ traits                                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               trolley-session (CartSession)                     │   │
//! │  │        load tree → mutate → store tree → publish event          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ trolley-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  hasher   │  │   item    │  │   tree    │  │   money   │  │   │
//! │  │   │ RowHasher │  │   Item    │  │ ItemTree  │  │  Money    │  │   │
//! │  │   │ Content.. │  │ options   │  │ flatten   │  │  TaxRate  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORE • NO EVENTS • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`hasher`] - Row id strategies and their factory
//! - [`options`] - Item option maps and canonicalization
//! - [`item`] - The `Item` entity with its sub-item subtree
//! - [`tree`] - `ItemTree`: lookup, flattening, aggregates
//! - [`money`] - Integer money
//! - [`types`] - `TaxRate`, `CartTotals`
//! - [`model`] - Associated model lookup boundary
//! - [`error`] / [`validation`] - Typed errors and input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use trolley_core::{ContentHasher, Item, ItemOptions, ItemTree, Money, TaxRate};
//!
//! let mut burger = Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new())
//!     .unwrap()
//!     .with_tax_rate(TaxRate::from_percentage(19.0));
//! let bacon = Item::new(&ContentHasher, "99", "Extra Bacon", Money::from_cents(99), ItemOptions::new())
//!     .unwrap()
//!     .with_tax_rate(TaxRate::from_percentage(19.0));
//! burger.add_sub_item(bacon).unwrap();
//!
//! let mut tree = ItemTree::new();
//! tree.put(burger);
//!
//! assert_eq!(tree.flatten().len(), 2);
//! assert_eq!(tree.count(), 2);
//! assert_eq!(tree.total().cents(), 1190 + 118);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod hasher;
pub mod item;
pub mod model;
pub mod money;
pub mod options;
pub mod tree;
pub mod types;
pub mod validation;

// =============================================================================
// Limits
// =============================================================================

/// Largest quantity a single row may carry, merges and updates included.
pub const MAX_ITEM_QUANTITY: i64 = 99_999;

/// Largest unit price, in minor units (one billion major units).
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use hasher::{make_hasher, ContentHasher, HasherKind, RandomStringHasher, RowHasher, UuidHasher};
pub use item::{Item, ItemAttributes, ItemUpdate, SerializedItem, DEFAULT_QUANTITY};
pub use model::ModelResolver;
pub use money::Money;
pub use options::ItemOptions;
pub use tree::ItemTree;
pub use types::{CartTotals, TaxRate};

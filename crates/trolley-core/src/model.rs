//! # Associated Models
//!
//! An item can be tagged with a model type name (`"Product"`, `"GiftCard"`).
//! The cart never owns that entity; it only knows how to ask the host for it
//! by the item's logical `id`.

use serde_json::Value;

/// Host-side lookup of associated entities.
pub trait ModelResolver: Send + Sync {
    /// Whether the host knows this model type at all.
    fn exists(&self, type_name: &str) -> bool;

    /// Fetches the entity with the given id, if any.
    fn find_by_id(&self, type_name: &str, id: &str) -> Option<Value>;
}

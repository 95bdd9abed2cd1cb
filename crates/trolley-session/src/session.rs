//! # Cart Session
//!
//! Runs cart operations against one named instance.
//!
//! ## Operation Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Every Mutating Operation                          │
//! │                                                                         │
//! │   1. load      store.get("cart.<instance>")  (absent → empty tree)     │
//! │   2. build     Item via the configured RowHasher, tax rate applied     │
//! │   3. mutate    the loaded ItemTree, owned by this call only            │
//! │   4. persist   store.put(key, Some(tree))                              │
//! │   5. publish   sink.publish(CartEvent)                                 │
//! │                                                                         │
//! │   Any error in 1-4 returns before the store is written, so a failed    │
//! │   operation never leaves a half-mutated tree behind.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Row Uniqueness
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add(X)                X already anywhere → quantities summed           │
//! │  add_sub_item(C, P)    C already a direct child of P → overwritten      │
//! │                        C anywhere else → DuplicateRow                   │
//! │  update(R → R')        R' elsewhere → merged into R, stale R' dropped   │
//! │                        R' an ancestor/descendant of R → DuplicateRow    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No tree is cached between calls. Two sessions on the same store and
//! instance see each other's writes; concurrent writers race last-writer-wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use trolley_core::{
    CartTotals, Item, ItemAttributes, ItemTree, ItemUpdate, ModelResolver, Money, RowHasher,
    SerializedItem, TaxRate,
};

use crate::config::CartConfig;
use crate::error::{CartError, CartResult};
use crate::events::{CartEvent, CartEventSink};
use crate::resolver::NoModels;
use crate::store::CartStore;

// =============================================================================
// Inputs
// =============================================================================

/// What `add` and `add_sub_item` accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemInput {
    /// A pre-built item. Its row id is kept as-is.
    Item(Item),
    /// Plain attributes, hashed with the session's hasher.
    Attributes(ItemAttributes),
}

impl From<Item> for ItemInput {
    fn from(item: Item) -> Self {
        ItemInput::Item(item)
    }
}

impl From<ItemAttributes> for ItemInput {
    fn from(attrs: ItemAttributes) -> Self {
        ItemInput::Attributes(attrs)
    }
}

/// What `update` accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum CartUpdate {
    /// Replace the quantity. Zero or less removes the row.
    Quantity(i64),
    /// Partial attribute update.
    Attributes(ItemUpdate),
}

impl From<i64> for CartUpdate {
    fn from(quantity: i64) -> Self {
        CartUpdate::Quantity(quantity)
    }
}

impl From<ItemUpdate> for CartUpdate {
    fn from(update: ItemUpdate) -> Self {
        CartUpdate::Attributes(update)
    }
}

// =============================================================================
// Cart Session
// =============================================================================

/// Cart operations bound to a store, an event sink and an instance name.
pub struct CartSession {
    config: CartConfig,
    tax_rate: TaxRate,
    hasher: Arc<dyn RowHasher>,
    store: Arc<dyn CartStore>,
    events: Arc<dyn CartEventSink>,
    resolver: Arc<dyn ModelResolver>,
    instance: String,
}

impl CartSession {
    /// Creates a session on the configured default instance.
    ///
    /// ## Errors
    /// `Config` when the configuration does not validate.
    pub fn new(
        config: CartConfig,
        store: Arc<dyn CartStore>,
        events: Arc<dyn CartEventSink>,
    ) -> CartResult<Self> {
        config.validate()?;

        let hasher = config.build_hasher();
        let tax_rate = config.tax_rate();
        let instance = config.default_instance.clone();

        debug!(
            hasher = hasher.name(),
            tax_bps = tax_rate.bps(),
            instance = %instance,
            "Cart session created"
        );

        Ok(CartSession {
            config,
            tax_rate,
            hasher,
            store,
            events,
            resolver: Arc::new(NoModels),
            instance,
        })
    }

    /// Installs the host's model lookup. Without one, `associate` always
    /// fails with `ModelNotFound`.
    pub fn with_resolver(mut self, resolver: Arc<dyn ModelResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the configured row hasher with a custom strategy.
    pub fn with_hasher(mut self, hasher: Arc<dyn RowHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Switches the instance later operations address. A blank name selects
    /// the default instance.
    pub fn instance(&mut self, name: &str) -> &mut Self {
        self.instance = self.config.instance_name(name);
        debug!(instance = %self.instance, "Switched cart instance");
        self
    }

    pub fn current_instance(&self) -> &str {
        &self.instance
    }

    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    pub fn hasher(&self) -> &dyn RowHasher {
        self.hasher.as_ref()
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds an item, merging into an existing row with the same row id.
    ///
    /// The merged row keeps its place in the tree (top-level or nested) and
    /// its children; the incoming values replace name, price and options and
    /// the quantities are summed.
    pub fn add(&self, input: impl Into<ItemInput>) -> CartResult<Item> {
        let item = self.build_item(input.into())?;

        let mut tree = self.load()?;
        let stored = merge_into(&mut tree, item)?;
        self.persist(tree)?;

        debug!(
            instance = %self.instance,
            row_id = %stored.row_id(),
            quantity = stored.quantity(),
            "Added item"
        );
        self.events.publish(CartEvent::Added(stored.clone()));
        Ok(stored)
    }

    /// Adds several items in one store round-trip.
    ///
    /// Every input is built and validated before the tree is touched; one bad
    /// input fails the whole batch with nothing stored.
    pub fn add_many<I>(&self, inputs: I) -> CartResult<Vec<Item>>
    where
        I: IntoIterator,
        I::Item: Into<ItemInput>,
    {
        let items = inputs
            .into_iter()
            .map(|input| self.build_item(input.into()))
            .collect::<CartResult<Vec<_>>>()?;

        let mut tree = self.load()?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(merge_into(&mut tree, item)?);
        }
        self.persist(tree)?;

        debug!(instance = %self.instance, count = stored.len(), "Added items");
        for item in &stored {
            self.events.publish(CartEvent::Added(item.clone()));
        }
        Ok(stored)
    }

    /// Attaches a child below `parent_row_id`, which may itself be nested.
    ///
    /// ## Errors
    /// - `RowNotFound` when the parent does not exist
    /// - `DuplicateRow` when the child's row id lives elsewhere in the tree
    pub fn add_sub_item(&self, input: impl Into<ItemInput>, parent_row_id: &str) -> CartResult<Item> {
        let mut tree = self.load()?;
        let parent = tree
            .find(parent_row_id)
            .ok_or_else(|| CartError::RowNotFound(parent_row_id.to_string()))?;

        let child = self.build_item(input.into())?;
        ensure_free(&tree, &child, parent.sub_item(child.row_id()))?;

        let child_row = child.row_id().to_string();
        let parent = tree
            .find_mut(parent_row_id)
            .ok_or_else(|| CartError::RowNotFound(parent_row_id.to_string()))?;
        parent.add_sub_item(child)?;

        let parent = parent.clone();
        let child = parent
            .sub_item(&child_row)
            .cloned()
            .ok_or_else(|| CartError::RowNotFound(child_row.clone()))?;
        self.persist(tree)?;

        debug!(
            instance = %self.instance,
            row_id = %child_row,
            parent = %parent_row_id,
            "Added sub-item"
        );
        self.events.publish(CartEvent::SubItemAdded {
            child: child.clone(),
            parent,
        });
        Ok(child)
    }

    /// Updates a row anywhere in the tree.
    ///
    /// Returns `None` when the resulting quantity is zero or less: the row
    /// has then been removed and `cart.removed` published instead of
    /// `cart.updated`.
    pub fn update(&self, row_id: &str, change: CartUpdate) -> CartResult<Option<Item>> {
        let mut tree = self.load()?;
        let mut item = tree
            .find(row_id)
            .cloned()
            .ok_or_else(|| CartError::RowNotFound(row_id.to_string()))?;

        let update = match change {
            CartUpdate::Quantity(quantity) => ItemUpdate::new().quantity(quantity),
            CartUpdate::Attributes(update) => update,
        };
        item.apply_update(update, self.hasher.as_ref())?;

        let new_row = item.row_id().to_string();
        if new_row != row_id && tree.has(&new_row) {
            let clashes_with_own_branch = tree
                .find(&new_row)
                .is_some_and(|existing| existing.contains(row_id))
                || item.sub_items().iter().any(|s| s.contains(&new_row));
            if clashes_with_own_branch {
                return Err(CartError::DuplicateRow(new_row));
            }

            if let Some(stale) = tree.detach(&new_row) {
                debug!(
                    instance = %self.instance,
                    row_id = %new_row,
                    "Merging updated row into existing identity"
                );
                item.increase_quantity(stale.quantity())?;
                for sub in stale.sub_items() {
                    item.add_sub_item(sub.clone())?;
                }
            }
        }

        if item.quantity() <= 0 {
            tree.detach(row_id);
            self.persist(tree)?;

            debug!(instance = %self.instance, row_id = %row_id, "Removed item on update");
            self.events.publish(CartEvent::Removed(row_id.to_string()));
            return Ok(None);
        }

        if !tree.replace(row_id, item)? {
            return Err(CartError::RowNotFound(row_id.to_string()));
        }
        let stored = tree
            .find(&new_row)
            .cloned()
            .ok_or_else(|| CartError::RowNotFound(new_row.clone()))?;
        self.persist(tree)?;

        debug!(
            instance = %self.instance,
            row_id = %row_id,
            new_row_id = %new_row,
            quantity = stored.quantity(),
            "Updated item"
        );
        self.events.publish(CartEvent::Updated(row_id.to_string()));
        Ok(Some(stored))
    }

    /// Shorthand for `update(row_id, CartUpdate::Quantity(quantity))`.
    pub fn update_quantity(&self, row_id: &str, quantity: i64) -> CartResult<Option<Item>> {
        self.update(row_id, CartUpdate::Quantity(quantity))
    }

    /// Removes a row and its whole subtree.
    pub fn remove(&self, row_id: &str) -> CartResult<()> {
        let mut tree = self.load()?;
        if !tree.has(row_id) {
            return Err(CartError::RowNotFound(row_id.to_string()));
        }

        if tree.is_top_level(row_id) {
            tree.remove(row_id);
        } else {
            match tree.find_sub_item_origin_mut(row_id) {
                Some(owner) => {
                    owner.remove_sub_item(row_id);
                }
                None => warn!(row_id = %row_id, "Sub-item has no owner, nothing detached"),
            }
        }
        self.persist(tree)?;

        debug!(instance = %self.instance, row_id = %row_id, "Removed item");
        self.events.publish(CartEvent::Removed(row_id.to_string()));
        Ok(())
    }

    /// Forgets the whole instance.
    pub fn destroy(&self) -> CartResult<()> {
        self.store.put(&self.key(), None)?;

        info!(instance = %self.instance, "Cart destroyed");
        self.events.publish(CartEvent::Destroyed);
        Ok(())
    }

    /// Tags a row with a model type known to the resolver.
    pub fn associate(&self, row_id: &str, type_name: &str) -> CartResult<Item> {
        if !self.resolver.exists(type_name) {
            return Err(CartError::ModelNotFound(type_name.to_string()));
        }

        let mut tree = self.load()?;
        let item = tree
            .find_mut(row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.to_string()))?;
        item.associate(type_name);
        let stored = item.clone();
        self.persist(tree)?;

        debug!(instance = %self.instance, row_id = %row_id, model = type_name, "Associated item");
        Ok(stored)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Row at any depth.
    ///
    /// ## Errors
    /// `RowNotFound` when absent (use [`CartSession::has`] to probe).
    pub fn get(&self, row_id: &str) -> CartResult<Item> {
        self.load()?
            .find(row_id)
            .cloned()
            .ok_or_else(|| CartError::RowNotFound(row_id.to_string()))
    }

    /// Existence check at any depth. A failing store reads as absent.
    pub fn has(&self, row_id: &str) -> bool {
        match self.load() {
            Ok(tree) => tree.has(row_id),
            Err(e) => {
                warn!(instance = %self.instance, error = %e, "Cart could not be loaded");
                false
            }
        }
    }

    pub fn content(&self) -> CartResult<ItemTree> {
        self.load()
    }

    pub fn is_empty(&self) -> CartResult<bool> {
        Ok(self.load()?.is_empty())
    }

    /// Sum of quantities at every depth.
    pub fn count(&self) -> CartResult<i64> {
        Ok(self.load()?.count())
    }

    pub fn subtotal(&self) -> CartResult<Money> {
        Ok(self.load()?.subtotal())
    }

    pub fn tax(&self) -> CartResult<Money> {
        Ok(self.load()?.tax())
    }

    pub fn total(&self) -> CartResult<Money> {
        Ok(self.load()?.total())
    }

    /// All aggregates from a single load.
    pub fn totals(&self) -> CartResult<CartTotals> {
        Ok(self.load()?.totals())
    }

    /// Top-level rows matching `predicate`.
    pub fn search<F>(&self, predicate: F) -> CartResult<Vec<Item>>
    where
        F: FnMut(&Item) -> bool,
    {
        Ok(self.load()?.search(predicate).into_iter().cloned().collect())
    }

    /// The associated entity of a row, looked up through the resolver.
    pub fn model(&self, row_id: &str) -> CartResult<Option<Value>> {
        Ok(self.get(row_id)?.model(self.resolver.as_ref()))
    }

    /// Serialized view of the content, optionally resolving models.
    pub fn serialize(&self, resolve_models: bool) -> CartResult<Vec<SerializedItem>> {
        let tree = self.load()?;
        let resolver = resolve_models.then(|| self.resolver.as_ref());
        Ok(tree.iter().map(|item| item.to_serializable(resolver)).collect())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn key(&self) -> String {
        self.config.store_key(&self.instance)
    }

    fn load(&self) -> CartResult<ItemTree> {
        Ok(self.store.get(&self.key())?.unwrap_or_default())
    }

    fn persist(&self, tree: ItemTree) -> CartResult<()> {
        self.store.put(&self.key(), Some(tree))?;
        Ok(())
    }

    /// Normalizes an input into an item carrying the configured tax rate,
    /// descendants included. Pre-built items are re-validated, children too.
    fn build_item(&self, input: ItemInput) -> CartResult<Item> {
        let mut item = match input {
            ItemInput::Item(item) => {
                item.validate()?;
                item
            }
            ItemInput::Attributes(attrs) => Item::from_attributes(self.hasher.as_ref(), attrs)?,
        };

        let mut nested = Vec::new();
        item.collect_descendants(&mut nested);
        let nested: Vec<String> = nested.iter().map(|i| i.row_id().to_string()).collect();

        item.set_tax_rate(self.tax_rate);
        for row_id in nested {
            if let Some(sub) = item.find_mut(&row_id) {
                sub.set_tax_rate(self.tax_rate);
            }
        }
        Ok(item)
    }
}

/// Inserts `item` at top level, or absorbs it into the row with the same id
/// wherever that row lives. Returns the stored row.
fn merge_into(tree: &mut ItemTree, item: Item) -> CartResult<Item> {
    let row_id = item.row_id().to_string();

    let target = tree.find(&row_id);
    for child in item.sub_items() {
        ensure_free(tree, child, target.and_then(|t| t.sub_item(child.row_id())))?;
    }

    match tree.find_mut(&row_id) {
        Some(existing) => {
            existing.absorb(item)?;
            Ok(existing.clone())
        }
        None => {
            tree.put(item);
            tree.get(&row_id)
                .cloned()
                .ok_or(CartError::RowNotFound(row_id))
        }
    }
}

/// Fails when `incoming` or any of its descendants is already in the tree,
/// unless it lives inside `replaced` (the row `incoming` will overwrite).
fn ensure_free(tree: &ItemTree, incoming: &Item, replaced: Option<&Item>) -> CartResult<()> {
    let mut rows = vec![incoming];
    incoming.collect_descendants(&mut rows);

    for row in rows {
        let row_id = row.row_id();
        if tree.has(row_id) && !replaced.is_some_and(|r| r.contains(row_id)) {
            return Err(CartError::DuplicateRow(row_id.to_string()));
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::resolver::MemoryResolver;
    use crate::store::{JsonFileStore, MemoryStore};
    use serde_json::json;
    use trolley_core::{
        ContentHasher, CoreError, HasherKind, ItemOptions, ValidationError, MAX_ITEM_QUANTITY,
    };

    struct Fixture {
        session: CartSession,
        store: Arc<MemoryStore>,
        events: Arc<RecordingSink>,
    }

    fn fixture() -> Fixture {
        fixture_with(CartConfig::default())
    }

    fn fixture_with(config: CartConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingSink::new());
        let session = CartSession::new(config, store.clone(), events.clone()).unwrap();
        Fixture {
            session,
            store,
            events,
        }
    }

    fn burger() -> ItemAttributes {
        ItemAttributes::new("1", "Hamburger", Money::from_cents(1000))
    }

    fn bacon() -> ItemAttributes {
        ItemAttributes::new("99", "Extra Bacon", Money::from_cents(99))
    }

    #[test]
    fn test_add_applies_tax_and_derives_prices() {
        let f = fixture();
        let item = f.session.add(burger().quantity(2)).unwrap();

        assert_eq!(item.tax_rate().bps(), 1900);
        assert_eq!(item.price_tax().cents(), 1190);
        assert_eq!(item.subtotal().cents(), 2000);
        assert_eq!(item.total().cents(), 2380);
        assert_eq!(f.session.total().unwrap().cents(), 2380);
        assert!(f.store.has("cart.default"));
        assert_eq!(f.events.names(), vec!["cart.added"]);
    }

    #[test]
    fn test_add_same_item_twice_merges() {
        let f = fixture();
        let foo = ItemAttributes::new("1", "Foo", Money::zero());
        let first = f.session.add(foo.clone()).unwrap();
        let second = f.session.add(foo).unwrap();

        assert_eq!(first.row_id(), second.row_id());
        assert_eq!(second.quantity(), 2);
        assert_eq!(f.session.count().unwrap(), 2);
        assert_eq!(f.session.content().unwrap().len(), 1);
        assert_eq!(f.events.names(), vec!["cart.added", "cart.added"]);
    }

    #[test]
    fn test_add_with_different_options_gives_two_rows() {
        let f = fixture();
        f.session
            .add(burger().options(ItemOptions::new().with("size", "L")))
            .unwrap();
        f.session
            .add(burger().options(ItemOptions::new().with("size", "M")))
            .unwrap();

        assert_eq!(f.session.content().unwrap().len(), 2);
    }

    #[test]
    fn test_random_hasher_never_merges() {
        let mut config = CartConfig::default();
        config.hasher = HasherKind::Random;
        let f = fixture_with(config);

        f.session.add(burger()).unwrap();
        f.session.add(burger()).unwrap();

        assert_eq!(f.session.content().unwrap().len(), 2);
        assert_eq!(f.session.count().unwrap(), 2);
    }

    #[test]
    fn test_add_prebuilt_item_keeps_row_id() {
        let f = fixture();
        let item = Item::new(&ContentHasher, "7", "Salad", Money::from_cents(500), ItemOptions::new()).unwrap();
        let row_id = item.row_id().to_string();

        let stored = f.session.add(item).unwrap();
        assert_eq!(stored.row_id(), row_id);
        assert_eq!(stored.tax_rate().bps(), 1900);
    }

    #[test]
    fn test_add_prebuilt_item_with_children_taxes_every_level() {
        let f = fixture();
        let mut parent = Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new()).unwrap();
        let child = Item::new(&ContentHasher, "99", "Extra Bacon", Money::from_cents(99), ItemOptions::new()).unwrap();
        parent.add_sub_item(child).unwrap();

        f.session.add(parent).unwrap();

        let tree = f.session.content().unwrap();
        assert!(tree.flatten().iter().all(|i| i.tax_rate().bps() == 1900));
        assert_eq!(f.session.count().unwrap(), 2);
    }

    #[test]
    fn test_add_invalid_item_stores_nothing() {
        let f = fixture();
        let err = f
            .session
            .add(ItemAttributes::new("1", "", Money::from_cents(100)))
            .unwrap_err();

        assert!(matches!(
            err,
            CartError::Core(CoreError::Validation(ValidationError::Required { .. }))
        ));
        assert!(!f.store.has("cart.default"));
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_add_prebuilt_item_driven_negative_is_rejected() {
        let f = fixture();
        let mut item = Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new()).unwrap();
        item.apply_update(ItemUpdate::new().quantity(-2), &ContentHasher).unwrap();

        let err = f.session.add(item).unwrap_err();
        assert!(matches!(
            err,
            CartError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(!f.store.has("cart.default"));
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_add_prebuilt_item_with_invalid_child_is_rejected() {
        let f = fixture();
        f.session.add(burger().quantity(2)).unwrap();

        let mut parent = Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new()).unwrap();
        let mut child = Item::new(&ContentHasher, "99", "Extra Bacon", Money::from_cents(99), ItemOptions::new()).unwrap();
        child.apply_update(ItemUpdate::new().quantity(0), &ContentHasher).unwrap();
        parent.add_sub_item(child).unwrap();

        assert!(f.session.add(parent).is_err());
        assert_eq!(f.session.count().unwrap(), 2);
        assert_eq!(f.events.names(), vec!["cart.added"]);
    }

    #[test]
    fn test_add_deserialized_invalid_input_is_rejected() {
        let f = fixture();
        let input: ItemInput = serde_json::from_value(json!({
            "id": "",
            "name": "",
            "quantity": 0,
            "price": -5,
        }))
        .unwrap();
        assert!(f.session.add(input).is_err());

        let mut stored = serde_json::to_value(
            Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new()).unwrap(),
        )
        .unwrap();
        stored["quantity"] = json!(-4);
        let input: ItemInput = serde_json::from_value(stored).unwrap();
        assert!(f.session.add(input).is_err());

        assert!(!f.store.has("cart.default"));
        assert!(f.session.total().unwrap().is_zero());
    }

    #[test]
    fn test_quantity_ceiling_holds_on_add_merge_and_update() {
        let f = fixture();
        assert!(f.session.add(burger().quantity(i64::MAX / 10)).is_err());
        assert!(f.session.is_empty().unwrap());

        let item = f.session.add(burger().quantity(MAX_ITEM_QUANTITY)).unwrap();
        assert_eq!(
            f.session.total().unwrap().cents(),
            1190 * MAX_ITEM_QUANTITY
        );

        let err = f.session.add(burger()).unwrap_err();
        assert!(matches!(
            err,
            CartError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(f.session.update_quantity(item.row_id(), MAX_ITEM_QUANTITY + 1).is_err());

        assert_eq!(f.session.count().unwrap(), MAX_ITEM_QUANTITY);
        assert_eq!(f.events.names(), vec!["cart.added"]);
    }

    #[test]
    fn test_add_rejects_non_positive_initial_quantity() {
        let f = fixture();
        assert!(f.session.add(burger().quantity(0)).is_err());
        assert!(f.session.add(burger().quantity(-3)).is_err());
        assert!(f.session.is_empty().unwrap());
    }

    #[test]
    fn test_add_many_is_all_or_nothing() {
        let f = fixture();
        let err = f.session.add_many(vec![
            burger(),
            ItemAttributes::new("", "Nameless", Money::zero()),
        ]);
        assert!(err.is_err());
        assert!(!f.store.has("cart.default"));

        let added = f.session.add_many(vec![burger(), bacon()]).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(f.session.content().unwrap().len(), 2);
        assert_eq!(f.events.names(), vec!["cart.added", "cart.added"]);
    }

    #[test]
    fn test_add_sub_item_then_remove_it() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        assert!(child.is_sub_item());
        assert_eq!(child.price_tax().cents(), 118);

        let tree = f.session.content().unwrap();
        assert!(tree.find(child.row_id()).is_some());
        assert_eq!(
            tree.find_sub_item_origin(child.row_id()).map(|p| p.row_id()),
            Some(parent.row_id())
        );
        assert!(tree.get(child.row_id()).is_none());
        assert_eq!(tree.flatten().len(), 2);

        f.session.remove(child.row_id()).unwrap();

        let parent = f.session.get(parent.row_id()).unwrap();
        assert!(!parent.has_sub_items());
        assert_eq!(
            f.events.names(),
            vec!["cart.added", "cart.subitem.added", "cart.removed"]
        );
    }

    #[test]
    fn test_sub_item_event_carries_child_and_parent() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        match f.events.events().last() {
            Some(CartEvent::SubItemAdded { child: c, parent: p }) => {
                assert_eq!(c.row_id(), child.row_id());
                assert_eq!(p.row_id(), parent.row_id());
                assert!(p.sub_item(child.row_id()).is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_add_sub_item_missing_parent() {
        let f = fixture();
        let err = f.session.add_sub_item(bacon(), "nope").unwrap_err();

        assert!(err.is_not_found());
        assert!(!f.store.has("cart.default"));
    }

    #[test]
    fn test_add_sub_item_twice_overwrites() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        f.session.add_sub_item(bacon(), parent.row_id()).unwrap();
        f.session
            .add_sub_item(bacon().quantity(3), parent.row_id())
            .unwrap();

        let parent = f.session.get(parent.row_id()).unwrap();
        assert_eq!(parent.sub_items().len(), 1);
        assert_eq!(parent.sub_items()[0].quantity(), 3);
    }

    #[test]
    fn test_add_sub_item_rejects_row_living_elsewhere() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        f.session.add(bacon()).unwrap();

        let err = f.session.add_sub_item(bacon(), parent.row_id()).unwrap_err();
        assert!(matches!(err, CartError::DuplicateRow(_)));

        let err = f.session.add_sub_item(burger(), parent.row_id()).unwrap_err();
        assert!(matches!(err, CartError::DuplicateRow(_)));
    }

    #[test]
    fn test_nested_sub_items_count_in_totals() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let sauce = f
            .session
            .add_sub_item(ItemAttributes::new("50", "Sauce", Money::from_cents(10)), parent.row_id())
            .unwrap();
        let chili = f
            .session
            .add_sub_item(
                ItemAttributes::new("51", "Chili", Money::from_cents(20)).quantity(3),
                sauce.row_id(),
            )
            .unwrap();

        let tree = f.session.content().unwrap();
        assert_eq!(tree.flatten().len(), 3);
        assert_eq!(
            tree.find_sub_item_origin(chili.row_id()).map(|i| i.row_id()),
            Some(sauce.row_id())
        );

        let totals = f.session.totals().unwrap();
        assert_eq!(totals.row_count, 1);
        assert_eq!(totals.count, 5);
        assert_eq!(totals.subtotal.cents(), 1000 + 10 + 60);
        assert_eq!(f.session.count().unwrap(), totals.count);
        assert_eq!(f.session.subtotal().unwrap(), totals.subtotal);
        assert_eq!(f.session.tax().unwrap(), totals.tax);
        assert_eq!(f.session.total().unwrap(), totals.subtotal + totals.tax);
    }

    #[test]
    fn test_add_merges_into_nested_row() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        let merged = f.session.add(bacon()).unwrap();
        assert_eq!(merged.row_id(), child.row_id());
        assert_eq!(merged.quantity(), 2);
        assert!(merged.is_sub_item());

        let tree = f.session.content().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.count(), 3);
    }

    #[test]
    fn test_update_quantity() {
        let f = fixture();
        let item = f.session.add(burger()).unwrap();

        let updated = f.session.update_quantity(item.row_id(), 5).unwrap().unwrap();
        assert_eq!(updated.quantity(), 5);
        assert_eq!(updated.row_id(), item.row_id());
        assert_eq!(f.session.count().unwrap(), 5);
        assert_eq!(f.events.names(), vec!["cart.added", "cart.updated"]);
        assert_eq!(
            f.events.events().last(),
            Some(&CartEvent::Updated(item.row_id().to_string()))
        );
    }

    #[test]
    fn test_update_to_zero_removes() {
        let f = fixture();
        let item = f.session.add(burger()).unwrap();

        assert!(f.session.update_quantity(item.row_id(), 0).unwrap().is_none());
        assert!(!f.session.has(item.row_id()));
        assert_eq!(f.events.names(), vec!["cart.added", "cart.removed"]);
    }

    #[test]
    fn test_update_negative_removes_sub_item() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        assert!(f.session.update_quantity(child.row_id(), -1).unwrap().is_none());
        assert!(f.session.has(parent.row_id()));
        assert!(!f.session.has(child.row_id()));
    }

    #[test]
    fn test_update_attributes_keeps_row_id_unless_asked() {
        let f = fixture();
        let item = f
            .session
            .add(burger().options(ItemOptions::new().with("size", "L")))
            .unwrap();

        let updated = f
            .session
            .update(
                item.row_id(),
                ItemUpdate::new()
                    .name("Cheeseburger")
                    .price(Money::from_cents(1200))
                    .options(ItemOptions::new().with("cheese", true))
                    .into(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.row_id(), item.row_id());
        assert_eq!(updated.name(), "Cheeseburger");
        assert_eq!(updated.price().cents(), 1200);
        assert_eq!(updated.options().get("size"), Some(&json!("L")));
        assert_eq!(updated.options().get("cheese"), Some(&json!(true)));
        assert_eq!(updated.quantity(), 1);
    }

    #[test]
    fn test_update_identity_change_merges_with_existing_row() {
        let f = fixture();
        let large = f
            .session
            .add(burger().options(ItemOptions::new().with("size", "L")))
            .unwrap();
        let medium = f
            .session
            .add(burger().quantity(2).options(ItemOptions::new().with("size", "M")))
            .unwrap();

        let updated = f
            .session
            .update(
                medium.row_id(),
                ItemUpdate::new()
                    .options(ItemOptions::new().with("size", "L"))
                    .regenerate_row_id()
                    .into(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.row_id(), large.row_id());
        assert_eq!(updated.quantity(), 3);

        let tree = f.session.content().unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.has(medium.row_id()));
        assert_eq!(
            f.events.events().last(),
            Some(&CartEvent::Updated(medium.row_id().to_string()))
        );
    }

    #[test]
    fn test_update_sub_item_identity_stays_under_parent() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        let updated = f
            .session
            .update(
                child.row_id(),
                ItemUpdate::new()
                    .options(ItemOptions::new().with("crispy", true))
                    .regenerate_row_id()
                    .into(),
            )
            .unwrap()
            .unwrap();

        assert_ne!(updated.row_id(), child.row_id());
        assert!(updated.is_sub_item());

        let tree = f.session.content().unwrap();
        assert!(!tree.has(child.row_id()));
        assert_eq!(
            tree.find_sub_item_origin(updated.row_id()).map(|p| p.row_id()),
            Some(parent.row_id())
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_update_cannot_collapse_onto_ancestor() {
        let f = fixture();
        let menu = f
            .session
            .add(ItemAttributes::new("A", "Menu", Money::from_cents(800)))
            .unwrap();
        let drink = f
            .session
            .add_sub_item(ItemAttributes::new("B", "Drink", Money::zero()), menu.row_id())
            .unwrap();

        let err = f
            .session
            .update(
                drink.row_id(),
                ItemUpdate::new().id("A").regenerate_row_id().into(),
            )
            .unwrap_err();

        assert!(matches!(err, CartError::DuplicateRow(_)));
        assert!(f.session.has(drink.row_id()));
        assert_eq!(f.session.count().unwrap(), 2);
    }

    #[test]
    fn test_update_unknown_row() {
        let f = fixture();
        let err = f.session.update_quantity("missing", 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_validation_failure_leaves_store_untouched() {
        let f = fixture();
        let item = f.session.add(burger()).unwrap();
        let before = f.session.content().unwrap();

        let err = f
            .session
            .update(item.row_id(), ItemUpdate::new().name("  ").into())
            .unwrap_err();
        assert!(matches!(err, CartError::Core(CoreError::Validation(_))));
        assert_eq!(f.session.content().unwrap(), before);
    }

    #[test]
    fn test_remove_top_level_takes_subtree() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        let child = f.session.add_sub_item(bacon(), parent.row_id()).unwrap();

        f.session.remove(parent.row_id()).unwrap();

        assert!(!f.session.has(parent.row_id()));
        assert!(!f.session.has(child.row_id()));
        assert!(f.session.is_empty().unwrap());
    }

    #[test]
    fn test_remove_unknown_row() {
        let f = fixture();
        assert!(f.session.remove("missing").unwrap_err().is_not_found());
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_get_and_has_unknown_row() {
        let f = fixture();
        let err = f.session.get("nonexistent-row").unwrap_err();
        assert!(err.is_not_found());
        assert!(!f.session.has("nonexistent-row"));
    }

    #[test]
    fn test_destroy() {
        let f = fixture();
        f.session.add(burger()).unwrap();
        f.session.destroy().unwrap();

        assert!(!f.store.has("cart.default"));
        assert!(f.session.is_empty().unwrap());
        assert_eq!(f.session.count().unwrap(), 0);
        assert_eq!(f.events.names(), vec!["cart.added", "cart.destroyed"]);
    }

    #[test]
    fn test_instances_are_isolated() {
        let mut f = fixture();
        f.session.add(burger()).unwrap();

        f.session.instance("wishlist");
        assert_eq!(f.session.current_instance(), "wishlist");
        assert!(f.session.is_empty().unwrap());
        f.session.add(bacon()).unwrap();

        f.session.instance("");
        assert_eq!(f.session.current_instance(), "default");
        assert_eq!(f.session.content().unwrap().len(), 1);

        let mut keys = f.store.keys();
        keys.sort();
        assert_eq!(keys, vec!["cart.default", "cart.wishlist"]);
    }

    #[test]
    fn test_search_is_top_level_only() {
        let f = fixture();
        let parent = f.session.add(burger()).unwrap();
        f.session.add_sub_item(bacon(), parent.row_id()).unwrap();
        f.session
            .add(ItemAttributes::new("2", "Fries", Money::from_cents(300)))
            .unwrap();

        let cheap = f.session.search(|i| i.price().cents() < 500).unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].name(), "Fries");

        let bacon_hits = f.session.search(|i| i.id() == "99").unwrap();
        assert!(bacon_hits.is_empty());
    }

    #[test]
    fn test_associate() {
        let f = fixture();
        let resolver = MemoryResolver::new().with("Product", "1", json!({"sku": "BURGER"}));
        let session = CartSession::new(CartConfig::default(), f.store.clone(), f.events.clone())
            .unwrap()
            .with_resolver(Arc::new(resolver));

        let item = session.add(burger()).unwrap();

        let err = session.associate(item.row_id(), "Unicorn").unwrap_err();
        assert!(matches!(err, CartError::ModelNotFound(_)));
        assert!(!session.get(item.row_id()).unwrap().is_associated());

        let tagged = session.associate(item.row_id(), "Product").unwrap();
        assert_eq!(tagged.associated_model(), Some("Product"));
        assert_eq!(session.model(item.row_id()).unwrap(), Some(json!({"sku": "BURGER"})));

        let serialized = session.serialize(true).unwrap();
        assert_eq!(serialized[0].model, Some(json!({"sku": "BURGER"})));
        let unresolved = session.serialize(false).unwrap();
        assert_eq!(unresolved[0].model, None);
    }

    #[test]
    fn test_associate_without_resolver() {
        let f = fixture();
        let item = f.session.add(burger()).unwrap();
        assert!(matches!(
            f.session.associate(item.row_id(), "Product"),
            Err(CartError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CartConfig::default();
        config.tax_rate = 250.0;
        let result = CartSession::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingSink::new()),
        );
        assert!(matches!(result, Err(CartError::Config(_))));
    }

    #[test]
    fn test_two_sessions_share_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn CartStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());

        let writer = CartSession::new(CartConfig::default(), store.clone(), Arc::new(RecordingSink::new())).unwrap();
        let parent = writer.add(burger()).unwrap();
        writer.add_sub_item(bacon(), parent.row_id()).unwrap();

        let reader = CartSession::new(
            CartConfig::default(),
            Arc::new(JsonFileStore::open(dir.path()).unwrap()),
            Arc::new(RecordingSink::new()),
        )
        .unwrap();
        assert_eq!(reader.count().unwrap(), 2);
        assert_eq!(reader.content().unwrap(), writer.content().unwrap());
    }
}

//! # Cart Items
//!
//! An [`Item`] is one row of a cart. It may own sub-items (extra bacon on a
//! burger, a warranty on a laptop), which may own sub-items of their own.
//!
//! ## Item Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Item                                                                   │
//! │  ├── row_id        hasher(id, options), unique across the whole tree    │
//! │  ├── id, name      catalog identity and display name                    │
//! │  ├── quantity      signed; never stored <= 0 by the session             │
//! │  ├── price         unit price, excluding tax                            │
//! │  ├── tax_rate      set by the session from configuration                │
//! │  ├── options       canonicalized before hashing                         │
//! │  └── sub_items     exclusively owned children, in insertion order       │
//! │                                                                         │
//! │  Derived (computed on demand, never stored):                            │
//! │    tax       = price × tax_rate                                         │
//! │    price_tax = price + tax                                              │
//! │    subtotal  = quantity × price                                         │
//! │    total     = quantity × price_tax                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::hasher::RowHasher;
use crate::model::ModelResolver;
use crate::money::Money;
use crate::options::ItemOptions;
use crate::types::TaxRate;
use crate::validation::{
    validate_item_id, validate_item_name, validate_price_cents, validate_quantity,
    validate_quantity_ceiling,
};

/// Quantity of a freshly built item when none is given.
pub const DEFAULT_QUANTITY: i64 = 1;

// =============================================================================
// Item
// =============================================================================

/// A cart row, possibly carrying nested sub-items.
///
/// Deserialization runs the same checks as [`Item::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    row_id: String,
    id: String,
    name: String,
    quantity: i64,
    price: Money,
    tax_rate: TaxRate,
    options: ItemOptions,
    sub_items: Vec<Item>,
    is_sub_item: bool,
    associated_model: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Item {
    /// Builds a new item with quantity [`DEFAULT_QUANTITY`] and a zero tax rate.
    ///
    /// ## Errors
    /// `Required` for a blank id or name, `OutOfRange` for a negative price.
    ///
    /// ```rust
    /// use trolley_core::{ContentHasher, Item, ItemOptions, Money};
    ///
    /// let item = Item::new(&ContentHasher, "1", "Hamburger", Money::from_cents(1000), ItemOptions::new()).unwrap();
    /// assert_eq!(item.quantity(), 1);
    /// assert_eq!(item.row_id().len(), 32);
    /// ```
    pub fn new(
        hasher: &dyn RowHasher,
        id: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        options: ItemOptions,
    ) -> CoreResult<Self> {
        let id = id.into();
        let name = name.into();

        validate_item_id(&id)?;
        validate_item_name(&name)?;
        validate_price_cents(price.cents())?;

        let now = Utc::now();
        Ok(Item {
            row_id: hasher.hash(&id, &options),
            id,
            name,
            quantity: DEFAULT_QUANTITY,
            price,
            tax_rate: TaxRate::zero(),
            options,
            sub_items: Vec::new(),
            is_sub_item: false,
            associated_model: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Builds an item from a plain attribute set.
    pub fn from_attributes(hasher: &dyn RowHasher, attrs: ItemAttributes) -> CoreResult<Self> {
        let mut item = Item::new(hasher, attrs.id, attrs.name, attrs.price, attrs.options)?;
        if let Some(quantity) = attrs.quantity {
            item.set_quantity(quantity)?;
        }
        Ok(item)
    }

    /// Checks id, name, price and quantity of this item and every
    /// descendant.
    ///
    /// Items handed over pre-built can have been driven out of range through
    /// [`Item::apply_update`], so the session re-checks them before storing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_item_id(&self.id)?;
        validate_item_name(&self.name)?;
        validate_price_cents(self.price.cents())?;
        validate_quantity(self.quantity)?;
        self.sub_items.iter().try_for_each(Item::validate)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn options(&self) -> &ItemOptions {
        &self.options
    }

    pub fn is_sub_item(&self) -> bool {
        self.is_sub_item
    }

    pub fn associated_model(&self) -> Option<&str> {
        self.associated_model.as_deref()
    }

    pub fn is_associated(&self) -> bool {
        self.associated_model.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // =========================================================================
    // Derived Pricing
    // =========================================================================

    /// Tax on one unit.
    pub fn tax(&self) -> Money {
        self.price.calculate_tax(self.tax_rate)
    }

    /// Unit price including tax.
    pub fn price_tax(&self) -> Money {
        self.price + self.tax()
    }

    /// Line amount before tax.
    pub fn subtotal(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// Line amount including tax.
    pub fn total(&self) -> Money {
        self.price_tax().multiply_quantity(self.quantity)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Explicitly sets the quantity.
    ///
    /// Rejects zero and negative values. The session's `update` path does
    /// not go through here: there a non-positive quantity removes the row.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Adds to the quantity (merge of identical rows).
    ///
    /// Only the upper bound is checked; a non-positive result is left for the
    /// caller to turn into a removal.
    pub fn increase_quantity(&mut self, by: i64) -> Result<(), ValidationError> {
        let quantity = self.quantity.saturating_add(by);
        validate_quantity_ceiling(quantity)?;
        self.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn set_tax_rate(&mut self, rate: TaxRate) {
        self.tax_rate = rate;
    }

    /// Builder-style [`Item::set_tax_rate`].
    pub fn with_tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Tags this item with a model type. No lookup happens here.
    pub fn associate(&mut self, type_name: impl Into<String>) {
        self.associated_model = Some(type_name.into());
        self.touch();
    }

    /// Applies a partial update.
    ///
    /// Omitted fields keep their values, options are merged and the row id
    /// is only recomputed when `regenerate_row_id` is set. Quantity is taken
    /// as-is up to `MAX_ITEM_QUANTITY`, including zero or negative values;
    /// callers decide what that means.
    pub fn apply_update(&mut self, update: ItemUpdate, hasher: &dyn RowHasher) -> CoreResult<()> {
        if let Some(quantity) = update.quantity {
            validate_quantity_ceiling(quantity)?;
        }
        if let Some(id) = &update.id {
            validate_item_id(id)?;
        }
        if let Some(name) = &update.name {
            validate_item_name(name)?;
        }
        if let Some(price) = update.price {
            validate_price_cents(price.cents())?;
        }

        if let Some(id) = update.id {
            self.id = id;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(options) = update.options {
            self.options.merge(options);
        }
        if update.regenerate_row_id {
            self.row_id = hasher.hash(&self.id, &self.options);
        }

        self.touch();
        Ok(())
    }

    /// Replaces this item's fields with those of an incoming duplicate.
    ///
    /// Used when an add collapses onto an existing row: the new values win,
    /// but the existing row keeps its children, its position in the tree and
    /// its creation time. Children carried by `incoming` are attached on top,
    /// overwriting existing children with the same row id.
    ///
    /// ## Errors
    /// The summed quantity must still pass `validate_quantity`; on error
    /// this item is left unchanged.
    pub fn absorb(&mut self, mut incoming: Item) -> Result<(), ValidationError> {
        let quantity = self.quantity.saturating_add(incoming.quantity);
        validate_quantity(quantity)?;

        let incoming_subs = std::mem::take(&mut incoming.sub_items);
        let sub_items = std::mem::take(&mut self.sub_items);
        let is_sub_item = self.is_sub_item;
        let created_at = self.created_at;
        let associated_model = self.associated_model.take();

        *self = incoming;
        self.quantity = quantity;
        self.sub_items = sub_items;
        self.is_sub_item = is_sub_item;
        self.created_at = created_at;
        if self.associated_model.is_none() {
            self.associated_model = associated_model;
        }
        for mut child in incoming_subs {
            child.is_sub_item = true;
            match self.sub_items.iter_mut().find(|s| s.row_id == child.row_id) {
                Some(slot) => *slot = child,
                None => self.sub_items.push(child),
            }
        }
        self.touch();
        Ok(())
    }

    pub(crate) fn set_is_sub_item(&mut self, is_sub_item: bool) {
        self.is_sub_item = is_sub_item;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // =========================================================================
    // Sub-items
    // =========================================================================

    pub fn sub_items(&self) -> &[Item] {
        &self.sub_items
    }

    pub fn has_sub_items(&self) -> bool {
        !self.sub_items.is_empty()
    }

    /// Direct sub-item with the given row id.
    pub fn sub_item(&self, row_id: &str) -> Option<&Item> {
        self.sub_items.iter().find(|s| s.row_id == row_id)
    }

    /// Attaches a child.
    ///
    /// A child with the same row id as an existing direct sub-item replaces
    /// it in place (last write wins).
    ///
    /// ## Errors
    /// `SelfContainment` when the child is this item or already contains it.
    pub fn add_sub_item(&mut self, mut child: Item) -> CoreResult<()> {
        if child.contains(&self.row_id) {
            return Err(CoreError::SelfContainment {
                child: child.row_id,
                parent: self.row_id.clone(),
            });
        }

        child.is_sub_item = true;
        match self.sub_items.iter_mut().find(|s| s.row_id == child.row_id) {
            Some(slot) => *slot = child,
            None => self.sub_items.push(child),
        }

        self.touch();
        Ok(())
    }

    /// Detaches a direct sub-item. Absent rows are a no-op.
    pub fn remove_sub_item(&mut self, row_id: &str) -> Option<Item> {
        let index = self.sub_items.iter().position(|s| s.row_id == row_id)?;
        let removed = self.sub_items.remove(index);
        self.touch();
        Some(removed)
    }

    /// Whether this item is, or transitively owns, the given row.
    pub fn contains(&self, row_id: &str) -> bool {
        self.row_id == row_id || self.sub_items.iter().any(|s| s.contains(row_id))
    }

    /// Finds this item or any descendant by row id, depth-first.
    pub fn find(&self, row_id: &str) -> Option<&Item> {
        if self.row_id == row_id {
            return Some(self);
        }
        self.sub_items.iter().find_map(|s| s.find(row_id))
    }

    pub fn find_mut(&mut self, row_id: &str) -> Option<&mut Item> {
        if self.row_id == row_id {
            return Some(self);
        }
        self.sub_items.iter_mut().find_map(|s| s.find_mut(row_id))
    }

    /// Finds the item, within this subtree, that directly owns `row_id`.
    pub fn find_owner(&self, row_id: &str) -> Option<&Item> {
        if self.sub_item(row_id).is_some() {
            return Some(self);
        }
        self.sub_items.iter().find_map(|s| s.find_owner(row_id))
    }

    pub fn find_owner_mut(&mut self, row_id: &str) -> Option<&mut Item> {
        if self.sub_items.iter().any(|s| s.row_id == row_id) {
            return Some(self);
        }
        self.sub_items
            .iter_mut()
            .find_map(|s| s.find_owner_mut(row_id))
    }

    /// Pushes every descendant onto `out`, parents before their children.
    pub fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Item>) {
        for sub in &self.sub_items {
            out.push(sub);
            sub.collect_descendants(out);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Resolves the associated model through the host, if tagged.
    pub fn model(&self, resolver: &dyn ModelResolver) -> Option<Value> {
        let type_name = self.associated_model.as_deref()?;
        resolver.find_by_id(type_name, &self.id)
    }

    /// Plain nested view of this item with every derived field.
    ///
    /// `model` stays `None` unless a resolver is given and finds the entity.
    pub fn to_serializable(&self, resolver: Option<&dyn ModelResolver>) -> SerializedItem {
        SerializedItem {
            row_id: self.row_id.clone(),
            id: self.id.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
            price_tax: self.price_tax(),
            tax: self.tax(),
            tax_rate: self.tax_rate,
            subtotal: self.subtotal(),
            total: self.total(),
            options: self.options.clone(),
            sub_items: self
                .sub_items
                .iter()
                .map(|s| s.to_serializable(resolver))
                .collect(),
            is_sub_item: self.is_sub_item,
            associated_model: self.associated_model.clone(),
            model: resolver.and_then(|r| self.model(r)),
            created_at: self.created_at.timestamp(),
            updated_at: self.updated_at.timestamp(),
        }
    }

    /// Rebuilds an item from its serialized view.
    ///
    /// The stored row id is kept as-is; derived fields are recomputed.
    pub fn from_serialized(data: SerializedItem) -> CoreResult<Self> {
        validate_item_id(&data.id)?;
        validate_item_name(&data.name)?;
        validate_price_cents(data.price.cents())?;
        validate_quantity(data.quantity)?;

        let sub_items = data
            .sub_items
            .into_iter()
            .map(|s| {
                let mut sub = Item::from_serialized(s)?;
                sub.set_is_sub_item(true);
                Ok(sub)
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Item {
            row_id: data.row_id,
            id: data.id,
            name: data.name,
            quantity: data.quantity,
            price: data.price,
            tax_rate: data.tax_rate,
            options: data.options,
            sub_items,
            is_sub_item: data.is_sub_item,
            associated_model: data.associated_model,
            created_at: from_epoch("created_at", data.created_at)?,
            updated_at: from_epoch("updated_at", data.updated_at)?,
        })
    }

    /// JSON text of [`Item::to_serializable`].
    pub fn to_json(&self, resolver: Option<&dyn ModelResolver>) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_serializable(resolver))
    }
}

/// Wire shape of [`Item`], validated on the way in.
#[derive(Deserialize)]
struct ItemRecord {
    row_id: String,
    id: String,
    name: String,
    quantity: i64,
    price: Money,
    #[serde(default)]
    tax_rate: TaxRate,
    #[serde(default)]
    options: ItemOptions,
    #[serde(default)]
    sub_items: Vec<Item>,
    #[serde(default)]
    is_sub_item: bool,
    #[serde(default)]
    associated_model: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = ItemRecord::deserialize(deserializer)?;
        Item::from_record(record).map_err(de::Error::custom)
    }
}

impl Item {
    fn from_record(record: ItemRecord) -> Result<Self, ValidationError> {
        validate_item_id(&record.id)?;
        validate_item_name(&record.name)?;
        validate_price_cents(record.price.cents())?;
        validate_quantity(record.quantity)?;

        Ok(Item {
            row_id: record.row_id,
            id: record.id,
            name: record.name,
            quantity: record.quantity,
            price: record.price,
            tax_rate: record.tax_rate,
            options: record.options,
            sub_items: record.sub_items,
            is_sub_item: record.is_sub_item,
            associated_model: record.associated_model,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn from_epoch(field: &str, secs: i64) -> CoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("{} is not a valid timestamp", secs),
        }
        .into()
    })
}

// =============================================================================
// Input / Output Shapes
// =============================================================================

/// Attribute set for building a new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    pub price: Money,
    #[serde(default)]
    pub options: ItemOptions,
}

impl ItemAttributes {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        ItemAttributes {
            id: id.into(),
            name: name.into(),
            quantity: None,
            price,
            options: ItemOptions::new(),
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn options(mut self, options: ItemOptions) -> Self {
        self.options = options;
        self
    }
}

/// Partial update of an item. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub options: Option<ItemOptions>,
    #[serde(default)]
    pub regenerate_row_id: bool,
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn options(mut self, options: ItemOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Recompute the row id from the updated id and options.
    pub fn regenerate_row_id(mut self) -> Self {
        self.regenerate_row_id = true;
        self
    }
}

/// Serialized item view handed to hosts (JSON-shaped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedItem {
    pub row_id: String,
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub price: Money,
    pub price_tax: Money,
    pub tax: Money,
    #[serde(default)]
    pub tax_rate: TaxRate,
    pub subtotal: Money,
    pub total: Money,
    #[serde(default)]
    pub options: ItemOptions,
    #[serde(default)]
    pub sub_items: Vec<SerializedItem>,
    #[serde(default)]
    pub is_sub_item: bool,
    #[serde(default)]
    pub associated_model: Option<String>,
    pub model: Option<Value>,
    #[serde(rename = "created_at")]
    pub created_at: i64,
    #[serde(rename = "updated_at")]
    pub updated_at: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

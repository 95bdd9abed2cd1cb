//! In-memory [`ModelResolver`] for hosts without a catalog service, and for tests.

use std::collections::HashMap;

use serde_json::Value;
use trolley_core::ModelResolver;

/// Model types and their entities, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    models: HashMap<String, HashMap<String, Value>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a model type with no entities yet.
    pub fn register_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.models.entry(type_name.into()).or_default();
        self
    }

    /// Adds (or replaces) an entity, declaring its type if needed.
    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        id: impl Into<String>,
        entity: Value,
    ) -> &mut Self {
        self.models
            .entry(type_name.into())
            .or_default()
            .insert(id.into(), entity);
        self
    }

    /// Builder-style [`MemoryResolver::insert`].
    pub fn with(mut self, type_name: impl Into<String>, id: impl Into<String>, entity: Value) -> Self {
        self.insert(type_name, id, entity);
        self
    }
}

impl ModelResolver for MemoryResolver {
    fn exists(&self, type_name: &str) -> bool {
        self.models.contains_key(type_name)
    }

    fn find_by_id(&self, type_name: &str, id: &str) -> Option<Value> {
        self.models.get(type_name)?.get(id).cloned()
    }
}

/// Resolver that knows no model types.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModels;

impl ModelResolver for NoModels {
    fn exists(&self, _type_name: &str) -> bool {
        false
    }

    fn find_by_id(&self, _type_name: &str, _id: &str) -> Option<Value> {
        None
    }
}

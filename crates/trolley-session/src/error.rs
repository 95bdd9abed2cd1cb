//! # Session Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Lookup      │  │     Collaborators       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  ConfigError    │  │  RowNotFound    │  │  StoreError             │ │
//! │  │  UnknownHasher  │  │  ModelNotFound  │  │   (Io, Serialization,   │ │
//! │  │   (via Core)    │  │  DuplicateRow   │  │    Poisoned)            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Validation failures arrive wrapped in CartError::Core.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use trolley_core::{CoreError, ValidationError};

/// Result type alias for session operations.
pub type CartResult<T> = Result<T, CartError>;

/// Everything a cart operation can fail with.
///
/// A failed operation never persists a partially mutated tree: the store is
/// only written after the in-memory mutation has fully succeeded.
#[derive(Debug, Error)]
pub enum CartError {
    /// Item, tree or hasher failure (validation included).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No row with this id anywhere in the current instance.
    #[error("The cart does not contain rowId {0}.")]
    RowNotFound(String),

    /// The model resolver does not know the requested type.
    #[error("The supplied model {0} does not exist.")]
    ModelNotFound(String),

    /// Inserting would put the same row id in two places of the tree.
    #[error("Row {0} already exists elsewhere in the cart")]
    DuplicateRow(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for CartError {
    fn from(err: ValidationError) -> Self {
        CartError::Core(err.into())
    }
}

impl CartError {
    /// Whether this is a "row not found" failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CartError::RowNotFound(_))
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of a [`CartStore`](crate::store::CartStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    Poisoned,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid cart configuration: {0}")]
    Invalid(String),

    /// Unknown hasher name (from file or environment).
    #[error(transparent)]
    Hasher(#[from] CoreError),
}

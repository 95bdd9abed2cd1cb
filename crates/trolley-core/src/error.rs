//! # Error Types
//!
//! Domain-specific error types for trolley-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  trolley-core errors (this file)                                       │
//! │  ├── CoreError        - Item / tree / hasher failures                  │
//! │  └── ValidationError  - Bad caller input (id, name, price, quantity)   │
//! │                                                                         │
//! │  trolley-session errors (separate crate)                               │
//! │  └── CartError        - Row lookups, model resolution, store failures  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CartError → host                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by the pure cart logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The configured row id strategy does not exist.
    ///
    /// ## When This Occurs
    /// - A config file names a hasher that was never implemented
    /// - A typo in `TROLLEY_HASHER`
    ///
    /// Surfaced when the hasher is built, never lazily on first use.
    #[error("Unsupported hasher method [{0}]")]
    UnknownHasher(String),

    /// A sub-item would end up containing its own parent.
    #[error("Item {child} cannot be attached below {parent}: it already contains that row")]
    SelfContainment { child: String, parent: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before an [`Item`](crate::Item) is built or mutated; the item is
/// never left half-constructed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., options that are not a JSON object).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

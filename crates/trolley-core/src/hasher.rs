//! # Row Hashing
//!
//! Derives the `row_id` of an item from its logical id and options.
//!
//! ## Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Row Id Strategies                                │
//! │                                                                         │
//! │  CONTENT (default)                                                     │
//! │  ─────────────────                                                     │
//! │  sha256(id ‖ 0x00 ‖ canonical(options)), first 128 bits, lowercase hex │
//! │  • Same (id, options) → same row id, always                            │
//! │  • Adding the same product twice merges into one row                   │
//! │                                                                         │
//! │  RANDOM                                                                │
//! │  ──────                                                                │
//! │  16 random alphanumeric characters, ignores its input                  │
//! │                                                                         │
//! │  UUID                                                                  │
//! │  ────                                                                  │
//! │  Random UUID v4, ignores its input                                     │
//! │                                                                         │
//! │  RANDOM and UUID give every add its own row: no quantity merging.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CoreError;
use crate::options::ItemOptions;

/// Length of random-string row ids.
pub const RANDOM_ROW_ID_LEN: usize = 16;

// =============================================================================
// Hasher Trait
// =============================================================================

/// Computes row identifiers.
///
/// Items and trees never care which strategy is installed; only the
/// merge-on-add behavior of the session depends on determinism.
pub trait RowHasher: Send + Sync + fmt::Debug {
    /// Returns the row id for `(id, options)`.
    fn hash(&self, id: &str, options: &ItemOptions) -> String;

    /// Strategy name, as used in configuration.
    fn name(&self) -> &'static str;
}

/// Deterministic content hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl RowHasher for ContentHasher {
    fn hash(&self, id: &str, options: &ItemOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(options.canonical().as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    fn name(&self) -> &'static str {
        "content"
    }
}

/// Random alphanumeric token per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStringHasher;

impl RowHasher for RandomStringHasher {
    fn hash(&self, _id: &str, _options: &ItemOptions) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_ROW_ID_LEN)
            .map(char::from)
            .collect()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Random UUID v4 per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidHasher;

impl RowHasher for UuidHasher {
    fn hash(&self, _id: &str, _options: &ItemOptions) -> String {
        Uuid::new_v4().to_string()
    }

    fn name(&self) -> &'static str {
        "uuid"
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Configured row id strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    #[default]
    #[serde(alias = "md5")]
    Content,
    #[serde(alias = "randomstring")]
    Random,
    Uuid,
}

impl HasherKind {
    /// Builds the hasher for this strategy.
    pub fn build(self) -> Arc<dyn RowHasher> {
        match self {
            HasherKind::Content => Arc::new(ContentHasher),
            HasherKind::Random => Arc::new(RandomStringHasher),
            HasherKind::Uuid => Arc::new(UuidHasher),
        }
    }

    /// Returns true when equal inputs always produce equal row ids.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, HasherKind::Content)
    }
}

impl fmt::Display for HasherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HasherKind::Content => write!(f, "content"),
            HasherKind::Random => write!(f, "random"),
            HasherKind::Uuid => write!(f, "uuid"),
        }
    }
}

impl FromStr for HasherKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" | "md5" => Ok(HasherKind::Content),
            "random" | "randomstring" => Ok(HasherKind::Random),
            "uuid" => Ok(HasherKind::Uuid),
            other => Err(CoreError::UnknownHasher(other.to_string())),
        }
    }
}

/// Builds a hasher from its configured name.
///
/// ```rust
/// use trolley_core::hasher::make_hasher;
///
/// assert_eq!(make_hasher("uuid").unwrap().name(), "uuid");
/// assert!(make_hasher("foo").is_err());
/// ```
pub fn make_hasher(name: &str) -> Result<Arc<dyn RowHasher>, CoreError> {
    Ok(name.parse::<HasherKind>()?.build())
}

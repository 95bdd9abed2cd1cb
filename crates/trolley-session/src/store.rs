//! # Cart Stores
//!
//! Where item trees live between operations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Store Contract                                 │
//! │                                                                         │
//! │   key "cart.default"  ──►  ItemTree (or nothing)                        │
//! │                                                                         │
//! │   has(key)        is anything stored under this key                     │
//! │   get(key)        Some(tree) | None                                     │
//! │   put(key, Some)  store / overwrite                                     │
//! │   put(key, None)  forget the key                                        │
//! │                                                                         │
//! │   MemoryStore     process-local map, for tests and single hosts         │
//! │   JsonFileStore   one <key>.json file per key in a directory            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};
use trolley_core::ItemTree;

use crate::error::{StoreError, StoreResult};

/// Key-value storage for cart instances.
///
/// One store is shared by every session of a host; keys keep the instances
/// apart.
pub trait CartStore: Send + Sync {
    fn has(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> StoreResult<Option<ItemTree>>;

    /// Stores `tree` under `key`, or removes the key when `tree` is `None`.
    fn put(&self, key: &str, tree: Option<ItemTree>) -> StoreResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, ItemTree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl CartStore for MemoryStore {
    fn has(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn get(&self, key: &str) -> StoreResult<Option<ItemTree>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, tree: Option<ItemTree>) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        match tree {
            Some(tree) => {
                entries.insert(key.to_string(), tree);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Directory-backed store, one pretty-printed JSON file per key.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous tree intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates, if needed) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(?dir, "Opened JSON cart store");
        Ok(JsonFileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `key`. ASCII letters, digits, `.` and `-` are kept; every
    /// other byte becomes `_XX` (hex), so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
                file.push(byte as char);
            } else {
                file.push_str(&format!("_{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", file))
    }
}

impl CartStore for JsonFileStore {
    fn has(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn get(&self, key: &str) -> StoreResult<Option<ItemTree>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn put(&self, key: &str, tree: Option<ItemTree>) -> StoreResult<()> {
        let path = self.path_for(key);
        match tree {
            Some(tree) => {
                let tmp = path.with_extension("json.tmp");
                std::fs::write(&tmp, serde_json::to_string_pretty(&tree)?)?;
                std::fs::rename(&tmp, &path)?;
            }
            None => {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return Err(e.into());
                    }
                    warn!(key, "Removing cart that was never stored");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trolley_core::{ContentHasher, Item, ItemOptions, Money};

    fn sample_tree() -> ItemTree {
        let mut burger = Item::new(
            &ContentHasher,
            "1",
            "Hamburger",
            Money::from_cents(1000),
            ItemOptions::new().with("size", "L"),
        )
        .unwrap();
        let bacon = Item::new(
            &ContentHasher,
            "99",
            "Extra Bacon",
            Money::from_cents(99),
            ItemOptions::new(),
        )
        .unwrap();
        burger.add_sub_item(bacon).unwrap();

        let mut tree = ItemTree::new();
        tree.put(burger);
        tree
    }

    #[test]
    fn test_memory_store_put_get_remove() {
        let store = MemoryStore::new();
        assert!(!store.has("cart.default"));
        assert!(store.get("cart.default").unwrap().is_none());

        let tree = sample_tree();
        store.put("cart.default", Some(tree.clone())).unwrap();
        assert!(store.has("cart.default"));
        assert_eq!(store.get("cart.default").unwrap(), Some(tree));
        assert_eq!(store.keys(), vec!["cart.default".to_string()]);

        store.put("cart.default", None).unwrap();
        assert!(!store.has("cart.default"));
    }

    #[test]
    fn test_json_store_persists_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("carts")).unwrap();

        let stored = sample_tree();
        store.put("cart.default", Some(stored.clone())).unwrap();
        assert!(store.has("cart.default"));

        // A second handle on the same directory sees the same data.
        let reopened = JsonFileStore::open(store.dir()).unwrap();
        let tree = reopened.get("cart.default").unwrap().unwrap();
        assert_eq!(tree, stored);
        assert_eq!(tree.flatten().len(), 2);
        assert!(tree.flatten()[1].is_sub_item());
    }

    #[test]
    fn test_json_store_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store.put("cart.default", Some(sample_tree())).unwrap();
        store.put("cart.default", None).unwrap();
        assert!(!store.has("cart.default"));
        assert!(store.get("cart.default").unwrap().is_none());

        // Removing twice is fine.
        store.put("cart.default", None).unwrap();
    }

    #[test]
    fn test_json_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store.put("cart.../evil", Some(ItemTree::new())).unwrap();
        assert!(store.has("cart.../evil"));
        assert!(dir.path().join("cart..._2Fevil.json").is_file());
    }

    #[test]
    fn test_json_store_escaped_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let tree = sample_tree();
        store.put("cart.a/b", Some(tree.clone())).unwrap();
        assert!(!store.has("cart.a_b"));
        assert!(store.get("cart.a_b").unwrap().is_none());

        store.put("cart.a_b", Some(ItemTree::new())).unwrap();
        assert_eq!(store.get("cart.a/b").unwrap(), Some(tree));
        assert_eq!(store.get("cart.a_b").unwrap(), Some(ItemTree::new()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_json_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("cart.default.json"), "not json").unwrap();

        assert!(matches!(
            store.get("cart.default"),
            Err(StoreError::Serialization(_))
        ));
    }
}

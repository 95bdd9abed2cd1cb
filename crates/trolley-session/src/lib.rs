//! # trolley-session: Cart Orchestration
//!
//! Binds the pure cart logic of `trolley-core` to a store, an event sink and
//! a model resolver, all supplied by the host.
//!
//! ## Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CartSession Wiring                               │
//! │                                                                         │
//! │                       ┌──────────────────┐                              │
//! │   CartConfig ────────►│   CartSession    │◄──── instance("wishlist")   │
//! │   (TOML + env)        │                  │                              │
//! │                       └──┬──────┬─────┬──┘                              │
//! │                          │      │     │                                 │
//! │          ┌───────────────┘      │     └────────────────┐                │
//! │          ▼                      ▼                      ▼                │
//! │   ┌─────────────┐      ┌────────────────┐      ┌───────────────┐       │
//! │   │ CartStore   │      │ CartEventSink  │      │ ModelResolver │       │
//! │   │ Memory      │      │ Recording      │      │ MemoryResolver│       │
//! │   │ JsonFile    │      │ Tracing        │      │ NoModels      │       │
//! │   │             │      │ Broadcast      │      │               │       │
//! │   └─────────────┘      └────────────────┘      └───────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trolley_core::{ItemAttributes, Money};
//! use trolley_session::{CartConfig, CartSession, MemoryStore, RecordingSink};
//!
//! let events = Arc::new(RecordingSink::new());
//! let cart = CartSession::new(CartConfig::default(), Arc::new(MemoryStore::new()), events.clone()).unwrap();
//!
//! let burger = cart.add(ItemAttributes::new("1", "Hamburger", Money::from_cents(1000)).quantity(2)).unwrap();
//! cart.add_sub_item(ItemAttributes::new("99", "Extra Bacon", Money::from_cents(99)), burger.row_id()).unwrap();
//!
//! assert_eq!(cart.count().unwrap(), 3);
//! assert_eq!(cart.total().unwrap().cents(), 2380 + 118);
//! assert_eq!(events.names(), vec!["cart.added", "cart.subitem.added"]);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod resolver;
pub mod session;
pub mod store;

pub use config::{CartConfig, DEFAULT_INSTANCE, DEFAULT_TAX_RATE};
pub use error::{CartError, CartResult, ConfigError, ConfigResult, StoreError, StoreResult};
pub use events::{BroadcastSink, CartEvent, CartEventSink, NoopSink, RecordingSink, TracingSink};
pub use resolver::{MemoryResolver, NoModels};
pub use session::{CartSession, CartUpdate, ItemInput};
pub use store::{CartStore, JsonFileStore, MemoryStore};

//! modstore core runtime
//!
//! A store is a tree of modules. Each module owns a slice of the state tree
//! and declares mutations (synchronous state changes), actions (async work
//! that commits mutations) and getters (derived values). The store flattens
//! the tree into registries keyed by namespaced type strings and routes
//! `commit`/`dispatch` calls to the matching handlers.
//!
//! # Example
//!
//! ```rust
//! use modstore_core::{RawModule, Store, StoreOptions};
//! use modstore_state::path;
//! use serde_json::json;
//!
//! let cart = RawModule::new()
//!     .namespaced(true)
//!     .state(json!({"items": []}))
//!     .mutation("add", |state, item| {
//!         if let Some(items) = state["items"].as_array_mut() {
//!             items.push(item.clone());
//!         }
//!     })
//!     .getter("count", |ctx| json!(ctx.state()["items"].as_array().map_or(0, Vec::len)));
//!
//! let store = Store::new(StoreOptions::new(RawModule::new().module("cart", cart))).unwrap();
//! store.commit("cart/add", json!("pen"));
//!
//! assert_eq!(store.state()["cart"]["items"], json!(["pen"]));
//! assert_eq!(store.getters().get("cart/count"), Some(json!(1)));
//! assert_eq!(store.module_namespace(&path!("cart")).unwrap(), "cart/");
//! ```

mod context;
mod diagnostics;
mod dispatch;
mod error;
mod handler;
mod host;
mod module;
mod module_tree;
mod registry;
mod store;
mod typed;

pub use context::{
    ActionContext, CommitOptions, DispatchOptions, GetterContext, Getters, LocalContext,
};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, RecordingSink};
pub use dispatch::Dispatch;
pub use error::{ActionError, Result, StoreError};
pub use handler::{Action, ActionFuture, FnAction, GetterFn, MutationFn, SyncAction};
pub use host::Host;
pub use module::{Module, RawModule, StateSource};
pub use module_tree::{ModuleTree, UpdateConflict};
pub use store::{
    MutationRecord, Plugin, RegisterOptions, Store, StoreOptions, Subscriber, Subscription,
    WatchHandle, STRICT_ENV,
};
pub use typed::{to_payload, TypedState};

pub use modstore_state::{Path, WatchOptions};

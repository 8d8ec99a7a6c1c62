//! modstore: a hierarchical, namespaced state container.
//!
//! An application describes its state as a tree of modules. Each module owns
//! a slice of the state tree plus mutations, actions and getters; the store
//! routes `commit`/`dispatch` calls by namespaced type string.
//!
//! Layers:
//! - [`state`]: paths, JSON tree navigation, the reactive container
//! - [`runtime`]: modules, the module tree, the store runtime
//!
//! ```rust
//! use modstore::prelude::*;
//!
//! let todos = RawModule::new()
//!     .namespaced(true)
//!     .state(json!({"items": []}))
//!     .mutation("add", |state, item| {
//!         if let Some(items) = state["items"].as_array_mut() {
//!             items.push(item.clone());
//!         }
//!     });
//!
//! let store = Store::new(StoreOptions::new(RawModule::new().module("todos", todos))).unwrap();
//! store.commit("todos/add", json!("write docs"));
//! assert_eq!(store.state()["todos"]["items"], json!(["write docs"]));
//! ```

pub use modstore_core as runtime;
pub use modstore_state as state;

pub use modstore_core::*;
pub use modstore_state::{path, Container, ContainerFactory, ReactiveFactory, ReactiveState};

pub mod prelude {
    pub use modstore_core::{
        Action, ActionContext, ActionError, ActionFuture, CommitOptions, DispatchOptions,
        GetterContext, Getters, Path, RawModule, RegisterOptions, Store, StoreError, StoreOptions,
        TypedState, WatchOptions,
    };
    pub use modstore_state::path;
    pub use serde_json::{json, Value};
}

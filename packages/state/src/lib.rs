//! modstore state layer
//!
//! The pieces the store runtime builds on:
//! - `Path`: key sequence addressing a module and its state slice
//! - `value`: navigation over `serde_json::Value` trees
//! - `Container`: live, observable state plus lazily cached computed values
//! - `Watcher`: re-evaluates a getter on change and reports new values
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use modstore_state::{path, Container, ContainerFactory, ReactiveFactory};
//! use serde_json::json;
//!
//! let container = ReactiveFactory.construct(json!({"cart": {"items": []}}), BTreeMap::new());
//! container.set(&path!("cart"), "open", json!(true)).unwrap();
//! assert_eq!(container.get(&path!("cart/open")), Some(json!(true)));
//! ```

mod container;
mod error;
mod path;
mod reactive;
pub mod sync;
pub mod value;
mod watch;

pub use container::{
    Change, ChangeKind, Computed, Container, ContainerFactory, Listener, ListenerId,
};
pub use error::{Error, Result};
pub use path::{Path, PathError};
pub use reactive::{ReactiveFactory, ReactiveState};
pub use watch::{WatchCallback, WatchGetter, WatchOptions, Watcher};

pub use serde_json::Value;

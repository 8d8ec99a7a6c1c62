//! The reactive container boundary.
//!
//! A container holds the live state tree together with the computed
//! (derived) values registered for it, and tells listeners about every write.
//! The store never writes state behind the container's back, so a listener
//! sees each change exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::path::Path;

/// A computed definition: evaluated lazily, cached until the next write.
pub type Computed = Arc<dyn Fn() -> Value + Send + Sync>;

/// A change listener. Called synchronously after the write completed.
pub type Listener = Arc<dyn Fn(&Change) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of write happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A sub-tree was edited in place.
    Update,
    /// A key was set on an object.
    Set,
    /// A key was removed from an object.
    Delete,
    /// The whole tree was swapped.
    Replace,
}

/// A single write notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The path that was written. For `Set`/`Delete` this includes the key.
    pub path: Path,
    pub kind: ChangeKind,
}

/// Live, observable state.
///
/// # Object Safety
///
/// This trait is object-safe; the store keeps an `Arc<dyn Container>`.
pub trait Container: Send + Sync {
    /// Run `f` against the current state tree.
    fn read(&self, f: &mut dyn FnMut(&Value));

    /// Edit the sub-tree at `path` in place.
    fn update(&self, path: &Path, f: &mut dyn FnMut(&mut Value)) -> Result<()>;

    /// Set `key` on the object at `parent`.
    fn set(&self, parent: &Path, key: &str, value: Value) -> Result<()>;

    /// Remove `key` from the object at `parent`.
    fn delete(&self, parent: &Path, key: &str) -> Result<Option<Value>>;

    /// Swap the whole state tree.
    fn replace(&self, state: Value) -> Result<()>;

    /// Evaluate (or return the cached) computed value for `key`.
    fn computed(&self, key: &str) -> Option<Value>;

    /// All computed keys, in sorted order.
    fn computed_keys(&self) -> Vec<String>;

    fn listen(&self, listener: Listener) -> ListenerId;

    fn unlisten(&self, id: ListenerId) -> bool;

    /// Drop listeners and computed definitions. Writes fail afterwards.
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;

    /// Clone of the whole state tree.
    fn snapshot(&self) -> Value {
        let mut out = Value::Null;
        self.read(&mut |state| out = state.clone());
        out
    }

    /// Clone of the sub-tree at `path`, if it exists.
    fn get(&self, path: &Path) -> Option<Value> {
        let mut out = None;
        self.read(&mut |state| {
            out = crate::value::get_path(state, path).ok().flatten().cloned();
        });
        out
    }
}

/// Builds containers. The store calls this once at construction and again
/// after every structural change.
pub trait ContainerFactory: Send + Sync {
    fn construct(&self, state: Value, computed: BTreeMap<String, Computed>) -> Arc<dyn Container>;
}

impl<T: ContainerFactory + ?Sized> ContainerFactory for Arc<T> {
    fn construct(&self, state: Value, computed: BTreeMap<String, Computed>) -> Arc<dyn Container> {
        self.as_ref().construct(state, computed)
    }
}

//! Namespace-scoped views handed to handlers.
//!
//! Nothing here caches state: every accessor walks the store's current
//! container, so a context stays valid across container rebuilds.

use std::fmt;
use std::sync::Weak;

use modstore_state::Path;
use serde_json::{Map, Value};

use crate::diagnostics::Diagnostic;
use crate::dispatch::Dispatch;
use crate::store::StoreInner;

/// Options for a commit issued through a local context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Skip the namespace prefix and commit the type as given.
    pub root: bool,
}

/// Options for a dispatch issued through a local context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Skip the namespace prefix and dispatch the type as given.
    pub root: bool,
}

/// Read access to getters under a namespace prefix.
///
/// The root view (empty prefix) exposes every getter by its full type; a
/// namespaced view exposes the getters below its prefix with the prefix
/// stripped.
#[derive(Clone)]
pub struct Getters {
    store: Weak<StoreInner>,
    namespace: String,
}

impl Getters {
    pub(crate) fn new(store: Weak<StoreInner>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// The prefix this view strips; empty for the root view.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let store = self.store.upgrade()?;
        store.container().computed(&format!("{}{}", self.namespace, key))
    }

    pub fn keys(&self) -> Vec<String> {
        let Some(store) = self.store.upgrade() else {
            return Vec::new();
        };
        store
            .container()
            .computed_keys()
            .into_iter()
            .filter_map(|ty| ty.strip_prefix(&self.namespace).map(str::to_string))
            .collect()
    }

    /// Evaluate every visible getter into one object.
    pub fn to_map(&self) -> Map<String, Value> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }
}

impl fmt::Debug for Getters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getters")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// A module's view of the store.
///
/// With an empty namespace every operation goes straight to the store.
/// Otherwise local types are prefixed with the namespace before they are
/// forwarded, and getters are filtered to the namespace.
#[derive(Clone)]
pub struct LocalContext {
    store: Weak<StoreInner>,
    namespace: String,
    path: Path,
}

impl LocalContext {
    pub(crate) fn new(store: Weak<StoreInner>, namespace: String, path: Path) -> Self {
        Self {
            store,
            namespace,
            path,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The module's state slice, or `Null` if it is gone.
    pub fn state(&self) -> Value {
        self.store
            .upgrade()
            .and_then(|store| store.container().get(&self.path))
            .unwrap_or(Value::Null)
    }

    pub fn getters(&self) -> Getters {
        Getters::new(self.store.clone(), self.namespace.clone())
    }

    pub fn commit(&self, ty: &str, payload: Value) {
        self.commit_with(ty, payload, CommitOptions::default());
    }

    pub fn commit_with(&self, ty: &str, payload: Value, options: CommitOptions) {
        let Some(store) = self.store.upgrade() else {
            tracing::debug!(target: "modstore", ty, "commit on a dropped store");
            return;
        };
        if self.namespace.is_empty() || options.root {
            store.commit(ty, payload);
            return;
        }
        let global = format!("{}{}", self.namespace, ty);
        if !store.has_mutation(&global) {
            store.diagnostics().report(Diagnostic::UnknownLocalMutation {
                local: ty.to_string(),
                global,
            });
            return;
        }
        store.commit(&global, payload);
    }

    pub fn dispatch(&self, ty: &str, payload: Value) -> Dispatch {
        self.dispatch_with(ty, payload, DispatchOptions::default())
    }

    pub fn dispatch_with(&self, ty: &str, payload: Value, options: DispatchOptions) -> Dispatch {
        let Some(store) = self.store.upgrade() else {
            tracing::debug!(target: "modstore", ty, "dispatch on a dropped store");
            return Dispatch::noop();
        };
        if self.namespace.is_empty() || options.root {
            return store.dispatch(ty, payload);
        }
        let global = format!("{}{}", self.namespace, ty);
        if !store.has_action(&global) {
            store.diagnostics().report(Diagnostic::UnknownLocalAction {
                local: ty.to_string(),
                global,
            });
            return Dispatch::noop();
        }
        store.dispatch(&global, payload)
    }

    pub(crate) fn root_state(&self) -> Value {
        self.store
            .upgrade()
            .map(|store| store.container().snapshot())
            .unwrap_or(Value::Null)
    }

    pub(crate) fn root_getters(&self) -> Getters {
        Getters::new(self.store.clone(), String::new())
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish()
    }
}

/// What an action handler receives: its module's local context plus root
/// access.
#[derive(Clone, Debug)]
pub struct ActionContext {
    local: LocalContext,
}

impl ActionContext {
    pub(crate) fn new(local: LocalContext) -> Self {
        Self { local }
    }

    pub fn local(&self) -> &LocalContext {
        &self.local
    }

    pub fn state(&self) -> Value {
        self.local.state()
    }

    pub fn getters(&self) -> Getters {
        self.local.getters()
    }

    pub fn root_state(&self) -> Value {
        self.local.root_state()
    }

    pub fn root_getters(&self) -> Getters {
        self.local.root_getters()
    }

    pub fn commit(&self, ty: &str, payload: Value) {
        self.local.commit(ty, payload);
    }

    pub fn commit_with(&self, ty: &str, payload: Value, options: CommitOptions) {
        self.local.commit_with(ty, payload, options);
    }

    pub fn dispatch(&self, ty: &str, payload: Value) -> Dispatch {
        self.local.dispatch(ty, payload)
    }

    pub fn dispatch_with(&self, ty: &str, payload: Value, options: DispatchOptions) -> Dispatch {
        self.local.dispatch_with(ty, payload, options)
    }
}

/// What a getter receives.
#[derive(Clone, Debug)]
pub struct GetterContext {
    local: LocalContext,
}

impl GetterContext {
    pub(crate) fn new(local: LocalContext) -> Self {
        Self { local }
    }

    pub fn state(&self) -> Value {
        self.local.state()
    }

    pub fn getters(&self) -> Getters {
        self.local.getters()
    }

    pub fn root_state(&self) -> Value {
        self.local.root_state()
    }

    pub fn root_getters(&self) -> Getters {
        self.local.root_getters()
    }
}

//! The store: module tree, registries, live container and the public
//! commit/dispatch surface.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use modstore_state::sync::{lock, read, write};
use modstore_state::{
    value, Change, Computed, Container, ContainerFactory, Listener, Path, WatchCallback,
    WatchGetter, WatchOptions, Watcher,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{ActionContext, GetterContext, Getters};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Diagnostics};
use crate::dispatch::{gather, Dispatch};
use crate::error::{Result, StoreError};
use crate::handler::ActionFuture;
use crate::host::Host;
use crate::module::RawModule;
use crate::module_tree::ModuleTree;
use crate::registry::{Installer, Registry};

/// Called once with the fully installed store.
pub type Plugin = Arc<dyn Fn(&Store) + Send + Sync>;

/// Called after every commit with the mutation and the new root state.
pub type Subscriber = Arc<dyn Fn(&MutationRecord, &Value) + Send + Sync>;

/// Environment variable read by [`StoreOptions::strict_from_env`].
pub const STRICT_ENV: &str = "MODSTORE_STRICT";

/// A committed mutation as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub ty: String,
    pub payload: Value,
}

/// Store configuration.
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub root: RawModule,
    pub strict: bool,
    pub plugins: Vec<Plugin>,
    pub diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl StoreOptions {
    pub fn new(root: RawModule) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Turn strict mode on when `MODSTORE_STRICT` is `1` or `true`.
    pub fn strict_from_env(self) -> Self {
        let strict = std::env::var(STRICT_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        self.strict(strict)
    }

    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("root", &self.root)
            .field("strict", &self.strict)
            .field("plugins", &self.plugins.len())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

/// Options for [`Store::register_module`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Keep whatever state already sits at the module's path instead of
    /// splicing in the module's own.
    pub preserve_state: bool,
}

/// Sets the committing flag for its lifetime and restores the previous value
/// on drop, so nested scopes unwind correctly.
struct CommitScope<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl<'a> CommitScope<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        let previous = flag.swap(true, Ordering::AcqRel);
        Self { flag, previous }
    }
}

impl Drop for CommitScope<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::Release);
    }
}

pub(crate) struct StoreInner {
    factory: Arc<dyn ContainerFactory>,
    tree: RwLock<ModuleTree>,
    registry: RwLock<Arc<Registry>>,
    container: RwLock<Arc<dyn Container>>,
    retired: Mutex<Vec<Arc<dyn Container>>>,
    committing: AtomicBool,
    strict: bool,
    subscribers: RwLock<Vec<Subscriber>>,
    watchers: RwLock<Vec<Arc<Watcher>>>,
    diagnostics: Diagnostics,
    this: Weak<StoreInner>,
}

impl StoreInner {
    pub(crate) fn container(&self) -> Arc<dyn Container> {
        Arc::clone(&read(&self.container))
    }

    pub(crate) fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn registry(&self) -> Arc<Registry> {
        Arc::clone(&read(&self.registry))
    }

    pub(crate) fn has_mutation(&self, ty: &str) -> bool {
        self.registry().mutations(ty).is_some()
    }

    pub(crate) fn has_action(&self, ty: &str) -> bool {
        self.registry().actions(ty).is_some()
    }

    fn is_committing(&self) -> bool {
        self.committing.load(Ordering::Acquire)
    }

    pub(crate) fn commit(&self, ty: &str, payload: Value) {
        let registry = self.registry();
        let Some(entries) = registry.mutations(ty) else {
            self.diagnostics.report(Diagnostic::UnknownMutation { ty: ty.to_string() });
            return;
        };

        tracing::trace!(target: "modstore", ty, handlers = entries.len(), "commit");
        let container = self.container();
        {
            let _scope = CommitScope::enter(&self.committing);
            for entry in entries {
                let result = container
                    .update(&entry.path, &mut |local: &mut Value| (entry.handler)(local, &payload));
                if result.is_err() {
                    self.diagnostics.report(Diagnostic::MissingState {
                        path: entry.path.clone(),
                    });
                }
            }
        }

        let subscribers: Vec<Subscriber> = read(&self.subscribers).clone();
        if subscribers.is_empty() {
            return;
        }
        let record = MutationRecord {
            ty: ty.to_string(),
            payload,
        };
        let state = self.container().snapshot();
        for subscriber in subscribers {
            subscriber(&record, &state);
        }
    }

    pub(crate) fn dispatch(&self, ty: &str, payload: Value) -> Dispatch {
        let registry = self.registry();
        let Some(entries) = registry.actions(ty) else {
            self.diagnostics.report(Diagnostic::UnknownAction { ty: ty.to_string() });
            return Dispatch::noop();
        };

        tracing::trace!(target: "modstore", ty, handlers = entries.len(), "dispatch");
        let handlers: Vec<ActionFuture> = entries
            .iter()
            .map(|entry| {
                let ctx = ActionContext::new(entry.context.clone());
                entry.handler.call(ctx, payload.clone())
            })
            .collect();
        Dispatch::new(gather(ty.to_string(), handlers, self.diagnostics.clone()))
    }

    fn with_commit<T>(&self, f: impl FnOnce() -> T) -> T {
        let _scope = CommitScope::enter(&self.committing);
        f()
    }

    /// Splice queued module state into the live container.
    fn apply_splices(&self, splices: Vec<(Path, Value)>) {
        let container = self.container();
        self.with_commit(|| {
            for (path, state) in splices {
                let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
                    continue;
                };
                if container.set(&parent, key, state).is_err() {
                    self.diagnostics.report(Diagnostic::MissingState { path: path.clone() });
                }
            }
        });
    }

    /// Rebuild the registries from the whole tree. State is reused.
    fn reset(&self, hot: bool) {
        let mut registry = Registry::default();
        {
            let mut tree = write(&self.tree);
            Installer::new(&mut registry, self.this.clone(), &self.diagnostics, true)
                .install(&Path::root(), "", tree.root_mut());
        }
        *write(&self.registry) = Arc::new(registry);
        self.reset_container(hot);
    }

    /// Replace the container with one carrying the current getters.
    ///
    /// The old container is retired rather than destroyed; with `hot` its
    /// state is nulled first so anything still observing it sees the
    /// teardown.
    fn reset_container(&self, hot: bool) {
        self.flush_teardown();

        let state = self.container().snapshot();
        let registry = self.registry();
        let fresh = build_container(
            self.factory.as_ref(),
            &self.this,
            &registry,
            state,
            self.strict,
        );
        let old = std::mem::replace(&mut *write(&self.container), fresh);

        if hot {
            self.with_commit(|| {
                if let Err(e) = old.replace(Value::Null) {
                    tracing::debug!(
                        target: "modstore",
                        error = %e,
                        "retired container already destroyed"
                    );
                }
            });
        }
        lock(&self.retired).push(old);
    }

    fn flush_teardown(&self) {
        let retired = std::mem::take(&mut *lock(&self.retired));
        for container in retired {
            container.destroy();
        }
    }
}

/// Build a container whose computed values are the registry's getters, and
/// hook up strict mode and watchers.
fn build_container(
    factory: &dyn ContainerFactory,
    store: &Weak<StoreInner>,
    registry: &Registry,
    state: Value,
    strict: bool,
) -> Arc<dyn Container> {
    let mut computed: BTreeMap<String, Computed> = BTreeMap::new();
    for (ty, entry) in &registry.getters {
        let entry = Arc::clone(entry);
        computed.insert(
            ty.clone(),
            Arc::new(move || (entry.handler)(&GetterContext::new(entry.context.clone()))),
        );
    }
    let container = factory.construct(state, computed);

    if strict {
        let store = store.clone();
        let listener: Listener = Arc::new(move |change: &Change| {
            if let Some(store) = store.upgrade() {
                if !store.is_committing() {
                    store.diagnostics.report(Diagnostic::StrictViolation {
                        path: change.path.clone(),
                    });
                }
            }
        });
        container.listen(listener);
    }

    let store = store.clone();
    container.listen(Arc::new(move |_: &Change| {
        if let Some(store) = store.upgrade() {
            let watchers: Vec<Arc<Watcher>> = read(&store.watchers).clone();
            for watcher in watchers {
                watcher.check();
            }
        }
    }));

    container
}

/// Handle to a store. Cloning is cheap; all clones share the same store.
///
/// ```rust
/// use modstore_core::{RawModule, Store, StoreOptions};
/// use serde_json::json;
///
/// let root = RawModule::new()
///     .state(json!({"count": 0}))
///     .mutation("inc", |state, by| {
///         let next = state["count"].as_i64().unwrap_or(0) + by.as_i64().unwrap_or(1);
///         state["count"] = json!(next);
///     });
///
/// let store = Store::new(StoreOptions::new(root)).unwrap();
/// store.commit("inc", json!(5));
/// assert_eq!(store.state()["count"], json!(5));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store on a fresh, initialized default host.
    pub fn new(options: StoreOptions) -> Result<Self> {
        let host = Host::new();
        host.init()?;
        Self::with_host(&host, options)
    }

    /// Create a store on `host`, which must have been initialized.
    pub fn with_host(host: &Host, options: StoreOptions) -> Result<Self> {
        if !host.is_initialized() {
            return Err(StoreError::HostNotInitialized);
        }
        let StoreOptions {
            root,
            strict,
            plugins,
            diagnostics,
        } = options;
        let diagnostics = Diagnostics::new(diagnostics);
        let factory = host.factory();
        let mut tree = ModuleTree::new(&root);

        let inner = Arc::new_cyclic(|this: &Weak<StoreInner>| {
            let mut registry = Registry::default();
            let mut installer = Installer::new(&mut registry, this.clone(), &diagnostics, false);
            installer.install(&Path::root(), "", tree.root_mut());
            let splices = installer.finish();

            let mut state = tree.root().state();
            for (path, slice) in splices {
                let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
                    continue;
                };
                if value::set_child(&mut state, &parent, key, slice).is_err() {
                    diagnostics.report(Diagnostic::MissingState { path: path.clone() });
                }
            }

            let container = build_container(factory.as_ref(), this, &registry, state, strict);
            StoreInner {
                factory,
                tree: RwLock::new(tree),
                registry: RwLock::new(Arc::new(registry)),
                container: RwLock::new(container),
                retired: Mutex::new(Vec::new()),
                committing: AtomicBool::new(false),
                strict,
                subscribers: RwLock::new(Vec::new()),
                watchers: RwLock::new(Vec::new()),
                diagnostics,
                this: this.clone(),
            }
        });

        let store = Store { inner };
        tracing::debug!(target: "modstore", strict, plugins = plugins.len(), "store created");
        for plugin in &plugins {
            plugin(&store);
        }
        Ok(store)
    }

    /// Clone of the root state.
    pub fn state(&self) -> Value {
        self.inner.container().snapshot()
    }

    /// Borrow the root state without cloning it.
    pub fn read_state(&self, f: &mut dyn FnMut(&Value)) {
        self.inner.container().read(f);
    }

    /// The root getters view.
    pub fn getters(&self) -> Getters {
        Getters::new(Arc::downgrade(&self.inner), String::new())
    }

    /// The live container. Writing through it bypasses commit; strict mode
    /// reports such writes.
    pub fn container(&self) -> Arc<dyn Container> {
        self.inner.container()
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Run every mutation registered under `ty`, in registration order, then
    /// notify subscribers. Unknown types are reported and ignored.
    pub fn commit(&self, ty: &str, payload: Value) {
        self.inner.commit(ty, payload);
    }

    /// Object-style commit: `{"type": "...", ...}`; the whole object is the
    /// payload.
    pub fn commit_object(&self, mutation: Value) -> Result<()> {
        let ty = object_type(&mutation)?;
        self.inner.commit(&ty, mutation);
        Ok(())
    }

    /// Run every action registered under `ty`.
    pub fn dispatch(&self, ty: &str, payload: Value) -> Dispatch {
        self.inner.dispatch(ty, payload)
    }

    /// Object-style dispatch: `{"type": "...", ...}`.
    pub fn dispatch_object(&self, action: Value) -> Result<Dispatch> {
        let ty = object_type(&action)?;
        Ok(self.inner.dispatch(&ty, action))
    }

    /// Subscribe to commits.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&MutationRecord, &Value) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(subscriber))
    }

    /// Subscribe a shared subscriber. Subscribing the same `Arc` twice keeps
    /// a single registration.
    pub fn subscribe_arc(&self, subscriber: Subscriber) -> Subscription {
        {
            let mut subscribers = write(&self.inner.subscribers);
            if !subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
                subscribers.push(Arc::clone(&subscriber));
            }
        }
        Subscription {
            store: Arc::downgrade(&self.inner),
            subscriber,
        }
    }

    /// Watch a value derived from `(state, getters)`; `callback` receives
    /// `(new, old)` after every change that alters it.
    pub fn watch<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        G: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let store = Arc::downgrade(&self.inner);
        let getters = self.getters();
        let getter: WatchGetter = Arc::new(move || match store.upgrade() {
            Some(store) => getter(&store.container().snapshot(), &getters),
            None => Value::Null,
        });
        let callback: WatchCallback = Arc::new(callback);
        let watcher = Watcher::new(getter, callback, options);
        write(&self.inner.watchers).push(Arc::clone(&watcher));
        WatchHandle {
            store: Arc::downgrade(&self.inner),
            watcher,
        }
    }

    /// Swap the whole state tree. Not a strict-mode violation.
    pub fn replace_state(&self, state: Value) -> Result<()> {
        let container = self.inner.container();
        self.inner.with_commit(|| container.replace(state))?;
        Ok(())
    }

    /// Attach a module at runtime.
    ///
    /// The parent must exist. The subtree is installed into a copy of the
    /// registries that is swapped in once complete, and the container is
    /// rebuilt so the new getters become visible.
    pub fn register_module(
        &self,
        path: &Path,
        raw: RawModule,
        options: RegisterOptions,
    ) -> Result<()> {
        if path.is_root() {
            return Err(StoreError::RootRegistration);
        }

        let splices = {
            let mut tree = write(&self.inner.tree);
            tree.register(path, &raw, true)?;
            let namespace = tree.namespace(path)?;
            let mut registry = Registry::clone(&self.inner.registry());
            let mut installer = Installer::new(
                &mut registry,
                Arc::downgrade(&self.inner),
                &self.inner.diagnostics,
                options.preserve_state,
            );
            installer.install(path, &namespace, tree.get_mut(path)?);
            let splices = installer.finish();
            *write(&self.inner.registry) = Arc::new(registry);
            splices
        };

        tracing::debug!(target: "modstore", %path, "module registered");
        self.inner.apply_splices(splices);
        self.inner.reset_container(false);
        Ok(())
    }

    /// Remove a runtime module and its state.
    ///
    /// Statically declared modules are left alone and a warning is reported.
    pub fn unregister_module(&self, path: &Path) -> Result<()> {
        let removed = write(&self.inner.tree).unregister(path)?;
        if !removed {
            self.inner
                .diagnostics
                .report(Diagnostic::StaticUnregister { path: path.clone() });
            return Ok(());
        }

        if let (Some(parent), Some(key)) = (path.parent(), path.last()) {
            let container = self.inner.container();
            if let Err(e) = self.inner.with_commit(|| container.delete(&parent, key)) {
                tracing::debug!(target: "modstore", %path, error = %e, "no state to remove");
            }
        }
        tracing::debug!(target: "modstore", %path, "module unregistered");
        self.inner.reset(false);
        Ok(())
    }

    /// Swap handlers across the tree without changing its shape.
    ///
    /// Subtrees that would gain a child are skipped and reported.
    pub fn hot_update(&self, raw: RawModule) {
        let conflicts = write(&self.inner.tree).update(&raw);
        for conflict in conflicts {
            self.inner.diagnostics.report(Diagnostic::HotReloadNewModule {
                path: conflict.path,
                key: conflict.key,
            });
        }
        tracing::debug!(target: "modstore", "hot update applied");
        self.inner.reset(true);
    }

    pub fn has_module(&self, path: &Path) -> bool {
        read(&self.inner.tree).contains(path)
    }

    pub fn module_namespace(&self, path: &Path) -> Result<String> {
        read(&self.inner.tree).namespace(path)
    }

    /// Destroy containers retired by earlier rebuilds.
    pub fn flush_teardown(&self) {
        self.inner.flush_teardown();
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("strict", &self.inner.strict)
            .field("diagnostics", &self.inner.diagnostics)
            .finish()
    }
}

fn object_type(object: &Value) -> Result<String> {
    let found = match object {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(ty)) => return Ok(ty.clone()),
            Some(other) => json_kind(other),
            None => "undefined",
        },
        other => json_kind(other),
    };
    Err(StoreError::InvalidType {
        found: found.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn same_subscriber(a: &Subscriber, b: &Subscriber) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Returned by [`Store::subscribe`].
pub struct Subscription {
    store: Weak<StoreInner>,
    subscriber: Subscriber,
}

impl Subscription {
    /// Remove the subscriber. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            write(&store.subscribers).retain(|s| !same_subscriber(s, &self.subscriber));
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Returned by [`Store::watch`].
pub struct WatchHandle {
    store: Weak<StoreInner>,
    watcher: Arc<Watcher>,
}

impl WatchHandle {
    /// Stop the watcher. Calling this more than once is harmless.
    pub fn unwatch(&self) {
        self.watcher.stop();
        if let Some(store) = self.store.upgrade() {
            write(&store.watchers).retain(|w| !Arc::ptr_eq(w, &self.watcher));
        }
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_active()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commit_scope_restores_previous_value() {
        let flag = AtomicBool::new(false);
        {
            let _outer = CommitScope::enter(&flag);
            assert!(flag.load(Ordering::Acquire));
            {
                let _inner = CommitScope::enter(&flag);
                assert!(flag.load(Ordering::Acquire));
            }
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn object_type_requires_string() {
        assert_eq!(object_type(&json!({"type": "inc", "n": 1})).unwrap(), "inc");
        assert!(matches!(
            object_type(&json!({"type": 3})),
            Err(StoreError::InvalidType { found }) if found == "number"
        ));
        assert!(matches!(
            object_type(&json!({"n": 1})),
            Err(StoreError::InvalidType { found }) if found == "undefined"
        ));
        assert!(matches!(
            object_type(&json!([1])),
            Err(StoreError::InvalidType { found }) if found == "array"
        ));
    }

    #[test]
    fn mutation_record_serializes_type_field() {
        let record = MutationRecord {
            ty: "inc".to_string(),
            payload: json!(1),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"type": "inc", "payload": 1})
        );
    }

    #[test]
    fn strict_env_parsing() {
        std::env::set_var(STRICT_ENV, "true");
        assert!(StoreOptions::default().strict_from_env().strict);
        std::env::set_var(STRICT_ENV, "0");
        assert!(!StoreOptions::default().strict_from_env().strict);
        std::env::remove_var(STRICT_ENV);
        assert!(!StoreOptions::default().strict_from_env().strict);
    }
}

//! Module descriptions and live module nodes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::context::{ActionContext, GetterContext, LocalContext};
use crate::error::ActionError;
use crate::handler::{Action, FnAction, GetterFn, MutationFn, SyncAction};

/// Handler and child tables, iterated in declaration order.
pub(crate) type Table<T> = IndexMap<String, T>;

fn keys<T>(table: &Table<T>) -> Vec<&str> {
    table.keys().map(String::as_str).collect()
}

/// Where a module's state comes from.
///
/// A factory lets one description be instantiated several times (multiple
/// registrations, re-registration after a reload) without sharing state.
#[derive(Clone)]
pub enum StateSource {
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl StateSource {
    pub fn produce(&self) -> Value {
        match self {
            StateSource::Value(value) => value.clone(),
            StateSource::Factory(factory) => factory(),
        }
    }
}

impl Default for StateSource {
    fn default() -> Self {
        StateSource::Value(Value::Object(Default::default()))
    }
}

impl fmt::Debug for StateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            StateSource::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Declarative description of a module and its children.
///
/// Handler maps are optional: a hot update only replaces the maps its
/// description actually declares.
///
/// ```rust
/// use modstore_core::RawModule;
/// use serde_json::json;
///
/// let counter = RawModule::new()
///     .namespaced(true)
///     .state(json!({"count": 0}))
///     .mutation("inc", |state, by| {
///         let next = state["count"].as_i64().unwrap_or(0) + by.as_i64().unwrap_or(1);
///         state["count"] = json!(next);
///     })
///     .getter("double", |ctx| json!(ctx.state()["count"].as_i64().unwrap_or(0) * 2));
///
/// let root = RawModule::new().module("counter", counter);
/// assert!(root.has_module("counter"));
/// ```
#[derive(Clone, Default)]
pub struct RawModule {
    pub(crate) state: Option<StateSource>,
    pub(crate) namespaced: bool,
    pub(crate) mutations: Option<Table<MutationFn>>,
    pub(crate) actions: Option<Table<Arc<dyn Action>>>,
    pub(crate) getters: Option<Table<GetterFn>>,
    pub(crate) modules: Option<Table<RawModule>>,
}

impl RawModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(StateSource::Value(state));
        self
    }

    pub fn state_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(StateSource::Factory(Arc::new(factory)));
        self
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn mutation<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations
            .get_or_insert_with(Table::new)
            .insert(key.into(), Arc::new(handler) as MutationFn);
        self
    }

    /// Declare an async action.
    pub fn action<F, Fut>(self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.action_handler(key, FnAction::new(handler))
    }

    /// Declare a synchronous action; its result is normalized to a ready future.
    pub fn action_sync<F>(self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.action_handler(key, SyncAction::new(handler))
    }

    pub fn action_handler<A>(mut self, key: impl Into<String>, handler: A) -> Self
    where
        A: Action + 'static,
    {
        self.actions
            .get_or_insert_with(Table::new)
            .insert(key.into(), Arc::new(handler) as Arc<dyn Action>);
        self
    }

    pub fn getter<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&GetterContext) -> Value + Send + Sync + 'static,
    {
        self.getters
            .get_or_insert_with(Table::new)
            .insert(key.into(), Arc::new(handler) as GetterFn);
        self
    }

    /// Declare a child module under `key`.
    pub fn module(mut self, key: impl Into<String>, child: RawModule) -> Self {
        self.modules
            .get_or_insert_with(Table::new)
            .insert(key.into(), child);
        self
    }

    pub fn has_module(&self, key: &str) -> bool {
        self.modules
            .as_ref()
            .is_some_and(|modules| modules.contains_key(key))
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = (&str, &RawModule)> {
        self.modules
            .iter()
            .flat_map(|modules| modules.iter())
            .map(|(key, child)| (key.as_str(), child))
    }
}

impl fmt::Debug for RawModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawModule")
            .field("state", &self.state)
            .field("namespaced", &self.namespaced)
            .field("mutations", &self.mutations.as_ref().map(keys))
            .field("actions", &self.actions.as_ref().map(keys))
            .field("getters", &self.getters.as_ref().map(keys))
            .field("modules", &self.modules)
            .finish()
    }
}

/// A live node of the module tree.
pub struct Module {
    raw_state: StateSource,
    namespaced: bool,
    mutations: Table<MutationFn>,
    actions: Table<Arc<dyn Action>>,
    getters: Table<GetterFn>,
    children: Table<Module>,
    runtime: bool,
    pub(crate) context: Option<LocalContext>,
}

impl Module {
    /// Build a node from its description. Children are attached separately.
    pub fn new(raw: &RawModule, runtime: bool) -> Self {
        Self {
            raw_state: raw.state.clone().unwrap_or_default(),
            namespaced: raw.namespaced,
            mutations: raw.mutations.clone().unwrap_or_default(),
            actions: raw.actions.clone().unwrap_or_default(),
            getters: raw.getters.clone().unwrap_or_default(),
            children: Table::new(),
            runtime,
            context: None,
        }
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    /// True when registered after store construction.
    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    /// Produce this module's state. Factories run on every call, so callers
    /// evaluate this once per installation.
    pub fn state(&self) -> Value {
        self.raw_state.produce()
    }

    /// The local context attached by the last installation.
    pub fn context(&self) -> Option<&LocalContext> {
        self.context.as_ref()
    }

    pub fn get_child(&self, key: &str) -> Option<&Module> {
        self.children.get(key)
    }

    pub fn get_child_mut(&mut self, key: &str) -> Option<&mut Module> {
        self.children.get_mut(key)
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn add_child(&mut self, key: impl Into<String>, module: Module) {
        self.children.insert(key.into(), module);
    }

    pub fn remove_child(&mut self, key: &str) -> Option<Module> {
        self.children.shift_remove(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Module)> {
        self.children.iter().map(|(key, child)| (key.as_str(), child))
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = (&str, &mut Module)> {
        self.children
            .iter_mut()
            .map(|(key, child)| (key.as_str(), child))
    }

    pub fn for_each_child(&self, mut visitor: impl FnMut(&str, &Module)) {
        for (key, child) in self.children() {
            visitor(key, child);
        }
    }

    pub fn for_each_mutation(&self, mut visitor: impl FnMut(&str, &MutationFn)) {
        for (key, handler) in &self.mutations {
            visitor(key, handler);
        }
    }

    pub fn for_each_action(&self, mut visitor: impl FnMut(&str, &Arc<dyn Action>)) {
        for (key, handler) in &self.actions {
            visitor(key, handler);
        }
    }

    pub fn for_each_getter(&self, mut visitor: impl FnMut(&str, &GetterFn)) {
        for (key, handler) in &self.getters {
            visitor(key, handler);
        }
    }

    /// Swap in the handlers declared by `raw`.
    ///
    /// `namespaced` is always taken from `raw`; handler maps and the state
    /// source only when `raw` declares them. Children and the runtime flag are
    /// never touched, and neither is live state.
    pub fn update(&mut self, raw: &RawModule) {
        self.namespaced = raw.namespaced;
        if let Some(state) = &raw.state {
            self.raw_state = state.clone();
        }
        if let Some(mutations) = &raw.mutations {
            self.mutations = mutations.clone();
        }
        if let Some(actions) = &raw.actions {
            self.actions = actions.clone();
        }
        if let Some(getters) = &raw.getters {
            self.getters = getters.clone();
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("namespaced", &self.namespaced)
            .field("runtime", &self.runtime)
            .field("mutations", &keys(&self.mutations))
            .field("actions", &keys(&self.actions))
            .field("getters", &keys(&self.getters))
            .field("children", &self.children)
            .finish()
    }
}

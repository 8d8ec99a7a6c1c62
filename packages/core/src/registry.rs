//! Flattened handler registries and the tree walk that fills them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use modstore_state::{Path, Value};

use crate::context::LocalContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::handler::{Action, GetterFn, MutationFn};
use crate::module::Module;
use crate::store::StoreInner;

/// A mutation bound to the state slice of its module.
pub(crate) struct MutationEntry {
    pub path: Path,
    pub handler: MutationFn,
}

/// An action bound to its module's local context.
pub(crate) struct ActionEntry {
    pub context: LocalContext,
    pub handler: Arc<dyn Action>,
}

/// A getter bound to its module's local context.
pub(crate) struct GetterEntry {
    pub context: LocalContext,
    pub handler: GetterFn,
}

/// Handlers by fully namespaced type.
///
/// Registries are never patched while visible: a structural change builds a
/// new one (or a copy of the current one) and swaps it in.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    pub mutations: HashMap<String, Vec<Arc<MutationEntry>>>,
    pub actions: HashMap<String, Vec<Arc<ActionEntry>>>,
    pub getters: BTreeMap<String, Arc<GetterEntry>>,
    pub namespaces: HashMap<String, Path>,
}

impl Registry {
    pub fn mutations(&self, ty: &str) -> Option<&[Arc<MutationEntry>]> {
        self.mutations.get(ty).map(Vec::as_slice)
    }

    pub fn actions(&self, ty: &str) -> Option<&[Arc<ActionEntry>]> {
        self.actions.get(ty).map(Vec::as_slice)
    }
}

/// Walks a module subtree pre-order, binding every handler into a registry.
///
/// State is not written here. Each module that needs its slice spliced into
/// the state tree is queued, parents before children, and the caller applies
/// the queue to whatever holds the state.
pub(crate) struct Installer<'a> {
    registry: &'a mut Registry,
    store: Weak<StoreInner>,
    diagnostics: &'a Diagnostics,
    hot: bool,
    splices: Vec<(Path, Value)>,
}

impl<'a> Installer<'a> {
    /// With `hot` set nothing is queued for splicing: the state tree is
    /// reused as is.
    pub fn new(
        registry: &'a mut Registry,
        store: Weak<StoreInner>,
        diagnostics: &'a Diagnostics,
        hot: bool,
    ) -> Self {
        Self {
            registry,
            store,
            diagnostics,
            hot,
            splices: Vec::new(),
        }
    }

    /// Install `module`, found at `path` with the given namespace, and its
    /// descendants.
    pub fn install(&mut self, path: &Path, namespace: &str, module: &mut Module) {
        if module.is_namespaced() {
            if self.registry.namespaces.contains_key(namespace) {
                self.diagnostics.report(Diagnostic::NamespaceCollision {
                    namespace: namespace.to_string(),
                    path: path.clone(),
                });
            }
            self.registry
                .namespaces
                .insert(namespace.to_string(), path.clone());
        }

        if !path.is_root() && !self.hot {
            self.splices.push((path.clone(), module.state()));
        }

        let context = LocalContext::new(self.store.clone(), namespace.to_string(), path.clone());

        let registry = &mut *self.registry;
        let diagnostics = self.diagnostics;
        module.for_each_mutation(|key, handler| {
            registry
                .mutations
                .entry(format!("{}{}", namespace, key))
                .or_default()
                .push(Arc::new(MutationEntry {
                    path: path.clone(),
                    handler: Arc::clone(handler),
                }));
        });
        module.for_each_action(|key, handler| {
            registry
                .actions
                .entry(format!("{}{}", namespace, key))
                .or_default()
                .push(Arc::new(ActionEntry {
                    context: context.clone(),
                    handler: Arc::clone(handler),
                }));
        });
        module.for_each_getter(|key, handler| {
            let ty = format!("{}{}", namespace, key);
            if registry.getters.contains_key(&ty) {
                diagnostics.report(Diagnostic::DuplicateGetter { ty });
                return;
            }
            registry.getters.insert(
                ty,
                Arc::new(GetterEntry {
                    context: context.clone(),
                    handler: Arc::clone(handler),
                }),
            );
        });

        module.context = Some(context);

        for (key, child) in module.children_mut() {
            let mut child_namespace = namespace.to_string();
            if child.is_namespaced() {
                child_namespace.push_str(key);
                child_namespace.push('/');
            }
            let child_path = path.child(key);
            self.install(&child_path, &child_namespace, child);
        }
    }

    /// The queued `(path, state)` splices, in install order.
    pub fn finish(self) -> Vec<(Path, Value)> {
        self.splices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, RecordingSink};
    use crate::module::RawModule;
    use crate::module_tree::ModuleTree;
    use modstore_state::path;
    use serde_json::json;

    fn install(raw: &RawModule, hot: bool) -> (Registry, Vec<(Path, Value)>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let diagnostics = Diagnostics::new(Some(sink.clone() as Arc<dyn DiagnosticSink>));
        let mut tree = ModuleTree::new(raw);
        let mut registry = Registry::default();
        let mut installer = Installer::new(&mut registry, Weak::new(), &diagnostics, hot);
        installer.install(&Path::root(), "", tree.root_mut());
        let splices = installer.finish();
        (registry, splices, sink)
    }

    #[test]
    fn types_are_prefixed_by_namespace() {
        let raw = RawModule::new()
            .mutation("reset", |_, _| {})
            .module(
                "cart",
                RawModule::new()
                    .namespaced(true)
                    .mutation("add", |_, _| {})
                    .action_sync("checkout", |_, _| Ok(Value::Null))
                    .getter("total", |_| json!(0))
                    .module("inner", RawModule::new().mutation("touch", |_, _| {})),
            );
        let (registry, _, _) = install(&raw, false);

        assert!(registry.mutations("reset").is_some());
        assert!(registry.mutations("cart/add").is_some());
        assert!(registry.mutations("add").is_none());
        assert!(registry.mutations("cart/touch").is_some());
        assert!(registry.actions("cart/checkout").is_some());
        assert!(registry.getters.contains_key("cart/total"));
        assert_eq!(registry.namespaces.get("cart"), None);
        assert_eq!(registry.namespaces.get("cart/"), Some(&path!("cart")));
    }

    #[test]
    fn same_type_accumulates_in_tree_order() {
        let raw = RawModule::new()
            .mutation("inc", |_, _| {})
            .module("a", RawModule::new().mutation("inc", |_, _| {}));
        let (registry, _, _) = install(&raw, false);

        let entries = registry.mutations("inc").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, Path::root());
        assert_eq!(entries[1].path, path!("a"));
    }

    #[test]
    fn duplicate_getter_keeps_first() {
        let raw = RawModule::new()
            .getter("total", |_| json!(1))
            .module("a", RawModule::new().getter("total", |_| json!(2)));
        let (registry, _, sink) = install(&raw, false);

        assert_eq!(registry.getters.len(), 1);
        assert_eq!(registry.getters["total"].context.path(), &Path::root());
        assert!(sink.contains(|d| matches!(
            d,
            Diagnostic::DuplicateGetter { ty } if ty == "total"
        )));
    }

    #[test]
    fn namespace_collision_last_wins() {
        let raw = RawModule::new()
            .module("a", RawModule::new().namespaced(true))
            .module(
                "b",
                RawModule::new().module("a", RawModule::new().namespaced(true)),
            );
        let (registry, _, sink) = install(&raw, false);

        assert_eq!(registry.namespaces.get("a/"), Some(&path!("b/a")));
        assert!(sink.contains(|d| matches!(d, Diagnostic::NamespaceCollision { .. })));
    }

    #[test]
    fn splices_are_queued_parent_first() {
        let raw = RawModule::new()
            .state(json!({"root": true}))
            .module(
                "a",
                RawModule::new()
                    .state(json!({"n": 1}))
                    .module("b", RawModule::new().state(json!({"n": 2}))),
            );
        let (_, splices, _) = install(&raw, false);
        assert_eq!(
            splices,
            vec![
                (path!("a"), json!({"n": 1})),
                (path!("a/b"), json!({"n": 2})),
            ]
        );

        let (_, hot_splices, _) = install(&raw, true);
        assert!(hot_splices.is_empty());
    }

    #[test]
    fn contexts_are_attached() {
        let raw = RawModule::new().module("a", RawModule::new().namespaced(true));
        let sink = Arc::new(RecordingSink::new());
        let diagnostics = Diagnostics::new(Some(sink as Arc<dyn DiagnosticSink>));
        let mut tree = ModuleTree::new(&raw);
        let mut registry = Registry::default();
        Installer::new(&mut registry, Weak::new(), &diagnostics, false)
            .install(&Path::root(), "", tree.root_mut());

        let context = tree.get(&path!("a")).unwrap().context().unwrap();
        assert_eq!(context.namespace(), "a/");
        assert_eq!(context.path(), &path!("a"));
        assert_eq!(context.state(), Value::Null);
    }
}

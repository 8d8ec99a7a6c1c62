use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use modstore_core::{
    Diagnostic, DiagnosticSink, Path, RawModule, RecordingSink, RegisterOptions, Store, StoreError,
    StoreOptions, WatchOptions,
};
use modstore_state::path;

fn add_count(state: &mut Value, payload: &Value) {
    let next = state["count"].as_i64().unwrap_or(0) + payload.as_i64().unwrap_or(1);
    state["count"] = json!(next);
}

fn counter(namespaced: bool) -> RawModule {
    RawModule::new()
        .namespaced(namespaced)
        .state(json!({"count": 0}))
        .mutation("inc", add_count)
        .getter("count", |ctx| ctx.state()["count"].clone())
}

fn store_with(root: RawModule) -> (Store, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let options = StoreOptions::new(root).diagnostics(sink.clone() as Arc<dyn DiagnosticSink>);
    let store = Store::new(options).unwrap();
    (store, sink)
}

#[test]
fn test_register_module_at_runtime() {
    let (store, _) = store_with(RawModule::new().state(json!({})));

    store
        .register_module(&path!("counter"), counter(true), RegisterOptions::default())
        .unwrap();

    assert!(store.has_module(&path!("counter")));
    assert_eq!(store.state(), json!({"counter": {"count": 0}}));
    store.commit("counter/inc", json!(3));
    assert_eq!(store.state()["counter"]["count"], json!(3));
    assert_eq!(store.getters().get("counter/count"), Some(json!(3)));
}

#[test]
fn test_register_nested_requires_parent() {
    let (store, _) = store_with(RawModule::new());

    let err = store
        .register_module(&path!("a/b"), RawModule::new(), RegisterOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::ModuleNotFound { .. }));

    store
        .register_module(&path!("a"), RawModule::new(), RegisterOptions::default())
        .unwrap();
    store
        .register_module(&path!("a/b"), counter(false), RegisterOptions::default())
        .unwrap();
    assert_eq!(store.state(), json!({"a": {"b": {"count": 0}}}));
}

#[test]
fn test_register_root_is_rejected() {
    let (store, _) = store_with(RawModule::new());
    let err = store
        .register_module(&Path::root(), RawModule::new(), RegisterOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::RootRegistration));
}

#[test]
fn test_register_preserving_state() {
    let (store, _) = store_with(RawModule::new().state(json!({"counter": {"count": 7}})));

    store
        .register_module(
            &path!("counter"),
            counter(true),
            RegisterOptions {
                preserve_state: true,
            },
        )
        .unwrap();

    assert_eq!(store.state()["counter"]["count"], json!(7));
    store.commit("counter/inc", json!(1));
    assert_eq!(store.state()["counter"]["count"], json!(8));
}

#[test]
fn test_register_keeps_existing_handlers() {
    let (store, _) = store_with(RawModule::new().module("a", counter(true)));
    store
        .register_module(&path!("b"), counter(true), RegisterOptions::default())
        .unwrap();

    store.commit("a/inc", json!(1));
    store.commit("b/inc", json!(2));
    assert_eq!(store.state()["a"]["count"], json!(1));
    assert_eq!(store.state()["b"]["count"], json!(2));
    assert_eq!(store.getters().get("a/count"), Some(json!(1)));
}

#[test]
fn test_unregister_runtime_module() {
    let (store, sink) = store_with(RawModule::new());
    store
        .register_module(&path!("counter"), counter(true), RegisterOptions::default())
        .unwrap();

    store.unregister_module(&path!("counter")).unwrap();

    assert!(!store.has_module(&path!("counter")));
    assert_eq!(store.state(), json!({}));
    assert_eq!(store.getters().get("counter/count"), None);
    store.commit("counter/inc", json!(1));
    assert!(sink.contains(|d| matches!(d, Diagnostic::UnknownMutation { .. })));
}

#[test]
fn test_unregister_static_module_is_ignored() {
    let (store, sink) = store_with(RawModule::new().module("fixed", counter(true)));

    store.unregister_module(&path!("fixed")).unwrap();

    assert!(store.has_module(&path!("fixed")));
    assert_eq!(store.state()["fixed"], json!({"count": 0}));
    store.commit("fixed/inc", json!(1));
    assert_eq!(store.state()["fixed"]["count"], json!(1));
    assert!(sink.contains(|d| matches!(d, Diagnostic::StaticUnregister { .. })));
}

#[test]
fn test_unregister_unknown_path_is_an_error() {
    let (store, _) = store_with(RawModule::new());
    assert!(matches!(
        store.unregister_module(&path!("ghost")),
        Err(StoreError::ModuleNotFound { .. })
    ));
}

#[test]
fn test_hot_update_swaps_handlers_and_keeps_state() {
    let (store, _) = store_with(RawModule::new().module("a", counter(true)));
    store.commit("a/inc", json!(2));

    store.hot_update(
        RawModule::new().module(
            "a",
            RawModule::new()
                .namespaced(true)
                .mutation("inc", |state, payload| {
                    let step = 10 * payload.as_i64().unwrap_or(1);
                    let next = state["count"].as_i64().unwrap_or(0) + step;
                    state["count"] = json!(next);
                }),
        ),
    );

    assert_eq!(store.state()["a"]["count"], json!(2));
    store.commit("a/inc", json!(1));
    assert_eq!(store.state()["a"]["count"], json!(12));
    assert_eq!(store.getters().get("a/count"), Some(json!(12)));
}

#[test]
fn test_hot_update_with_new_module_leaves_tree_unchanged() {
    let root = RawModule::new()
        .module("a", counter(true))
        .module("b", counter(true));
    let (store, sink) = store_with(root);

    store.hot_update(
        RawModule::new()
            .module("a", counter(true).module("fresh", RawModule::new()))
            .module("b", counter(true)),
    );

    assert!(!store.has_module(&path!("a/fresh")));
    assert!(sink.contains(|d| matches!(
        d,
        Diagnostic::HotReloadNewModule { path, key } if *path == path!("a") && key == "fresh"
    )));
    store.commit("b/inc", json!(1));
    store.commit("a/inc", json!(1));
    assert_eq!(store.state()["a"]["count"], json!(1));
    assert_eq!(store.state()["b"]["count"], json!(1));
}

#[test]
fn test_hot_update_namespace_change_moves_types() {
    let (store, sink) = store_with(RawModule::new().module("a", counter(true)));

    store.hot_update(RawModule::new().module("a", counter(false)));

    assert_eq!(store.module_namespace(&path!("a")).unwrap(), "");
    store.commit("inc", json!(1));
    assert_eq!(store.state()["a"]["count"], json!(1));
    store.commit("a/inc", json!(1));
    assert!(sink.contains(|d| matches!(d, Diagnostic::UnknownMutation { ty } if ty == "a/inc")));
}

#[test]
fn test_watchers_survive_rebuilds() {
    let (store, _) = store_with(RawModule::new().module("a", counter(true)));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _handle = store.watch(
        |state, _| state["a"]["count"].clone(),
        move |new, _| sink.lock().unwrap().push(new.clone()),
        WatchOptions::default(),
    );

    store
        .register_module(&path!("b"), counter(true), RegisterOptions::default())
        .unwrap();
    store.hot_update(RawModule::new().module("a", counter(true)));
    store.flush_teardown();
    store.commit("a/inc", json!(5));

    assert_eq!(*seen.lock().unwrap(), vec![json!(5)]);
}

#[test]
fn test_retired_containers_are_destroyed_on_flush() {
    let (store, _) = store_with(RawModule::new().module("a", counter(true)));
    let before = store.container();

    store.hot_update(RawModule::new().module("a", counter(true)));
    assert!(!before.is_destroyed());
    assert_eq!(before.snapshot(), Value::Null);

    store.flush_teardown();
    assert!(before.is_destroyed());
    assert!(!store.container().is_destroyed());
    assert_eq!(store.state()["a"]["count"], json!(0));
}

#[test]
fn test_hot_update_does_not_trip_strict_mode() {
    let sink = Arc::new(RecordingSink::new());
    let store = Store::new(
        StoreOptions::new(RawModule::new().module("a", counter(true)))
            .strict(true)
            .diagnostics(sink.clone() as Arc<dyn DiagnosticSink>),
    )
    .unwrap();

    store
        .register_module(&path!("b"), counter(true), RegisterOptions::default())
        .unwrap();
    store.hot_update(RawModule::new().module("a", counter(true)));
    store.unregister_module(&path!("b")).unwrap();

    assert!(!sink.contains(|d| matches!(d, Diagnostic::StrictViolation { .. })));
}

//! In-process reactive container.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::container::{
    Change, ChangeKind, Computed, Container, ContainerFactory, Listener, ListenerId,
};
use crate::error::{Error, Result};
use crate::path::Path;
use crate::sync::{lock, read, write};
use crate::value;

/// Default [`Container`] implementation.
///
/// Computed values are cached per key and tagged with the state version they
/// were evaluated against; any write bumps the version, so a stale entry is
/// recomputed on next access. Listeners run after the state lock is released,
/// which lets them read the state (or write it again) without deadlocking.
pub struct ReactiveState {
    state: RwLock<Value>,
    version: AtomicU64,
    computed: RwLock<BTreeMap<String, Computed>>,
    cache: Mutex<HashMap<String, (u64, Value)>>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    destroyed: AtomicBool,
}

impl ReactiveState {
    pub fn new(state: Value, computed: BTreeMap<String, Computed>) -> Self {
        Self {
            state: RwLock::new(state),
            version: AtomicU64::new(0),
            computed: RwLock::new(computed),
            cache: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Current state version; bumped on every write.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }
        Ok(())
    }

    fn notify(&self, change: Change) {
        self.version.fetch_add(1, Ordering::AcqRel);
        let listeners: Vec<Listener> = read(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

impl Container for ReactiveState {
    fn read(&self, f: &mut dyn FnMut(&Value)) {
        f(&read(&self.state));
    }

    fn update(&self, path: &Path, f: &mut dyn FnMut(&mut Value)) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = write(&self.state);
            let target = value::get_path_mut(&mut state, path)?.ok_or_else(|| Error::NotFound {
                path: path.clone(),
            })?;
            f(target);
        }
        self.notify(Change {
            path: path.clone(),
            kind: ChangeKind::Update,
        });
        Ok(())
    }

    fn set(&self, parent: &Path, key: &str, value: Value) -> Result<()> {
        self.ensure_live()?;
        value::set_child(&mut write(&self.state), parent, key, value)?;
        self.notify(Change {
            path: parent.child(key),
            kind: ChangeKind::Set,
        });
        Ok(())
    }

    fn delete(&self, parent: &Path, key: &str) -> Result<Option<Value>> {
        self.ensure_live()?;
        let removed = value::remove_child(&mut write(&self.state), parent, key)?;
        if removed.is_some() {
            self.notify(Change {
                path: parent.child(key),
                kind: ChangeKind::Delete,
            });
        }
        Ok(removed)
    }

    fn replace(&self, state: Value) -> Result<()> {
        self.ensure_live()?;
        *write(&self.state) = state;
        self.notify(Change {
            path: Path::root(),
            kind: ChangeKind::Replace,
        });
        Ok(())
    }

    fn computed(&self, key: &str) -> Option<Value> {
        if self.is_destroyed() {
            return None;
        }
        let version = self.version();
        if let Some((cached_at, value)) = lock(&self.cache).get(key) {
            if *cached_at == version {
                return Some(value.clone());
            }
        }
        // Evaluate without holding any lock: getters read state and other getters.
        let getter = read(&self.computed).get(key).cloned()?;
        let value = getter();
        lock(&self.cache).insert(key.to_string(), (version, value.clone()));
        Some(value)
    }

    fn computed_keys(&self) -> Vec<String> {
        read(&self.computed).keys().cloned().collect()
    }

    fn listen(&self, listener: Listener) -> ListenerId {
        let id = ListenerId::new();
        write(&self.listeners).push((id, listener));
        id
    }

    fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = write(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        write(&self.listeners).clear();
        write(&self.computed).clear();
        lock(&self.cache).clear();
        tracing::trace!("reactive container destroyed");
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// Factory producing [`ReactiveState`] containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReactiveFactory;

impl ContainerFactory for ReactiveFactory {
    fn construct(&self, state: Value, computed: BTreeMap<String, Computed>) -> Arc<dyn Container> {
        Arc::new(ReactiveState::new(state, computed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use collection_literals::btree;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_computed(calls: Arc<AtomicUsize>) -> Computed {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            json!("computed")
        })
    }

    #[test]
    fn update_edits_in_place_and_notifies() {
        let container = ReactiveState::new(json!({"a": {"count": 1}}), BTreeMap::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        container.listen(Arc::new(move |change: &Change| {
            lock(&sink).push(change.clone());
        }));

        container
            .update(&path!("a"), &mut |state| state["count"] = json!(2))
            .unwrap();

        assert_eq!(container.get(&path!("a/count")), Some(json!(2)));
        assert_eq!(
            *lock(&seen),
            vec![Change {
                path: path!("a"),
                kind: ChangeKind::Update
            }]
        );
    }

    #[test]
    fn update_missing_path_fails() {
        let container = ReactiveState::new(json!({}), BTreeMap::new());
        let err = container.update(&path!("nope"), &mut |_| {}).unwrap_err();
        assert_eq!(err, Error::NotFound { path: path!("nope") });
    }

    #[test]
    fn computed_is_cached_until_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = ReactiveState::new(
            json!({"n": 1}),
            btree! { "label".to_string() => counting_computed(Arc::clone(&calls)) },
        );

        assert_eq!(container.computed("label"), Some(json!("computed")));
        assert_eq!(container.computed("label"), Some(json!("computed")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        container.set(&Path::root(), "n", json!(2)).unwrap();
        container.computed("label");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(container.computed("missing"), None);
    }

    #[test]
    fn listener_may_read_state() {
        let container = Arc::new(ReactiveState::new(json!({"n": 0}), BTreeMap::new()));
        let observed = Arc::new(Mutex::new(Value::Null));
        let weak = Arc::downgrade(&container);
        let out = Arc::clone(&observed);
        container.listen(Arc::new(move |_: &Change| {
            if let Some(container) = weak.upgrade() {
                *lock(&out) = container.snapshot();
            }
        }));

        container.set(&Path::root(), "n", json!(7)).unwrap();
        assert_eq!(*lock(&observed), json!({"n": 7}));
    }

    #[test]
    fn unlisten_removes_listener() {
        let container = ReactiveState::new(json!({}), BTreeMap::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = container.listen(Arc::new(move |_: &Change| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        container.set(&Path::root(), "x", json!(1)).unwrap();
        assert!(container.unlisten(id));
        assert!(!container.unlisten(id));
        container.set(&Path::root(), "x", json!(2)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_of_missing_key_is_silent() {
        let container = ReactiveState::new(json!({"a": 1}), BTreeMap::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        container.listen(Arc::new(move |_: &Change| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(container.delete(&Path::root(), "a").unwrap(), Some(json!(1)));
        assert_eq!(container.delete(&Path::root(), "a").unwrap(), None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroyed_container_rejects_writes() {
        let container = ReactiveFactory.construct(
            json!({}),
            btree! { "k".to_string() => counting_computed(Arc::new(AtomicUsize::new(0))) },
        );
        container.destroy();
        assert!(container.is_destroyed());
        assert_eq!(container.replace(json!(1)), Err(Error::Destroyed));
        assert_eq!(container.computed("k"), None);
        assert!(container.computed_keys().is_empty());
    }
}

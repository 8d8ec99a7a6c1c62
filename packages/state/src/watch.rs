//! Value watchers driven by container change notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::sync::lock;

pub type WatchGetter = Arc<dyn Fn() -> Value + Send + Sync>;
pub type WatchCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Options for [`Watcher::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback once right away with `(current, null)`.
    pub immediate: bool,
}

/// Re-evaluates a getter whenever it is poked and reports value changes.
///
/// Comparison is by deep equality of the produced JSON value, so mutating a
/// nested field of the watched sub-tree counts as a change.
pub struct Watcher {
    getter: WatchGetter,
    callback: WatchCallback,
    last: Mutex<Value>,
    active: AtomicBool,
}

impl Watcher {
    pub fn new(getter: WatchGetter, callback: WatchCallback, options: WatchOptions) -> Arc<Self> {
        let initial = getter();
        let watcher = Arc::new(Self {
            getter,
            callback,
            last: Mutex::new(initial.clone()),
            active: AtomicBool::new(true),
        });
        if options.immediate {
            (watcher.callback)(&initial, &Value::Null);
        }
        watcher
    }

    /// Re-evaluate the getter; invoke the callback if the value changed.
    ///
    /// Returns whether the callback ran.
    pub fn check(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        let current = (self.getter)();
        let previous = {
            let mut last = lock(&self.last);
            if *last == current {
                return false;
            }
            std::mem::replace(&mut *last, current.clone())
        };
        (self.callback)(&current, &previous);
        true
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

//! Serde conversions between typed Rust values and store state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::{ActionContext, GetterContext, LocalContext};
use crate::error::Result;
use crate::store::Store;

/// Typed reads of a state slice.
///
/// ```rust
/// use modstore_core::{RawModule, Store, StoreOptions, TypedState};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct Counter {
///     count: i64,
/// }
///
/// let store = Store::new(StoreOptions::new(RawModule::new().state(json!({"count": 3})))).unwrap();
/// let counter: Counter = store.state_as().unwrap();
/// assert_eq!(counter.count, 3);
/// ```
pub trait TypedState {
    /// The untyped slice this view reads.
    fn state_value(&self) -> Value;

    fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.state_value())?)
    }
}

impl TypedState for Store {
    fn state_value(&self) -> Value {
        self.state()
    }
}

impl TypedState for LocalContext {
    fn state_value(&self) -> Value {
        self.state()
    }
}

impl TypedState for ActionContext {
    fn state_value(&self) -> Value {
        self.state()
    }
}

impl TypedState for GetterContext {
    fn state_value(&self) -> Value {
        self.state()
    }
}

/// Serialize a typed payload for `commit`/`dispatch`.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

//! Handler shapes for mutations, actions and getters.

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::context::{ActionContext, GetterContext};
use crate::error::ActionError;

/// Synchronous state change: `(local_state, payload)`.
pub type MutationFn = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Pure derivation over local/root state and getters.
pub type GetterFn = Arc<dyn Fn(&GetterContext) -> Value + Send + Sync>;

/// The normalized result of an action handler.
pub type ActionFuture = BoxFuture<'static, Result<Value, ActionError>>;

/// An action handler.
///
/// `call` runs when the action is dispatched; only the returned future is
/// left for the caller to drive. Closures are adapted through [`FnAction`]
/// and [`SyncAction`]; implement this directly for handlers that carry their
/// own state (clients, caches, ...).
pub trait Action: Send + Sync {
    fn call(&self, ctx: ActionContext, payload: Value) -> ActionFuture;
}

/// Adapts a closure returning a future into an [`Action`].
///
/// The closure itself runs at dispatch time; work inside the future it
/// returns runs when that future is polled.
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(ActionContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    fn call(&self, ctx: ActionContext, payload: Value) -> ActionFuture {
        (self.f)(ctx, payload).boxed()
    }
}

/// Adapts a synchronous closure into an [`Action`]. The closure runs at
/// dispatch time and its result is wrapped in a ready future.
pub struct SyncAction<F> {
    f: F,
}

impl<F> SyncAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Action for SyncAction<F>
where
    F: Fn(ActionContext, Value) -> Result<Value, ActionError> + Send + Sync,
{
    fn call(&self, ctx: ActionContext, payload: Value) -> ActionFuture {
        future::ready((self.f)(ctx, payload)).boxed()
    }
}

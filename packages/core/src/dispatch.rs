//! The value returned by `dispatch` and the scatter/gather over handlers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::join_all;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ActionError;
use crate::handler::ActionFuture;

/// Pending result of a dispatch.
///
/// Resolves to the handler's value when one handler matched, to an array of
/// values in registration order when several did, and to `Null` when the
/// type was unknown. Handlers have already been called by the time this is
/// returned; dropping it only discards their pending futures and results.
#[must_use = "the action result is lost unless the dispatch is awaited"]
pub struct Dispatch {
    inner: Option<ActionFuture>,
}

impl Dispatch {
    pub(crate) fn new(inner: ActionFuture) -> Self {
        Self { inner: Some(inner) }
    }

    /// A dispatch that matched nothing.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// True when no handler matched.
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }
}

impl Future for Dispatch {
    type Output = Result<Value, ActionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll(cx),
            None => Poll::Ready(Ok(Value::Null)),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// Combine handler futures into one.
///
/// All handlers are driven to completion. Failures are reported; the first
/// one in registration order is the combined result.
pub(crate) fn gather(
    ty: String,
    mut handlers: Vec<ActionFuture>,
    diagnostics: Diagnostics,
) -> ActionFuture {
    if handlers.len() == 1 {
        let single = handlers.remove(0);
        return Box::pin(async move {
            let result = single.await;
            if let Err(e) = &result {
                diagnostics.report(Diagnostic::ActionFailed {
                    ty,
                    message: e.to_string(),
                });
            }
            result
        });
    }

    Box::pin(async move {
        let mut values = Vec::with_capacity(handlers.len());
        let mut first_error = None;
        for result in join_all(handlers).await {
            match result {
                Ok(value) => values.push(value),
                Err(e) => {
                    diagnostics.report(Diagnostic::ActionFailed {
                        ty: ty.clone(),
                        message: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::Array(values)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, RecordingSink};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn ready(value: Result<Value, ActionError>) -> ActionFuture {
        Box::pin(async move { value })
    }

    fn delayed(ms: u64, value: Value) -> ActionFuture {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
    }

    #[tokio::test]
    async fn noop_resolves_to_null() {
        let dispatch = Dispatch::noop();
        assert!(dispatch.is_noop());
        assert_eq!(dispatch.await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn single_handler_is_unwrapped() {
        let future = gather("a".into(), vec![ready(Ok(json!(7)))], Diagnostics::default());
        assert_eq!(Dispatch::new(future).await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn results_follow_registration_order() {
        let future = gather(
            "a".into(),
            vec![delayed(10, json!(1)), delayed(1, json!(2))],
            Diagnostics::default(),
        );
        assert_eq!(future.await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn first_error_wins_after_all_settle() {
        let sink = Arc::new(RecordingSink::new());
        let diagnostics = Diagnostics::new(Some(sink.clone() as Arc<dyn DiagnosticSink>));
        let future = gather(
            "load".into(),
            vec![
                delayed(5, json!(1)),
                ready(Err("first".into())),
                ready(Err("second".into())),
            ],
            diagnostics,
        );

        let err = future.await.unwrap_err();
        assert_eq!(err.to_string(), "first");
        assert_eq!(sink.entries().len(), 2);
    }

    #[tokio::test]
    async fn single_failure_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        let diagnostics = Diagnostics::new(Some(sink.clone() as Arc<dyn DiagnosticSink>));
        let future = gather("load".into(), vec![ready(Err("boom".into()))], diagnostics);

        assert!(future.await.is_err());
        assert!(sink.contains(|d| matches!(
            d,
            Diagnostic::ActionFailed { ty, message } if ty == "load" && message == "boom"
        )));
    }
}

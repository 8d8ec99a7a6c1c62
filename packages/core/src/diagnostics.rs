//! Side-channel reporting for recoverable conditions.
//!
//! Nothing in here changes control flow. Every diagnostic becomes a `tracing`
//! event and is then handed to the configured sink, if any.

use std::fmt;
use std::sync::{Arc, Mutex};

use modstore_state::sync::lock;
use modstore_state::Path;

/// A recoverable condition observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// `commit` named a type with no registered mutation.
    UnknownMutation { ty: String },
    /// `dispatch` named a type with no registered action.
    UnknownAction { ty: String },
    /// A namespaced local commit resolved to nothing.
    UnknownLocalMutation { local: String, global: String },
    /// A namespaced local dispatch resolved to nothing.
    UnknownLocalAction { local: String, global: String },
    /// A second getter was declared under an existing type; it was dropped.
    DuplicateGetter { ty: String },
    /// Two modules computed the same namespace; the later one now owns it.
    NamespaceCollision { namespace: String, path: Path },
    /// A hot update introduced a child module that does not exist yet.
    HotReloadNewModule { path: Path, key: String },
    /// `unregister_module` targeted a statically declared module.
    StaticUnregister { path: Path },
    /// State changed outside of a commit while strict mode was on.
    StrictViolation { path: Path },
    /// A mutation handler's module has no state slice anymore.
    MissingState { path: Path },
    /// An action handler failed. The error is still returned to the caller.
    ActionFailed { ty: String, message: String },
}

impl Diagnostic {
    /// True for conditions logged at warn level, false for error level.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::HotReloadNewModule { .. } | Diagnostic::StaticUnregister { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownMutation { ty } => write!(f, "unknown mutation type: {}", ty),
            Diagnostic::UnknownAction { ty } => write!(f, "unknown action type: {}", ty),
            Diagnostic::UnknownLocalMutation { local, global } => write!(
                f,
                "unknown local mutation type: {}, global type: {}",
                local, global
            ),
            Diagnostic::UnknownLocalAction { local, global } => write!(
                f,
                "unknown local action type: {}, global type: {}",
                local, global
            ),
            Diagnostic::DuplicateGetter { ty } => write!(f, "duplicate getter key: {}", ty),
            Diagnostic::NamespaceCollision { namespace, path } => write!(
                f,
                "duplicate namespace {} for the namespaced module {}",
                namespace, path
            ),
            Diagnostic::HotReloadNewModule { path, key } => write!(
                f,
                "cannot add new module '{}' under '{}' on hot reload, manual reload is needed",
                key, path
            ),
            Diagnostic::StaticUnregister { path } => write!(
                f,
                "cannot unregister the statically declared module '{}'",
                path
            ),
            Diagnostic::StrictViolation { path } => write!(
                f,
                "do not mutate store state outside mutation handlers (changed '{}')",
                path
            ),
            Diagnostic::MissingState { path } => {
                write!(f, "no state slice for module '{}'", path)
            }
            Diagnostic::ActionFailed { ty, message } => {
                write!(f, "action {} failed: {}", ty, message)
            }
        }
    }
}

/// Receives diagnostics from a store.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Sink that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        lock(&self.entries).clone()
    }

    pub fn contains(&self, predicate: impl Fn(&Diagnostic) -> bool) -> bool {
        lock(&self.entries).iter().any(predicate)
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        lock(&self.entries).push(diagnostic.clone());
    }
}

/// Logs diagnostics and forwards them to an optional sink.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub fn new(sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        Self { sink }
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            tracing::warn!(target: "modstore", diagnostic = ?diagnostic, "{}", diagnostic);
        } else {
            tracing::error!(target: "modstore", diagnostic = ?diagnostic, "{}", diagnostic);
        }
        if let Some(sink) = &self.sink {
            sink.report(&diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modstore_state::path;

    #[test]
    fn display_matches_log_wording() {
        let d = Diagnostic::UnknownMutation {
            ty: "a/inc".to_string(),
        };
        assert_eq!(d.to_string(), "unknown mutation type: a/inc");

        let d = Diagnostic::UnknownLocalAction {
            local: "load".to_string(),
            global: "a/load".to_string(),
        };
        assert_eq!(
            d.to_string(),
            "unknown local action type: load, global type: a/load"
        );
    }

    #[test]
    fn warnings_are_classified() {
        assert!(Diagnostic::StaticUnregister { path: path!("a") }.is_warning());
        assert!(!Diagnostic::StrictViolation { path: path!("a") }.is_warning());
    }

    #[test]
    fn recording_sink_collects() {
        let sink = Arc::new(RecordingSink::new());
        let diagnostics = Diagnostics::new(Some(sink.clone() as Arc<dyn DiagnosticSink>));
        diagnostics.report(Diagnostic::DuplicateGetter {
            ty: "total".to_string(),
        });
        assert_eq!(sink.entries().len(), 1);
        assert!(sink.contains(|d| matches!(d, Diagnostic::DuplicateGetter { .. })));
        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn report_without_sink_only_logs() {
        Diagnostics::default().report(Diagnostic::UnknownAction {
            ty: "nope".to_string(),
        });
    }
}

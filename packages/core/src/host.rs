//! Explicit one-time initialization for the environment stores run in.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use modstore_state::{ContainerFactory, ReactiveFactory};

use crate::error::{Result, StoreError};

/// Supplies the container factory and gates store creation behind `init`.
pub struct Host {
    factory: Arc<dyn ContainerFactory>,
    initialized: AtomicBool,
}

impl Host {
    /// A host backed by the in-process reactive container.
    pub fn new() -> Self {
        Self::with_factory(ReactiveFactory)
    }

    pub fn with_factory<F: ContainerFactory + 'static>(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            initialized: AtomicBool::new(false),
        }
    }

    /// Mark the host ready. Only the first call succeeds.
    pub fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            tracing::error!(target: "modstore", "host already initialized");
            return Err(StoreError::AlreadyInitialized);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn factory(&self) -> Arc<dyn ContainerFactory> {
        Arc::clone(&self.factory)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

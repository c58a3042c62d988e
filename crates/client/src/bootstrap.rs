//! Context bootstrap
//!
//! A [`ContextDescriptor`] carries what a new execution context needs to
//! join an existing store: the shared region, the compiled module and a
//! fresh context id. Handing it to [`Store::attach`](crate::Store::attach)
//! instantiates the module again over the same region, so every table is
//! visible at once and nothing is copied.

use crate::options::StoreOptions;
use anystore_core::ContextId;
use anystore_engine::{Imports, Module, SharedMemory};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Imports supplied to every engine instance the client creates
pub struct HostImports {
    context: ContextId,
    epoch: Instant,
}

impl HostImports {
    /// Imports for the context `context`
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            epoch: Instant::now(),
        }
    }
}

impl Imports for HostImports {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn log(&self, message: &str) {
        tracing::debug!(target: "anystore::engine", context = %self.context, "{}", message);
    }
}

/// Everything a new context needs to attach to a store
///
/// Consumed by [`Store::attach`](crate::Store::attach). The id it carries is
/// unique among the contexts of its region.
pub struct ContextDescriptor {
    pub(crate) memory: SharedMemory,
    pub(crate) module: Arc<dyn Module>,
    pub(crate) context: ContextId,
    pub(crate) options: StoreOptions,
}

impl ContextDescriptor {
    /// Id the attaching context will use
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// The shared region
    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }
}

impl fmt::Debug for ContextDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDescriptor")
            .field("context", &self.context)
            .field("memory", &self.memory)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_clock_is_monotonic() {
        let imports = HostImports::new(ContextId::new(2));
        let a = imports.now();
        let b = imports.now();
        assert!(b >= a);
        assert_eq!(imports.context_id(), ContextId::new(2));
    }

    #[test]
    fn test_descriptor_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ContextDescriptor>();
    }
}

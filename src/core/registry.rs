//! Named task processor registry for serialq.
//!
//! The registry maps unique names to live task processors and enforces
//! singleton semantics: concurrent lookups for one name always converge on a
//! single processor instance. Lookup, insertion, and teardown all serialize
//! on the registry's own lock, so two concurrent creators for the same name
//! cannot both insert, and a release racing a lookup either hands out a
//! fresh handle or completes the teardown, never both.
//!
//! Most callers use the process-wide instance returned by [`global`];
//! separate [`Registry`] instances exist mainly for tests and embedders that
//! want isolated namespaces.

use crate::config::SerialqConfig;
use crate::core::processor::{Processor, ProcessorCore, ProcessorRef, ProcessorSnapshot};
use crate::error::{SerialqError, SerialqResult};
use crate::listener::{DefaultListener, Listener};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

/// How a lookup behaves when no processor with the requested name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Create a processor with a default listener if the name is unseen
    CreateIfAbsent,
    /// Only return a handle if the processor already exists
    ExistingOnly,
}

pub(crate) struct RegistryInner {
    processors: RwLock<HashMap<String, Arc<ProcessorCore>>>,
    config: SerialqConfig,
}

impl RegistryInner {
    /// Remove the processor's entry if no external handles remain.
    ///
    /// Returns false when a concurrent `get_or_create` resurrected the
    /// processor (or another teardown already unlinked it); the caller must
    /// then abandon its teardown.
    pub(crate) async fn unlink_if_unreferenced(&self, core: &Arc<ProcessorCore>) -> bool {
        let mut processors = self.processors.write().await;
        if core.has_external_handles() {
            return false;
        }
        match processors.get(core.name()) {
            Some(current) if Arc::ptr_eq(current, core) => {
                processors.remove(core.name());
                true
            }
            _ => false,
        }
    }
}

/// A concurrency-safe collection of uniquely-named task processors.
///
/// Cheap to clone; clones share the same underlying collection.
///
/// # Examples
///
/// ```rust,no_run
/// use serialq::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> SerialqResult<()> {
///     let registry = Registry::new();
///
///     let processor = registry
///         .get_or_create("outbound-email", CreatePolicy::CreateIfAbsent)
///         .await?
///         .expect("created on first use");
///
///     processor.push(async {
///         // runs on the processor's dedicated worker, in push order
///         Ok(())
///     })?;
///
///     processor.release().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create a new empty registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(SerialqConfig::default())
    }

    /// Create a new empty registry with the given configuration.
    pub fn with_config(config: SerialqConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                processors: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Get the configuration used by this registry.
    pub fn config(&self) -> &SerialqConfig {
        &self.inner.config
    }

    /// Look up a task processor by name, creating it on first use.
    ///
    /// With [`CreatePolicy::CreateIfAbsent`] an unseen name gets a new
    /// processor backed by a [`DefaultListener`], and the call returns
    /// `Ok(Some(handle))`. With [`CreatePolicy::ExistingOnly`] an unseen name
    /// is a legitimate absence, reported as `Ok(None)`.
    ///
    /// An empty name is refused with [`SerialqError::EmptyName`].
    pub async fn get_or_create(
        &self,
        name: &str,
        policy: CreatePolicy,
    ) -> SerialqResult<Option<Processor>> {
        if name.is_empty() {
            return Err(SerialqError::EmptyName);
        }

        {
            let processors = self.inner.processors.read().await;
            if let Some(core) = processors.get(name) {
                // Handle creation under the read lock, so a racing teardown
                // sees the new external handle before it can unlink
                return Ok(Some(Processor::from_core(Arc::clone(core))));
            }
        }

        if policy == CreatePolicy::ExistingOnly {
            return Ok(None);
        }

        let listener: Arc<dyn Listener> = Arc::new(DefaultListener::new());
        self.link_and_start(name, listener, true).await.map(Some)
    }

    /// Create a task processor backed by a caller-supplied listener.
    ///
    /// Unlike [`get_or_create`](Registry::get_or_create) this never reuses an
    /// existing entry: a taken name is refused with
    /// [`SerialqError::NameTaken`]. A listener that fails to start leaves no
    /// partial processor behind.
    pub async fn create_with_listener(
        &self,
        name: &str,
        listener: Arc<dyn Listener>,
    ) -> SerialqResult<Processor> {
        if name.is_empty() {
            return Err(SerialqError::EmptyName);
        }
        self.link_and_start(name, listener, false).await
    }

    /// Link a new processor under `name` and start its listener.
    ///
    /// The write lock is held across the listener start, which serializes
    /// concurrent creators for one name and keeps half-started processors
    /// invisible to lookups.
    async fn link_and_start(
        &self,
        name: &str,
        listener: Arc<dyn Listener>,
        reuse_existing: bool,
    ) -> SerialqResult<Processor> {
        let mut processors = self.inner.processors.write().await;

        if let Some(core) = processors.get(name) {
            if reuse_existing {
                return Ok(Processor::from_core(Arc::clone(core)));
            }
            return Err(SerialqError::name_taken(name));
        }

        let core = ProcessorCore::new(name, Arc::downgrade(&self.inner), self.inner.config.depth_warn);
        core.attach_listener(Arc::clone(&listener));
        processors.insert(name.to_string(), Arc::clone(&core));

        if let Err(error) = listener.start(ProcessorRef::new(Arc::clone(&core))).await {
            processors.remove(name);
            core.detach_listener();
            tracing::error!("unable to start listener for task processor '{}': {}", name, error);
            return Err(error);
        }

        tracing::debug!("created task processor '{}'", name);
        Ok(Processor::from_core(core))
    }

    /// Get the number of live task processors.
    pub async fn count(&self) -> usize {
        self.inner.processors.read().await.len()
    }

    /// Take a point-in-time view of every live processor, sorted by name.
    ///
    /// Processors may legally appear or disappear between the snapshot and
    /// its use; the rows are a consistent view of whatever was registered at
    /// the instant of the call.
    pub async fn snapshot(&self) -> Vec<ProcessorSnapshot> {
        let processors = self.inner.processors.read().await;
        let mut rows: Vec<ProcessorSnapshot> =
            processors.values().map(|core| core.snapshot()).collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry instance.
static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the process-wide registry.
///
/// The registry is initialized with default configuration on first access.
pub fn global() -> &'static Registry {
    GLOBAL_REGISTRY.get_or_init(|| {
        tracing::debug!("initializing global task processor registry");
        Registry::new()
    })
}

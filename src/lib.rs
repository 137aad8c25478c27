//! # serialq - Named Serial Task Queues
//!
//! serialq maintains a process-wide registry of uniquely-named task
//! processors. Any component can obtain a handle to a named queue (creating
//! it on first use), push opaque units of work at it, and rely on strict
//! in-order, single-consumer execution without building its own worker and
//! synchronization plumbing.
//!
//! ## Key Features
//!
//! - **Named singletons**: one processor per name, shared across the process
//! - **Strict FIFO**: tasks on one processor run in push order, one at a time
//! - **Reference-counted lifecycle**: the last released handle tears the
//!   processor down and quiesces its worker
//! - **Pluggable execution**: the [`Listener`] trait swaps the scheduling
//!   strategy without touching queue semantics
//! - **Introspection**: ping a queue's latency, report statistics across
//!   every live processor
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serialq::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> SerialqResult<()> {
//!     let processor = serialq::get_or_create("audit-log", CreatePolicy::CreateIfAbsent)
//!         .await?
//!         .expect("created on first use");
//!
//!     processor.push(async {
//!         println!("runs first, on the queue's dedicated worker");
//!         Ok(())
//!     })?;
//!     processor.push(async {
//!         println!("runs strictly second");
//!         Ok(())
//!     })?;
//!
//!     // Tearing down: unlinks the name and joins the worker
//!     processor.release().await;
//!     Ok(())
//! }
//! ```
//!
//! Tasks submitted to *different* processors have no ordering relationship;
//! the FIFO guarantee is per name. Individual queued tasks cannot be
//! cancelled - the only cancellation-like operation is teardown, which stops
//! execution after the in-flight task completes.

pub mod config;
pub mod core;
pub mod error;
pub mod introspect;
pub mod listener;
pub mod task;

pub mod prelude {
    pub use crate::config::SerialqConfig;
    pub use crate::core::processor::{
        Execution, Processor, ProcessorRef, ProcessorSnapshot, ProcessorStats,
    };
    pub use crate::core::registry::{CreatePolicy, Registry, global};
    pub use crate::error::{SerialqError, SerialqResult};
    pub use crate::listener::{DefaultListener, Listener};
    pub use crate::task::{Task, TaskStatus};
    pub use async_trait::async_trait;
}

pub use crate::config::SerialqConfig;
pub use crate::core::processor::{
    Execution, Processor, ProcessorRef, ProcessorSnapshot, ProcessorStats,
};
pub use crate::core::registry::{CreatePolicy, Registry, global};
pub use crate::error::{SerialqError, SerialqResult};
pub use crate::introspect::{RegistryReport, ping, ping_with_timeout, report};
pub use crate::listener::{DefaultListener, Listener};
pub use crate::task::{Task, TaskStatus};

use std::sync::Arc;

/// Look up a processor in the process-wide registry, creating it on first
/// use. See [`Registry::get_or_create`].
pub async fn get_or_create(
    name: &str,
    policy: CreatePolicy,
) -> SerialqResult<Option<Processor>> {
    core::registry::global().get_or_create(name, policy).await
}

/// Create a processor in the process-wide registry with a caller-supplied
/// listener. See [`Registry::create_with_listener`].
pub async fn create_with_listener(
    name: &str,
    listener: Arc<dyn Listener>,
) -> SerialqResult<Processor> {
    core::registry::global()
        .create_with_listener(name, listener)
        .await
}

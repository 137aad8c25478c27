//! Listener strategies for serialq task processors.
//!
//! A listener decouples *when and how* a processor's execute operation runs
//! from the FIFO queue itself. The processor owns exactly one listener for
//! its whole lifetime and tells it about two things only: a push that made
//! the queue non-empty, and a drain that emptied it. Everything else - which
//! execution context to use, when to call execute, how to quiesce - belongs
//! to the strategy.
//!
//! [`DefaultListener`] drains the queue on one dedicated worker task. Other
//! strategies (pool-backed, inline, polling) implement [`Listener`] without
//! touching the processor.

use crate::core::processor::ProcessorRef;
use crate::error::SerialqResult;
use async_trait::async_trait;

pub mod default;
pub use default::DefaultListener;

/// A pluggable execution strategy for one task processor.
///
/// Construction and destruction of a strategy's private state are the
/// implementing type's constructor and `Drop`; the trait covers the four
/// operations the processor drives.
///
/// Implementations must not call back into the processor while holding a
/// lock that a processor callback can also take, and the processor in turn
/// never holds its own lock across these methods.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Begin the execution mechanism.
    ///
    /// Called exactly once, after the listener has been attached to its
    /// processor. `processor` is the back-reference the strategy drives
    /// [`execute`](ProcessorRef::execute) through; it keeps the processor's
    /// storage alive without blocking teardown. A returned error makes the
    /// enclosing create operation fail and unlinks the partial processor.
    async fn start(&self, processor: ProcessorRef) -> SerialqResult<()>;

    /// A task was appended to the queue.
    ///
    /// `was_empty` is true iff the queue held nothing before this push; it is
    /// the only signal that new work exists. Runs on the pushing caller's
    /// context, outside the processor's lock - keep it fast and non-blocking.
    /// Polling strategies may ignore it.
    fn task_pushed(&self, was_empty: bool);

    /// The execute operation just emptied the queue.
    ///
    /// Runs outside the processor's lock. Strategies that learn of the drain
    /// from execute's own return value can leave this as the default no-op.
    fn emptied(&self) {}

    /// Stop the execution mechanism.
    ///
    /// Called at most once, during processor teardown, and only after a
    /// successful [`start`](Listener::start). Must not return until the
    /// strategy has fully quiesced: once this resolves, no execute call is in
    /// flight and none will follow.
    async fn shutdown(&self);
}

//! Task processor implementation for serialq.
//!
//! A task processor owns a strict FIFO queue of [`Task`]s, its execution
//! statistics, and exactly one [`Listener`] that decides when the queue is
//! drained. Callers hold cheap cloneable [`Processor`] handles; when the last
//! external handle is released the processor is unlinked from its registry,
//! its listener is shut down, and the ownership cycle between processor and
//! listener is broken.
//!
//! The processor and its listener form an intentional reference cycle: the
//! processor holds a strong reference to the listener, and the listener's
//! execution mechanism holds a [`ProcessorRef`] back to the processor. The
//! cycle is created when the processor is linked into a registry and broken
//! explicitly during teardown, never by dropping alone.

use crate::core::registry::RegistryInner;
use crate::error::{SerialqError, SerialqResult};
use crate::listener::Listener;
use crate::task::{Task, TaskStatus};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

/// Result of one call to the execute operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// No task was available; nothing was done
    Idle,
    /// A task ran and the queue still holds more work
    MoreWork,
    /// A task ran and the queue is now empty
    Drained,
}

/// Execution statistics for a single task processor.
///
/// Updated only by the execute operation, under the processor's lock, and
/// monotonically non-decreasing for the lifetime of the processor.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessorStats {
    /// Number of tasks executed so far
    pub processed: u64,
    /// Maximum queue depth observed by the execute operation
    pub max_depth: u64,
}

/// A point-in-time view of one task processor, used by diagnostic reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorSnapshot {
    /// The processor's unique name
    pub name: String,
    /// Number of tasks currently queued
    pub depth: usize,
    /// Number of tasks executed so far
    pub processed: u64,
    /// Maximum queue depth observed by the execute operation
    pub max_depth: u64,
}

/// Queue contents and statistics, guarded by one lock.
struct ProcessorState {
    queue: VecDeque<Task>,
    stats: ProcessorStats,
}

/// The shared inner state of a task processor.
///
/// Held alive by the registry entry, the listener's back-reference, and any
/// external [`Processor`] handles. Only external handles participate in the
/// teardown count.
pub(crate) struct ProcessorCore {
    name: String,
    state: Mutex<ProcessorState>,
    listener: Mutex<Option<Arc<dyn Listener>>>,
    shutting_down: AtomicBool,
    external_handles: AtomicUsize,
    registry: Weak<RegistryInner>,
    depth_warn: Option<usize>,
}

impl ProcessorCore {
    pub(crate) fn new(
        name: &str,
        registry: Weak<RegistryInner>,
        depth_warn: Option<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: Mutex::new(ProcessorState {
                queue: VecDeque::new(),
                stats: ProcessorStats::default(),
            }),
            listener: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
            external_handles: AtomicUsize::new(0),
            registry: Weak::clone(&registry),
            depth_warn,
        })
    }

    /// Lock the queue state, recovering from poisoning by taking the inner
    /// value; every critical section here leaves the state consistent.
    fn state(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn depth(&self) -> usize {
        self.state().queue.len()
    }

    pub(crate) fn stats(&self) -> ProcessorStats {
        self.state().stats
    }

    pub(crate) fn snapshot(&self) -> ProcessorSnapshot {
        let state = self.state();
        ProcessorSnapshot {
            name: self.name.clone(),
            depth: state.queue.len(),
            processed: state.stats.processed,
            max_depth: state.stats.max_depth,
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub(crate) fn has_external_handles(&self) -> bool {
        self.external_handles.load(Ordering::Acquire) != 0
    }

    /// Take one more external handle. Must happen while the registry lock is
    /// held when the count may be zero, so a concurrent teardown observes
    /// either the incremented count or the unlinked entry, never neither.
    fn acquire_external(&self) {
        self.external_handles.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one external handle, returning true iff it was the last one.
    fn release_external(&self) -> bool {
        self.external_handles.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn attach_listener(&self, listener: Arc<dyn Listener>) {
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(listener);
    }

    pub(crate) fn detach_listener(&self) -> Option<Arc<dyn Listener>> {
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        slot.take()
    }

    fn current_listener(&self) -> Option<Arc<dyn Listener>> {
        let slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }

    /// Append a task to the tail of the queue and notify the listener.
    ///
    /// The listener callback runs outside every processor lock.
    pub(crate) fn push_task(&self, task: Task) -> SerialqResult<Uuid> {
        if self.is_shutting_down() {
            return Err(SerialqError::ProcessorShutDown {
                name: self.name.clone(),
            });
        }

        let id = task.id();
        let (was_empty, depth) = {
            let mut state = self.state();
            let was_empty = state.queue.is_empty();
            state.queue.push_back(task);
            (was_empty, state.queue.len())
        };

        if self.depth_warn == Some(depth) {
            tracing::warn!(
                "task processor '{}' reached a queue depth of {}",
                self.name,
                depth
            );
        }
        tracing::debug!("queued task {} on '{}' (depth {})", id, self.name, depth);

        if let Some(listener) = self.current_listener() {
            listener.task_pushed(was_empty);
        }
        Ok(id)
    }

    /// Remove and return the head task, refusing once teardown has begun.
    fn pop_front(&self) -> Option<Task> {
        let mut state = self.state();
        if self.is_shutting_down() {
            return None;
        }
        state.queue.pop_front()
    }

    /// Pop one task and run it on the calling task.
    ///
    /// Listener strategies call this in a loop until it stops reporting
    /// [`Execution::MoreWork`]. The `emptied` callback runs outside the
    /// processor lock.
    pub(crate) async fn execute(&self) -> Execution {
        let Some(task) = self.pop_front() else {
            return Execution::Idle;
        };

        let id = task.id();
        if let Err(error) = task.run().await {
            tracing::warn!("task {} on '{}' failed: {}", id, self.name, error);
        }

        let depth = {
            let mut state = self.state();
            state.stats.processed += 1;
            let depth = state.queue.len();
            if depth as u64 > state.stats.max_depth {
                state.stats.max_depth = depth as u64;
            }
            depth
        };

        if depth == 0 {
            if let Some(listener) = self.current_listener() {
                listener.emptied();
            }
            Execution::Drained
        } else {
            Execution::MoreWork
        }
    }
}

impl Drop for ProcessorCore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let abandoned = state.queue.len();
        if abandoned > 0 {
            tracing::debug!(
                "destroying task processor '{}', dropping {} unexecuted tasks",
                self.name,
                abandoned
            );
        } else {
            tracing::debug!("destroying task processor '{}'", self.name);
        }
    }
}

/// Unlink the processor from its registry and quiesce its listener.
///
/// Runs when the last external handle is released. The unlink is re-validated
/// under the registry lock: a concurrent `get_or_create` that handed out a
/// fresh handle in the meantime aborts the teardown. The listener is shut
/// down only after the processor stops dequeuing, and detaching it is what
/// breaks the processor/listener ownership cycle.
pub(crate) async fn teardown(core: Arc<ProcessorCore>) {
    if let Some(registry) = core.registry.upgrade() {
        if !registry.unlink_if_unreferenced(&core).await {
            return;
        }
    }

    core.shutting_down.store(true, Ordering::Release);

    if let Some(listener) = core.detach_listener() {
        listener.shutdown().await;
    }
    tracing::debug!("task processor '{}' shut down", core.name());
}

/// An owned, cloneable handle to a named task processor.
///
/// Cloning a handle increments the processor's external reference count;
/// dropping or [`release`](Processor::release)-ing one decrements it. When
/// the last external handle goes away the processor is torn down: unlinked
/// from its registry and its listener quiesced. Tasks still queued at that
/// point are dropped, not run; dropping a task releases whatever its future
/// captured.
pub struct Processor {
    core: Option<Arc<ProcessorCore>>,
}

impl Processor {
    pub(crate) fn from_core(core: Arc<ProcessorCore>) -> Self {
        core.acquire_external();
        Self { core: Some(core) }
    }

    fn core(&self) -> &Arc<ProcessorCore> {
        // Only `release` and `Drop` vacate the slot, and both consume the handle
        self.core.as_ref().expect("processor handle already released")
    }

    /// Get the processor's unique name.
    pub fn name(&self) -> &str {
        self.core().name()
    }

    /// Get the number of tasks currently queued.
    pub fn depth(&self) -> usize {
        self.core().depth()
    }

    /// Get a copy of the processor's execution statistics.
    pub fn stats(&self) -> ProcessorStats {
        self.core().stats()
    }

    /// Push a unit of work onto the tail of the queue.
    ///
    /// Returns the id assigned to the queued task. The future runs on
    /// whatever execution mechanism the processor's listener chose, strictly
    /// after every task pushed before it.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use serialq::prelude::*;
    /// # async fn example(processor: Processor) -> SerialqResult<()> {
    /// processor.push(async {
    ///     println!("running on the queue's worker");
    ///     Ok(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn push<F>(&self, future: F) -> SerialqResult<Uuid>
    where
        F: Future<Output = TaskStatus> + Send + 'static,
    {
        self.core().push_task(Task::new(future))
    }

    /// Push an already-constructed [`Task`].
    pub fn push_task(&self, task: Task) -> SerialqResult<Uuid> {
        self.core().push_task(task)
    }

    /// Release this handle, tearing the processor down if it was the last.
    ///
    /// Unlike dropping the handle, this waits for the teardown (including the
    /// listener's quiesce) to complete before returning.
    pub async fn release(mut self) {
        if let Some(core) = self.core.take() {
            if core.release_external() {
                teardown(core).await;
            }
        }
    }
}

impl Clone for Processor {
    fn clone(&self) -> Self {
        Self::from_core(Arc::clone(self.core()))
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        let Some(core) = self.core.take() else {
            return;
        };
        if core.release_external() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(teardown(core));
                }
                Err(_) => tracing::warn!(
                    "last handle to task processor '{}' dropped outside a runtime, skipping teardown",
                    core.name()
                ),
            }
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name())
            .field("depth", &self.depth())
            .finish()
    }
}

/// The back-reference a listener holds to its task processor.
///
/// Structural: it keeps the processor's storage alive but does not count as
/// an external handle, so a listener holding one does not prevent teardown.
/// Listener strategies use it to drive [`execute`](ProcessorRef::execute).
#[derive(Clone)]
pub struct ProcessorRef {
    core: Arc<ProcessorCore>,
}

impl ProcessorRef {
    pub(crate) fn new(core: Arc<ProcessorCore>) -> Self {
        Self { core }
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<ProcessorCore> {
        &self.core
    }

    /// Get the processor's unique name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Get the number of tasks currently queued.
    pub fn depth(&self) -> usize {
        self.core.depth()
    }

    /// Pop one task and run it, reporting whether more work remains.
    ///
    /// Returns [`Execution::Idle`] without side effects when the queue is
    /// empty or the processor is shutting down.
    pub async fn execute(&self) -> Execution {
        self.core.execute().await
    }
}

impl fmt::Debug for ProcessorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRef")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Registry;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Listener that records callbacks and lets tests drive execute by hand.
    struct RecordingListener {
        pushes: StdMutex<Vec<bool>>,
        emptied: AtomicUsize,
        processor: StdMutex<Option<ProcessorRef>>,
    }

    impl RecordingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pushes: StdMutex::new(Vec::new()),
                emptied: AtomicUsize::new(0),
                processor: StdMutex::new(None),
            })
        }

        fn processor(&self) -> ProcessorRef {
            self.processor.lock().unwrap().clone().unwrap()
        }

        fn pushes(&self) -> Vec<bool> {
            self.pushes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn start(&self, processor: ProcessorRef) -> SerialqResult<()> {
            *self.processor.lock().unwrap() = Some(processor);
            Ok(())
        }

        fn task_pushed(&self, was_empty: bool) {
            self.pushes.lock().unwrap().push(was_empty);
        }

        fn emptied(&self) {
            self.emptied.fetch_add(1, Ordering::SeqCst);
        }

        async fn shutdown(&self) {}
    }

    async fn manual_processor(name: &str) -> (Registry, Processor, Arc<RecordingListener>) {
        let registry = Registry::new();
        let listener = RecordingListener::new();
        let processor = registry
            .create_with_listener(name, listener.clone())
            .await
            .unwrap();
        (registry, processor, listener)
    }

    #[tokio::test]
    async fn test_fifo_execution_order() {
        let (_registry, processor, listener) = manual_processor("fifo").await;
        let log = Arc::new(StdMutex::new(Vec::new()));

        for i in 1..=3u32 {
            let log = Arc::clone(&log);
            processor
                .push(async move {
                    log.lock().unwrap().push(i);
                    Ok(())
                })
                .unwrap();
        }

        let worker = listener.processor();
        assert_eq!(worker.execute().await, Execution::MoreWork);
        assert_eq!(worker.execute().await, Execution::MoreWork);
        assert_eq!(worker.execute().await, Execution::Drained);
        assert_eq!(worker.execute().await, Execution::Idle);

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(listener.emptied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_depth_tracks_queue_contents() {
        let (_registry, processor, listener) = manual_processor("depth").await;

        assert_eq!(processor.depth(), 0);
        for expected in 1..=4 {
            processor.push(async { Ok(()) }).unwrap();
            assert_eq!(processor.depth(), expected);
        }

        let worker = listener.processor();
        for expected in (0..4).rev() {
            worker.execute().await;
            assert_eq!(processor.depth(), expected);
        }
    }

    #[tokio::test]
    async fn test_stats_processed_and_max_depth() {
        let (_registry, processor, listener) = manual_processor("stats").await;

        for _ in 0..3 {
            processor.push(async { Ok(()) }).unwrap();
        }

        let worker = listener.processor();
        while worker.execute().await != Execution::Drained {}

        let stats = processor.stats();
        assert_eq!(stats.processed, 3);
        // max_depth folds the depth observed after each pop: 3 queued tasks
        // leave 2 behind at the first execute
        assert_eq!(stats.max_depth, 2);
    }

    #[tokio::test]
    async fn test_was_empty_notifications() {
        let (_registry, processor, listener) = manual_processor("notify").await;

        processor.push(async { Ok(()) }).unwrap();
        processor.push(async { Ok(()) }).unwrap();
        assert_eq!(listener.pushes(), vec![true, false]);

        let worker = listener.processor();
        while worker.execute().await != Execution::Drained {}

        processor.push(async { Ok(()) }).unwrap();
        assert_eq!(listener.pushes(), vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_halt_processor() {
        let (_registry, processor, listener) = manual_processor("failing").await;
        let log = Arc::new(StdMutex::new(Vec::new()));

        processor.push(async { Err("boom".into()) }).unwrap();
        let log_clone = Arc::clone(&log);
        processor
            .push(async move {
                log_clone.lock().unwrap().push("after");
                Ok(())
            })
            .unwrap();

        let worker = listener.processor();
        while worker.execute().await != Execution::Drained {}

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert_eq!(processor.stats().processed, 2);
    }

    #[tokio::test]
    async fn test_push_refused_during_teardown() {
        let (_registry, processor, listener) = manual_processor("refuse").await;

        let worker = listener.processor();
        processor.release().await;

        let result = worker.core().push_task(Task::new(async { Ok(()) }));
        assert!(matches!(
            result,
            Err(SerialqError::ProcessorShutDown { .. })
        ));
        assert_eq!(worker.execute().await, Execution::Idle);
    }

    #[tokio::test]
    async fn test_teardown_drops_queued_tasks() {
        struct SetOnDrop(Arc<AtomicBool>);

        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let (_registry, processor, listener) = manual_processor("abandon").await;
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(Arc::clone(&dropped));

        processor
            .push(async move {
                let _guard = guard;
                Ok(())
            })
            .unwrap();

        processor.release().await;
        // The listener's back-reference is the last holder of the queue
        drop(listener);

        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_clone_keeps_processor_alive() {
        let (registry, processor, _listener) = manual_processor("clones").await;

        let second = processor.clone();
        processor.release().await;
        assert_eq!(registry.count().await, 1);

        second.release().await;
        assert_eq!(registry.count().await, 0);
    }
}

//! Default listener implementation: one dedicated worker per processor.
//!
//! The worker alternates between two states. In *Idle* it is parked on a
//! [`Notify`]; a push into an empty queue (or a shutdown request) wakes it.
//! In *Draining* it calls the processor's execute operation until the queue
//! reports empty, then goes back to Idle. Shutdown raises a terminate flag,
//! wakes the worker, and awaits its join handle, so by the time shutdown
//! returns the worker has fully exited.

use crate::core::processor::{Execution, ProcessorRef};
use crate::error::{SerialqError, SerialqResult};
use crate::listener::Listener;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// State shared between the listener and its worker task.
struct WorkerShared {
    /// Wakes the worker out of Idle; a pending permit is never lost
    wake: Notify,
    /// Once true, the worker exits at its next wake
    terminate: AtomicBool,
}

/// The default execution strategy: a single dedicated worker task.
///
/// Tasks run one at a time on the worker, in push order. The worker sleeps
/// while the queue is empty and costs nothing but its stack.
pub struct DefaultListener {
    shared: Arc<WorkerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultListener {
    /// Create a new default listener. The worker is spawned by
    /// [`start`](Listener::start), not here.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(WorkerShared {
                wake: Notify::new(),
                terminate: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }
}

impl Default for DefaultListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for DefaultListener {
    async fn start(&self, processor: ProcessorRef) -> SerialqResult<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(SerialqError::listener_start(
                processor.name(),
                "worker already started",
            ));
        }

        let shared = Arc::clone(&self.shared);
        *worker = Some(tokio::spawn(worker_loop(processor, shared)));
        Ok(())
    }

    fn task_pushed(&self, was_empty: bool) {
        if was_empty {
            self.shared.wake.notify_one();
        }
    }

    // emptied() stays the default no-op: the worker already learns of the
    // drain from execute's return value

    async fn shutdown(&self) {
        self.shared.terminate.store(true, Ordering::Release);
        self.shared.wake.notify_one();

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::error!("task processor worker exited abnormally: {}", error);
            }
        }
    }
}

/// Drain the queue, park until woken, repeat until terminated.
async fn worker_loop(processor: ProcessorRef, shared: Arc<WorkerShared>) {
    tracing::debug!("worker for task processor '{}' started", processor.name());

    loop {
        loop {
            match processor.execute().await {
                Execution::MoreWork => continue,
                Execution::Drained | Execution::Idle => break,
            }
        }

        if shared.terminate.load(Ordering::Acquire) {
            break;
        }
        shared.wake.notified().await;
    }

    tracing::debug!("worker for task processor '{}' exited", processor.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{CreatePolicy, Registry};
    use crate::core::processor::Processor;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    async fn wait_for_processed(processor: &Processor, expected: u64) {
        for _ in 0..200 {
            if processor.stats().processed >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "processor '{}' never reached {} processed tasks",
            processor.name(),
            expected
        );
    }

    #[tokio::test]
    async fn test_worker_executes_in_push_order() {
        let registry = Registry::new();
        let processor = registry
            .get_or_create("queue-a", CreatePolicy::CreateIfAbsent)
            .await
            .unwrap()
            .unwrap();

        let log = Arc::new(StdMutex::new(Vec::new()));
        for label in ["t1", "t2", "t3"] {
            let log = Arc::clone(&log);
            processor
                .push(async move {
                    log.lock().unwrap().push(label);
                    Ok(())
                })
                .unwrap();
        }

        wait_for_processed(&processor, 3).await;
        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert_eq!(processor.stats().processed, 3);
        assert_eq!(processor.depth(), 0);

        processor.release().await;
    }

    #[tokio::test]
    async fn test_worker_wakes_again_after_drain() {
        let registry = Registry::new();
        let processor = registry
            .get_or_create("wake", CreatePolicy::CreateIfAbsent)
            .await
            .unwrap()
            .unwrap();

        processor.push(async { Ok(()) }).unwrap();
        wait_for_processed(&processor, 1).await;

        processor.push(async { Ok(()) }).unwrap();
        wait_for_processed(&processor, 2).await;

        processor.release().await;
    }

    #[tokio::test]
    async fn test_worker_survives_failing_task() {
        let registry = Registry::new();
        let processor = registry
            .get_or_create("resilient", CreatePolicy::CreateIfAbsent)
            .await
            .unwrap()
            .unwrap();

        processor.push(async { Err("probe failure".into()) }).unwrap();
        processor.push(async { Ok(()) }).unwrap();

        wait_for_processed(&processor, 2).await;
        processor.release().await;
    }

    #[tokio::test]
    async fn test_concurrent_pushers_lose_no_tasks() {
        let registry = Registry::new();
        let processor = registry
            .get_or_create("many-pushers", CreatePolicy::CreateIfAbsent)
            .await
            .unwrap()
            .unwrap();

        let mut joins = Vec::new();
        for _ in 0..8 {
            let handle = processor.clone();
            joins.push(tokio::spawn(async move {
                for _ in 0..25 {
                    handle.push(async { Ok(()) }).unwrap();
                }
                handle.release().await;
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        wait_for_processed(&processor, 200).await;
        assert_eq!(processor.stats().processed, 200);

        processor.release().await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_release_quiesces_worker() {
        let registry = Registry::new();
        let processor = registry
            .get_or_create("quiesce", CreatePolicy::CreateIfAbsent)
            .await
            .unwrap()
            .unwrap();

        processor.push(async { Ok(()) }).unwrap();

        // release waits for the worker join, so the entry is gone when it returns
        processor.release().await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_listener_refuses_second_start() {
        let listener = Arc::new(DefaultListener::new());

        let first = Registry::new();
        let processor = first
            .create_with_listener("owner", listener.clone())
            .await
            .unwrap();

        // The same listener cannot drive a second processor
        let second = Registry::new();
        let result = second.create_with_listener("thief", listener).await;
        assert!(matches!(result, Err(SerialqError::ListenerStart { .. })));
        assert_eq!(second.count().await, 0);

        processor.release().await;
    }
}

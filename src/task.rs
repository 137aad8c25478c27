//! Task definition for serialq.
//!
//! A [`Task`] is an opaque unit of work: a boxed future that owns everything
//! it needs to run. Tasks are created at push time, consumed by the
//! processor's execute operation immediately after their future completes,
//! and never cloned. A task that is still queued when its processor is torn
//! down is dropped, which releases any resources the future captured.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use uuid::Uuid;

/// Outcome returned by a task's future.
///
/// A failing task is logged by the executing processor and does not halt the
/// processor or affect the tasks queued behind it.
pub type TaskStatus = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

/// An opaque unit of work queued on a task processor.
pub struct Task {
    /// Unique task identifier, used in logs
    id: Uuid,
    /// The deferred computation; owns its captured state
    future: BoxFuture<'static, TaskStatus>,
}

impl Task {
    /// Create a new task from a future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = TaskStatus> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            future: Box::pin(future),
        }
    }

    /// Get the unique identifier of this task.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the task to completion, consuming it.
    pub(crate) async fn run(self) -> TaskStatus {
        self.future.await
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

//! Diagnostic probes and reporting for serialq registries.
//!
//! Because a push returning says nothing about when the pushed task runs,
//! [`ping`] exists: it queues a probe task on a named processor and measures
//! the wall-clock time until the probe actually executes, bounded by the
//! configured timeout. [`report`] renders the classic operator's table of
//! every live processor with its processed count, current depth, and maximum
//! observed depth.

use crate::core::processor::ProcessorSnapshot;
use crate::core::registry::{CreatePolicy, Registry};
use crate::error::{SerialqError, SerialqResult};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Ping a named task processor using the registry's configured timeout.
///
/// See [`ping_with_timeout`].
pub async fn ping(registry: &Registry, name: &str) -> SerialqResult<Duration> {
    ping_with_timeout(registry, name, registry.config().ping_timeout).await
}

/// Ping a named task processor, waiting at most `timeout` for the probe.
///
/// Pushes a probe task onto the processor and returns the elapsed wall-clock
/// time once the probe has run. An unknown name is reported as
/// [`SerialqError::NotFound`]; a probe that does not run within the bound is
/// reported as [`SerialqError::PingTimeout`]. Never hangs.
pub async fn ping_with_timeout(
    registry: &Registry,
    name: &str,
    timeout: Duration,
) -> SerialqResult<Duration> {
    let Some(processor) = registry.get_or_create(name, CreatePolicy::ExistingOnly).await? else {
        return Err(SerialqError::not_found(name));
    };

    let (probe_tx, probe_rx) = oneshot::channel();
    let begin = Instant::now();

    let pushed = processor.push(async move {
        let _ = probe_tx.send(());
        Ok(())
    });
    if let Err(error) = pushed {
        processor.release().await;
        return Err(error);
    }

    let outcome = tokio::time::timeout(timeout, probe_rx).await;
    let elapsed = begin.elapsed();
    processor.release().await;

    match outcome {
        Ok(Ok(())) => {
            tracing::debug!("pinged task processor '{}' in {:?}", name, elapsed);
            Ok(elapsed)
        }
        // A dropped probe means the processor was torn down before it ran;
        // either way the probe never executed within the bound
        Ok(Err(_)) | Err(_) => Err(SerialqError::PingTimeout {
            name: name.to_string(),
            timeout,
        }),
    }
}

/// A report over every task processor registered at the instant of the call.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    /// One row per live processor, sorted by name
    pub processors: Vec<ProcessorSnapshot>,
    /// Total number of live processors
    pub total: usize,
}

impl fmt::Display for RegistryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "+----- Processor -----+--- Processed ---+- In Queue -+- Max Depth -+"
        )?;
        for row in &self.processors {
            writeln!(
                f,
                "{:>24} {:>17} {:>12} {:>12}",
                row.name, row.processed, row.depth, row.max_depth
            )?;
        }
        writeln!(
            f,
            "+---------------------+-----------------+------------+-------------+"
        )?;
        write!(f, "{} task processors", self.total)
    }
}

/// Enumerate every live task processor with its statistics.
pub async fn report(registry: &Registry) -> RegistryReport {
    let processors = registry.snapshot().await;
    let total = processors.len();
    RegistryReport { processors, total }
}

//! Configuration types for serialq.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a serialq [`Registry`](crate::core::Registry).
///
/// # Examples
///
/// ```rust
/// use serialq::config::SerialqConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = SerialqConfig::default();
///
/// // Custom configuration
/// let config = SerialqConfig::default()
///     .with_ping_timeout(Duration::from_millis(500))
///     .with_depth_warn(1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialqConfig {
    /// How long a ping probe may wait before it is reported as timed out
    pub ping_timeout: Duration,

    /// Queue depth at which a warning is logged, if any.
    ///
    /// The warning fires on the push that first reaches the threshold; the
    /// push itself is never rejected.
    pub depth_warn: Option<usize>,
}

impl Default for SerialqConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            depth_warn: None,
        }
    }
}

impl SerialqConfig {
    /// Set the ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Set the queue depth warning threshold.
    pub fn with_depth_warn(mut self, depth: usize) -> Self {
        self.depth_warn = Some(depth);
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ping_timeout.is_zero() {
            errors.push("Ping timeout must be greater than zero".to_string());
        }

        if self.depth_warn == Some(0) {
            errors.push("Depth warning threshold must be greater than zero".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

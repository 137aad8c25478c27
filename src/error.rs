//! Error types for serialq operations.

use std::time::Duration;
use thiserror::Error;

/// Result type used throughout serialq.
pub type SerialqResult<T> = Result<T, SerialqError>;

/// Main error type for serialq operations.
#[derive(Error, Debug)]
pub enum SerialqError {
    /// A task processor name was empty
    #[error("task processor name must not be empty")]
    EmptyName,

    /// A task processor with this name already exists
    #[error("task processor '{name}' already exists")]
    NameTaken {
        /// The name that was already registered
        name: String,
    },

    /// No task processor with this name is registered
    #[error("task processor '{name}' not found")]
    NotFound {
        /// The name that wasn't found
        name: String,
    },

    /// The task processor refused the operation because it is being torn down
    #[error("task processor '{name}' is shutting down")]
    ProcessorShutDown {
        /// The name of the processor being torn down
        name: String,
    },

    /// A listener failed to start its execution mechanism
    #[error("listener for task processor '{name}' failed to start: {message}")]
    ListenerStart {
        /// The name of the processor the listener belongs to
        name: String,
        /// What went wrong
        message: String,
    },

    /// A ping probe was not executed within the allotted time
    #[error("ping of task processor '{name}' timed out after {timeout:?}")]
    PingTimeout {
        /// The name of the pinged processor
        name: String,
        /// The bound the probe had to run within
        timeout: Duration,
    },
}

impl SerialqError {
    /// Create a new name-taken error
    pub fn name_taken(name: impl Into<String>) -> Self {
        Self::NameTaken { name: name.into() }
    }

    /// Create a new not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a new listener start error
    pub fn listener_start(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerStart {
            name: name.into(),
            message: message.into(),
        }
    }
}

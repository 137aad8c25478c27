//! The serialq core: named task processors and their registry.
//!
//! A [`Processor`] is a uniquely-named FIFO queue with per-processor
//! statistics and exactly one listener deciding when queued work runs. The
//! [`Registry`] hands out reference-counted handles to processors by name,
//! creating them on first use and tearing them down when the last handle is
//! released.

pub mod processor;
pub mod registry;

pub use processor::{Execution, Processor, ProcessorRef, ProcessorSnapshot, ProcessorStats};
pub use registry::{CreatePolicy, Registry, global};

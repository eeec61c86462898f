//! Background job queue and processing.

pub mod model;
pub mod processor;

pub use model::{Job, JobStatus};
pub use processor::{JobProcessor, ProcessorDeps, spawn_retention_task};

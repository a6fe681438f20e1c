pub mod controller;
pub mod error;
pub mod extstate;
pub mod job;

pub use crate::controller::{JobController, JobState, ProjectImporter, Tick, WorkerConfig};
pub use crate::error::{WorkerError, WorkerResult};
pub use crate::extstate::{ExtState, FileExtState, MemoryExtState};
pub use crate::job::{BitDepth, JobRequest};

//! Persistent key/value channel shared with the calling host.
//!
//! The host GUI writes the job request under a fixed section before invoking
//! the worker and polls the `Status` key afterwards; `Command` carries the
//! cancel request back to us. The store is the only channel between the two
//! processes.

mod file;
mod memory;

pub use file::FileExtState;
pub use memory::MemoryExtState;

use async_trait::async_trait;

use crate::error::WorkerResult;

/// Section all worker keys live under.
pub const SECTION: &str = "MatcheringWorker";

/// Keys exchanged with the host GUI.
pub mod keys {
    pub const TARGET: &str = "Target";
    pub const REFERENCE: &str = "Reference";
    pub const REFERENCE_NAME: &str = "ReferenceName";
    pub const BIT_DEPTH: &str = "BitDepth";
    pub const COMMAND: &str = "Command";
    pub const STATUS: &str = "Status";
}

/// Value of `Command` that requests cancellation of the running job.
pub const CANCEL_COMMAND: &str = "Cancel";

/// Cross-process key/value store, keyed by section and key.
#[async_trait]
pub trait ExtState: Send + Sync {
    async fn get(&self, section: &str, key: &str) -> WorkerResult<Option<String>>;
    async fn set(&self, section: &str, key: &str, value: &str) -> WorkerResult<()>;
}

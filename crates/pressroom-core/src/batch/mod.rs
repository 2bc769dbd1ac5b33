//! Batch orchestration.
//!
//! Runs the single-item pipeline over many files with a bounded number of
//! concurrent workers. Failures are recorded per file and never stop the
//! batch; an abort discards everything produced so far.
//!
//! # Modules
//!
//! - `job` - Batch state, entries and failure records
//! - `worker` - The worker task and the dispatchers that run it
//! - `orchestrator` - The orchestration loop, configuration and abort

mod job;
mod orchestrator;
mod worker;

pub use job::{BatchEntry, BatchJob, BatchState, FailureRecord, FileId};
pub use orchestrator::{abort_pair, AbortHandle, AbortSignal, BatchConfig, BatchEvent, BatchOrchestrator};
#[cfg(not(target_arch = "wasm32"))]
pub use worker::BlockingDispatcher;
pub use worker::{run_task, run_task_with, Dispatcher, InlineDispatcher, WorkerOutcome, WorkerTask};

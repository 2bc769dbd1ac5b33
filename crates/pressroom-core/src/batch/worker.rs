//! The worker task and the dispatchers that run it.
//!
//! Every file is processed by the same static function, [`run_task`]. A
//! [`Dispatcher`] decides where that function runs: inline on the
//! orchestrating executor, on a blocking thread, or (in the browser) inside a
//! Web Worker owned by the host page. Workers hand their outcome back by
//! value and never touch the batch state.

use std::future::Future;

use futures::future::{self, Ready};

use super::{FailureRecord, FileId};
use crate::decode::decode;
use crate::encode::{HostEncoder, NativeEncoder};
use crate::engine::{process, CompressionResult, PipelineOptions};
use crate::pipeline::CompressError;
use crate::settings::CompressionSettings;

/// Everything a worker needs to process one file.
#[derive(Debug, Clone)]
pub struct WorkerTask {
    pub id: FileId,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub settings: CompressionSettings,
    pub options: PipelineOptions,
}

/// What a worker sends back for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutcome {
    pub id: FileId,
    pub file_name: String,
    pub result: Result<CompressionResult, FailureRecord>,
}

impl WorkerOutcome {
    pub fn failed(id: FileId, file_name: impl Into<String>, failure: FailureRecord) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            result: Err(failure),
        }
    }
}

/// Decode and process one file with the native encoder.
pub fn run_task(task: WorkerTask) -> WorkerOutcome {
    run_task_with(task, &NativeEncoder)
}

/// Decode and process one file with the given encoder.
pub fn run_task_with<E: HostEncoder>(task: WorkerTask, encoder: &E) -> WorkerOutcome {
    let WorkerTask {
        id,
        file_name,
        mime_type,
        bytes,
        settings,
        options,
    } = task;

    let result = decode(bytes, &mime_type, &file_name)
        .map_err(CompressError::from)
        .and_then(|source| process(source, &settings, &options, encoder).map_err(CompressError::from))
        .map_err(|err| FailureRecord::from(&err));

    WorkerOutcome {
        id,
        file_name,
        result,
    }
}

/// Hands worker tasks to some unit of concurrent execution.
///
/// The returned future resolves once the task has finished. Dropping it
/// before then must release the execution's resources where the backend
/// allows it.
pub trait Dispatcher {
    type Future: Future<Output = WorkerOutcome>;

    fn dispatch(&self, task: WorkerTask) -> Self::Future;
}

/// Runs each task synchronously on the calling executor.
///
/// For single-threaded hosts with no worker facility; files still finish
/// one by one and the orchestrator logic is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    type Future = Ready<WorkerOutcome>;

    fn dispatch(&self, task: WorkerTask) -> Self::Future {
        future::ready(run_task(task))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::BlockingDispatcher;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use futures::future::{BoxFuture, FutureExt};
    use tokio::runtime::Handle;
    use tracing::warn;

    use super::{run_task, Dispatcher, WorkerOutcome, WorkerTask};
    use crate::batch::FailureRecord;
    use crate::pipeline::ErrorKind;

    /// Runs each task on tokio's blocking thread pool.
    ///
    /// Dropping the returned future detaches the thread: a task that already
    /// started runs to the end and its outcome is discarded.
    #[derive(Debug, Clone)]
    pub struct BlockingDispatcher {
        runtime: Handle,
    }

    impl BlockingDispatcher {
        pub fn new(runtime: Handle) -> Self {
            Self { runtime }
        }

        /// Use the runtime the caller is running on, if any.
        pub fn try_current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl Dispatcher for BlockingDispatcher {
        type Future = BoxFuture<'static, WorkerOutcome>;

        fn dispatch(&self, task: WorkerTask) -> Self::Future {
            let id = task.id;
            let file_name = task.file_name.clone();
            let handle = self.runtime.spawn_blocking(move || run_task(task));

            async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(file = %file_name, "worker failed: {}", err);
                        WorkerOutcome::failed(id, file_name, FailureRecord::new(ErrorKind::Worker, err.to_string()))
                    }
                }
            }
            .boxed()
        }
    }
}

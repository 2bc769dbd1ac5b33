//! Batch compression bindings.
//!
//! The page owns the Web Workers: `JsBatch` is constructed with a `dispatch`
//! function that posts one task to a worker and returns a Promise of the
//! worker's reply. The orchestration loop runs here on the page's event
//! loop, keeping at most `maxConcurrency` dispatches outstanding.
//!
//! # Example
//!
//! ```typescript
//! import { JsBatch } from '@pressroom/wasm';
//!
//! const pool = new WorkerPool('./worker.js');
//! const batch = new JsBatch(
//!   (meta, bytes) => pool.run(meta, bytes),
//!   () => pool.terminateAll(),
//!   { maxConcurrency: navigator.hardwareConcurrency },
//! );
//!
//! const files = inputs.map(f => ({ name: f.name, type: f.type, bytes: f.bytes }));
//! const summary = await batch.compress(files, settings, event => {
//!   if (event.type === 'progress') bar.value = event.completed / event.total;
//! });
//! ```

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Function, Promise, Reflect};
use pressroom_core::batch::{Dispatcher, WorkerOutcome, WorkerTask};
use pressroom_core::pipeline::{CompressError, ErrorKind};
use pressroom_core::{
    abort_pair, validate, AbortHandle, BatchConfig, BatchEvent, BatchJob, BatchOrchestrator, BatchState,
    CompressionSummary, FailureRecord, InputFile,
};
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use crate::types::{error_to_js, settings_from_js};
use crate::worker::{bytes_from_js, outcome_from_js, to_js_with_bytes, TaskMeta};

/// Hands tasks to a JS function that returns a Promise of the outcome.
///
/// Dropping the returned future stops listening but cannot stop the worker;
/// `JsBatch::abort` calls the host's cancel function for that.
struct JsDispatcher {
    dispatch: Function,
}

impl Dispatcher for JsDispatcher {
    type Future = LocalBoxFuture<'static, WorkerOutcome>;

    fn dispatch(&self, task: WorkerTask) -> Self::Future {
        let id = task.id;
        let file_name = task.file_name.clone();
        let (meta, bytes) = TaskMeta::split(task);
        let call = serde_wasm_bindgen::to_value(&meta)
            .map_err(|e| JsValue::from_str(&e.to_string()))
            .and_then(|meta| {
                let bytes = js_sys::Uint8Array::from(bytes.as_slice());
                self.dispatch.call2(&JsValue::NULL, &meta, &bytes)
            });

        async move {
            let reply = match call {
                Ok(value) => JsFuture::from(Promise::resolve(&value)).await,
                Err(err) => Err(err),
            };
            reply.and_then(|value| outcome_from_js(&value)).unwrap_or_else(|err| {
                let message = js_error_message(&err);
                warn!(file = %file_name, "worker failed: {}", message);
                WorkerOutcome::failed(id, file_name, FailureRecord::new(ErrorKind::Worker, message))
            })
        }
        .boxed_local()
    }
}

fn js_error_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            Reflect::get(err, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}

/// Batch events as seen by JS, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum JsEvent<'a> {
    #[serde(rename_all = "camelCase")]
    FileFinished {
        id: usize,
        file_name: &'a str,
        summary: Option<CompressionSummary>,
        failure: Option<&'a FailureRecord>,
    },
    Progress {
        completed: usize,
        total: usize,
    },
    Completed,
    Aborted,
}

impl<'a> From<BatchEvent<'a>> for JsEvent<'a> {
    fn from(event: BatchEvent<'a>) -> Self {
        match event {
            BatchEvent::FileFinished(entry) => JsEvent::FileFinished {
                id: entry.id.0,
                file_name: &entry.file_name,
                summary: entry.outcome.as_ref().ok().map(|r| r.summary()),
                failure: entry.outcome.as_ref().err(),
            },
            BatchEvent::Progress { completed, total } => JsEvent::Progress { completed, total },
            BatchEvent::Completed => JsEvent::Completed,
            BatchEvent::Aborted => JsEvent::Aborted,
        }
    }
}

/// What the `compress` promise resolves to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSummary {
    state: BatchState,
    total_count: usize,
    completed_count: usize,
    failed_count: usize,
}

impl From<&BatchJob> for JobSummary {
    fn from(job: &BatchJob) -> Self {
        Self {
            state: job.state(),
            total_count: job.total_count(),
            completed_count: job.completed_count(),
            failed_count: job.failures().count(),
        }
    }
}

/// Deliver one event; finished files carry their encoded bytes.
fn emit(on_event: &Function, event: BatchEvent<'_>) {
    let value = match event {
        BatchEvent::FileFinished(entry) => {
            let bytes: &[u8] = match &entry.outcome {
                Ok(result) => &result.encoded_bytes,
                Err(_) => &[],
            };
            to_js_with_bytes(&JsEvent::from(event), bytes)
        }
        _ => serde_wasm_bindgen::to_value(&JsEvent::from(event)).map_err(|e| JsValue::from_str(&e.to_string())),
    };

    let delivered = value.and_then(|value| on_event.call1(&JsValue::NULL, &value));
    if let Err(err) = delivered {
        warn!("event callback failed: {}", js_error_message(&err));
    }
}

/// Read `{ name, type, bytes }` (a `File`-like record with its contents).
fn input_file_from_js(value: JsValue) -> Result<InputFile, JsValue> {
    let field = |key: &str| -> Result<String, JsValue> {
        Reflect::get(&value, &JsValue::from_str(key))?
            .as_string()
            .ok_or_else(|| JsValue::from_str(&format!("Input file is missing `{}`", key)))
    };
    let name = field("name")?;
    let mime_type = field("type")?;
    let bytes = bytes_from_js(&value, "bytes")?;
    Ok(InputFile::new(name, mime_type, bytes))
}

/// A batch compressor for JavaScript.
///
/// One instance can run several batches in sequence. Starting a new batch
/// aborts the one still running.
#[wasm_bindgen]
pub struct JsBatch {
    orchestrator: Rc<BatchOrchestrator<JsDispatcher>>,
    cancel: Option<Function>,
    abort: Option<AbortHandle>,
}

#[wasm_bindgen]
impl JsBatch {
    /// Create a batch compressor.
    ///
    /// # Arguments
    ///
    /// * `dispatch` - `(meta, bytes) => Promise<outcome>`; runs `run_worker_task` in a worker
    /// * `cancel` - Optional; called on abort to terminate running workers
    /// * `config` - `{ maxConcurrency?, options? }`; `undefined` for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(dispatch: Function, cancel: Option<Function>, config: JsValue) -> Result<JsBatch, JsValue> {
        let config: BatchConfig = if config.is_undefined() || config.is_null() {
            BatchConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        Ok(JsBatch {
            orchestrator: Rc::new(BatchOrchestrator::new(JsDispatcher { dispatch }, config)),
            cancel,
            abort: None,
        })
    }

    /// Maximum number of files processed at once
    #[wasm_bindgen(getter)]
    pub fn max_concurrency(&self) -> usize {
        self.orchestrator.config().max_concurrency
    }

    /// Compress `files` with one set of settings.
    ///
    /// `on_event` receives `fileFinished` (with `bytes` on success), `progress`,
    /// and finally exactly one of `completed` or `aborted`. The returned
    /// Promise resolves to `{ state, totalCount, completedCount, failedCount }`.
    ///
    /// Settings that are invalid for every file throw a `{ kind: "validation",
    /// message }` object before any work starts.
    pub fn compress(&mut self, files: Array, settings: JsValue, on_event: Function) -> Result<Promise, JsValue> {
        let raw = settings_from_js(settings)?;
        validate(&raw).map_err(|e| error_to_js(&CompressError::from(e)))?;
        let files = files
            .iter()
            .map(input_file_from_js)
            .collect::<Result<Vec<_>, _>>()?;

        let (handle, signal) = abort_pair();
        if let Some(previous) = self.abort.replace(handle) {
            if !previous.is_finished() {
                previous.abort();
                self.cancel_workers();
            }
        }

        let orchestrator = Rc::clone(&self.orchestrator);
        Ok(future_to_promise(async move {
            let job = orchestrator
                .compress(files, &raw, signal, |event| emit(&on_event, event))
                .await
                .map_err(|e| error_to_js(&CompressError::from(e)))?;
            serde_wasm_bindgen::to_value(&JobSummary::from(&job)).map_err(|e| JsValue::from_str(&e.to_string()))
        }))
    }

    /// Abort the running batch and cancel its workers. Returns false if no
    /// batch is running.
    pub fn abort(&mut self) -> bool {
        match self.abort.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                self.cancel_workers();
                true
            }
            _ => false,
        }
    }
}

impl JsBatch {
    fn cancel_workers(&self) {
        if let Some(cancel) = &self.cancel {
            if let Err(err) = cancel.call0(&JsValue::NULL) {
                warn!("cancel callback failed: {}", js_error_message(&err));
            }
        }
    }
}

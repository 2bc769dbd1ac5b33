//! The Web Worker side of batch compression.
//!
//! A batch running on the page hands each file to a worker as a plain
//! metadata object plus a `Uint8Array` of file bytes. The worker calls
//! [`run_worker_task`] and posts the returned object back. Only the encoded
//! bytes cross as a typed array; everything else is plain data.
//!
//! ```typescript
//! // worker.ts
//! import init, { run_worker_task } from '@pressroom/wasm';
//!
//! self.onmessage = async ({ data }) => {
//!   await init();
//!   const outcome = run_worker_task(data.meta, data.bytes);
//!   self.postMessage(outcome, [outcome.bytes.buffer]);
//! };
//! ```

use js_sys::{Object, Reflect, Uint8Array};
use pressroom_core::batch::{run_task, FailureRecord, FileId, WorkerOutcome, WorkerTask};
use pressroom_core::{CompressionResult, CompressionSettings, CompressionSummary, PipelineOptions};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

const BYTES_KEY: &str = "bytes";

/// Task metadata as posted to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskMeta {
    pub id: usize,
    pub file_name: String,
    pub mime_type: String,
    pub settings: CompressionSettings,
    #[serde(default)]
    pub options: PipelineOptions,
}

impl TaskMeta {
    pub fn split(task: WorkerTask) -> (Self, Vec<u8>) {
        let meta = Self {
            id: task.id.0,
            file_name: task.file_name,
            mime_type: task.mime_type,
            settings: task.settings,
            options: task.options,
        };
        (meta, task.bytes)
    }

    pub fn into_task(self, bytes: Vec<u8>) -> WorkerTask {
        WorkerTask {
            id: FileId(self.id),
            file_name: self.file_name,
            mime_type: self.mime_type,
            bytes,
            settings: self.settings,
            options: self.options,
        }
    }
}

/// Outcome metadata as posted back by a worker. The encoded bytes travel
/// next to it under `bytes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OutcomeMeta {
    pub id: usize,
    pub file_name: String,
    #[serde(default)]
    pub summary: Option<CompressionSummary>,
    #[serde(default)]
    pub failure: Option<FailureRecord>,
}

impl OutcomeMeta {
    pub fn split(outcome: WorkerOutcome) -> (Self, Vec<u8>) {
        let (summary, failure, bytes) = match outcome.result {
            Ok(result) => (Some(result.summary()), None, result.encoded_bytes),
            Err(failure) => (None, Some(failure), Vec::new()),
        };
        let meta = Self {
            id: outcome.id.0,
            file_name: outcome.file_name,
            summary,
            failure,
        };
        (meta, bytes)
    }

    /// Rebuild the outcome. A message carrying neither a summary nor a
    /// failure is rejected.
    pub fn into_outcome(self, bytes: Vec<u8>) -> Result<WorkerOutcome, String> {
        let result = match (self.summary, self.failure) {
            (_, Some(failure)) => Err(failure),
            (Some(summary), None) => Ok(CompressionResult::from_summary(summary, bytes)),
            (None, None) => return Err(format!("worker sent no result for {}", self.file_name)),
        };
        Ok(WorkerOutcome {
            id: FileId(self.id),
            file_name: self.file_name,
            result,
        })
    }
}

/// Serialize `meta` and attach `bytes` as a `Uint8Array` property.
pub(crate) fn to_js_with_bytes<T: Serialize>(meta: &T, bytes: &[u8]) -> Result<JsValue, JsValue> {
    let value = serde_wasm_bindgen::to_value(meta).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let object: Object = value.dyn_into()?;
    Reflect::set(&object, &JsValue::from_str(BYTES_KEY), &Uint8Array::from(bytes))?;
    Ok(object.into())
}

/// Read a `Uint8Array` property back into a vector; missing means empty.
pub(crate) fn bytes_from_js(value: &JsValue, key: &str) -> Result<Vec<u8>, JsValue> {
    let bytes = Reflect::get(value, &JsValue::from_str(key))?;
    if bytes.is_undefined() || bytes.is_null() {
        return Ok(Vec::new());
    }
    Ok(bytes.dyn_into::<Uint8Array>()?.to_vec())
}

/// Decode an outcome object posted back by a worker.
pub(crate) fn outcome_from_js(value: &JsValue) -> Result<WorkerOutcome, JsValue> {
    let meta: OutcomeMeta =
        serde_wasm_bindgen::from_value(value.clone()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let bytes = bytes_from_js(value, BYTES_KEY)?;
    meta.into_outcome(bytes).map_err(|e| JsValue::from_str(&e))
}

/// Process one batch task inside a Web Worker.
///
/// # Arguments
///
/// * `meta` - `{ id, fileName, mimeType, settings, options? }` with resolved settings
/// * `bytes` - The raw file contents
///
/// # Returns
///
/// `{ id, fileName, summary?, failure?, bytes }`. Pipeline failures are
/// reported in `failure`, not thrown; only a malformed `meta` throws.
#[wasm_bindgen]
pub fn run_worker_task(meta: JsValue, bytes: Vec<u8>) -> Result<JsValue, JsValue> {
    let meta: TaskMeta =
        serde_wasm_bindgen::from_value(meta).map_err(|e| JsValue::from_str(&format!("Invalid task: {}", e)))?;
    let outcome = run_task(meta.into_task(bytes));
    let (meta, bytes) = OutcomeMeta::split(outcome);
    to_js_with_bytes(&meta, &bytes)
}

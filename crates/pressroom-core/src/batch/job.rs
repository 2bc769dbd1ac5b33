//! Batch job state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::{CompressionResult, ExportHandle};
use crate::pipeline::{CompressError, ErrorKind};

/// Identity of a file within one batch: its index in the input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Why one file in a batch produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&CompressError> for FailureRecord {
    fn from(err: &CompressError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// One finished file: a result or the failure recorded against it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub id: FileId,
    pub file_name: String,
    pub outcome: Result<CompressionResult, FailureRecord>,
}

/// Accumulated state of one `compress` invocation.
///
/// Only the orchestrator mutates it; callers get read access.
#[derive(Debug, Default)]
pub struct BatchJob {
    state: BatchState,
    total_count: usize,
    completed_count: usize,
    results: Vec<BatchEntry>,
    pending: BTreeSet<FileId>,
}

impl BatchJob {
    pub(crate) fn new(total_count: usize) -> Self {
        Self {
            total_count,
            ..Default::default()
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    /// Finished entries in order of arrival.
    pub fn results(&self) -> &[BatchEntry] {
        &self.results
    }

    /// Files dispatched but not yet finished.
    pub fn pending(&self) -> &BTreeSet<FileId> {
        &self.pending
    }

    /// True once every file has finished. Gates "download all".
    pub fn is_complete(&self) -> bool {
        self.state == BatchState::Completed
    }

    pub fn successes(&self) -> impl Iterator<Item = (&BatchEntry, &CompressionResult)> {
        self.results
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().ok().map(|result| (entry, result)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&BatchEntry, &FailureRecord)> {
        self.results
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().err().map(|failure| (entry, failure)))
    }

    /// Entries re-sorted into input order.
    pub fn sorted_by_input(&self) -> Vec<&BatchEntry> {
        let mut entries: Vec<_> = self.results.iter().collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    /// One export handle per successful file, in input order.
    ///
    /// Empty until the batch has completed; there is no archive packaging, so
    /// "download all" means downloading each handle.
    pub fn export_all(&self) -> Vec<ExportHandle<'_>> {
        if !self.is_complete() {
            return Vec::new();
        }
        self.sorted_by_input()
            .into_iter()
            .filter_map(|entry| entry.outcome.as_ref().ok().map(CompressionResult::export))
            .collect()
    }

    /// Completion as a whole percentage (0 to 100).
    pub fn progress_percent(&self) -> usize {
        if self.total_count == 0 {
            return 100;
        }
        self.completed_count * 100 / self.total_count
    }

    pub(crate) fn start(&mut self) {
        self.state = BatchState::Running;
    }

    pub(crate) fn mark_pending(&mut self, id: FileId) {
        self.pending.insert(id);
    }

    /// Record a finished file and return it.
    pub(crate) fn record(&mut self, entry: BatchEntry) -> &BatchEntry {
        self.pending.remove(&entry.id);
        self.completed_count += 1;
        self.results.push(entry);
        &self.results[self.results.len() - 1]
    }

    pub(crate) fn complete(&mut self) {
        self.state = BatchState::Completed;
    }

    /// Discard all work products. `completed_count` keeps its value so the
    /// caller can see how far the batch got.
    pub(crate) fn abort(&mut self) {
        self.state = BatchState::Aborted;
        self.results.clear();
        self.results.shrink_to_fit();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;

    fn ok_entry(id: usize, size: usize) -> BatchEntry {
        BatchEntry {
            id: FileId(id),
            file_name: format!("f{id}.png"),
            outcome: Ok(CompressionResult {
                encoded_bytes: vec![0u8; size],
                output_format: ImageFormat::Png,
                width: 1,
                height: 1,
                original_byte_size: size * 2,
                original_width: 1,
                original_height: 1,
                suggested_file_name: format!("f{id}-compressed.png"),
            }),
        }
    }

    fn failed_entry(id: usize) -> BatchEntry {
        BatchEntry {
            id: FileId(id),
            file_name: format!("f{id}.png"),
            outcome: Err(FailureRecord::new(ErrorKind::Decode, "bad")),
        }
    }

    #[test]
    fn test_new_job_is_idle() {
        let job = BatchJob::new(3);
        assert_eq!(job.state(), BatchState::Idle);
        assert_eq!(job.total_count(), 3);
        assert_eq!(job.completed_count(), 0);
        assert_eq!(job.progress_percent(), 0);
    }

    #[test]
    fn test_record_tracks_pending_and_counts() {
        let mut job = BatchJob::new(2);
        job.start();
        job.mark_pending(FileId(0));
        job.mark_pending(FileId(1));

        let entry = job.record(ok_entry(1, 10));
        assert_eq!(entry.id, FileId(1));
        assert_eq!(job.completed_count(), 1);
        assert_eq!(job.pending().iter().copied().collect::<Vec<_>>(), vec![FileId(0)]);
        assert_eq!(job.progress_percent(), 50);
    }

    #[test]
    fn test_sorted_and_export_all() {
        let mut job = BatchJob::new(3);
        job.start();
        job.record(ok_entry(2, 5));
        job.record(failed_entry(1));
        job.record(ok_entry(0, 7));

        // Not complete yet: nothing to export
        assert!(job.export_all().is_empty());
        job.complete();

        let ids: Vec<_> = job.sorted_by_input().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let exports = job.export_all();
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].file_name, "f0-compressed.png");
        assert_eq!(exports[1].file_name, "f2-compressed.png");

        assert_eq!(job.successes().count(), 2);
        assert_eq!(job.failures().count(), 1);
    }

    #[test]
    fn test_abort_discards_results() {
        let mut job = BatchJob::new(3);
        job.start();
        job.mark_pending(FileId(2));
        job.record(ok_entry(0, 5));
        job.abort();

        assert_eq!(job.state(), BatchState::Aborted);
        assert_eq!(job.completed_count(), 1);
        assert!(job.results().is_empty());
        assert!(job.pending().is_empty());
        assert!(!job.is_complete());
    }

    #[test]
    fn test_failure_record_from_error() {
        let err = CompressError::Decode(crate::decode::DecodeError::UnsupportedFormat("image/gif".into()));
        let record = FailureRecord::from(&err);
        assert_eq!(record.kind, ErrorKind::UnsupportedFormat);
        assert!(record.message.contains("image/gif"));
    }
}

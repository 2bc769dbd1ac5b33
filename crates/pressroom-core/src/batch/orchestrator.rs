//! Fans the single-item pipeline out over many files.
//!
//! The orchestration loop is a single `async fn`: it validates the settings
//! once, resolves them for every file up front, hands the resulting tasks to a [`Dispatcher`] with at
//! most `max_concurrency` in flight, and folds outcomes into the [`BatchJob`]
//! in whatever order they arrive. Only this loop mutates the job, so no
//! locking is involved.

use futures::channel::oneshot;
use futures::select;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BatchEntry, BatchJob, Dispatcher, FailureRecord, FileId, WorkerTask};
use crate::decode::probe;
use crate::engine::PipelineOptions;
use crate::pipeline::{CompressError, InputFile};
use crate::settings::{resolve, validate, RawSettings, ValidationError};

const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Batch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchConfig {
    /// Upper bound on simultaneously running workers; extra files queue
    pub max_concurrency: usize,
    pub options: PipelineOptions,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            options: PipelineOptions::default(),
        }
    }
}

/// Notifications emitted while a batch runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchEvent<'a> {
    /// A file finished, successfully or not.
    FileFinished(&'a BatchEntry),
    /// Emitted after every finished file.
    Progress { completed: usize, total: usize },
    /// Every file has finished. Terminal.
    Completed,
    /// The batch was cancelled. Terminal.
    Aborted,
}

/// Cancels a running batch.
#[derive(Debug)]
pub struct AbortHandle {
    sender: oneshot::Sender<()>,
}

impl AbortHandle {
    /// Abort the batch. Has no effect once the batch has completed.
    pub fn abort(self) {
        let _ = self.sender.send(());
    }

    /// True once the batch this handle controls has returned, whether it
    /// completed, was aborted or was rejected up front.
    pub fn is_finished(&self) -> bool {
        self.sender.is_canceled()
    }
}

/// The orchestrator's end of an [`AbortHandle`].
///
/// Dropping the handle without calling `abort` leaves the batch running.
#[derive(Debug)]
pub struct AbortSignal {
    receiver: oneshot::Receiver<()>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, receiver) = oneshot::channel();
        Self { receiver }
    }
}

/// Create a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (sender, receiver) = oneshot::channel();
    (AbortHandle { sender }, AbortSignal { receiver })
}

/// Runs batches of files through a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct BatchOrchestrator<D> {
    dispatcher: D,
    config: BatchConfig,
}

impl<D: Dispatcher> BatchOrchestrator<D> {
    pub fn new(dispatcher: D, config: BatchConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Compress `files`, reporting through `on_event`, until every file has
    /// finished or `abort` fires.
    ///
    /// Per-file failures (unsupported type, unreadable data, settings that
    /// do not fit that file, encoder failure) are recorded against that file
    /// and count toward completion; they never stop the batch. On abort,
    /// in-flight work is dropped, produced results are discarded and
    /// `Aborted` is the last event.
    ///
    /// # Errors
    ///
    /// Settings that are invalid for any file (see [`validate`]) reject the
    /// whole batch before any event is emitted.
    pub async fn compress<F>(
        &self,
        files: Vec<InputFile>,
        raw: &RawSettings,
        abort: AbortSignal,
        mut on_event: F,
    ) -> Result<BatchJob, ValidationError>
    where
        F: FnMut(BatchEvent<'_>),
    {
        if let Err(err) = validate(raw) {
            warn!(files = files.len(), "batch rejected: {}", err);
            return Err(err);
        }

        let mut job = BatchJob::new(files.len());
        job.start();
        info!(
            files = job.total_count(),
            max_concurrency = self.config.max_concurrency,
            "batch started"
        );

        let mut tasks = Vec::with_capacity(files.len());
        for (index, file) in files.into_iter().enumerate() {
            match self.prepare(FileId(index), file, raw) {
                Ok(task) => {
                    job.mark_pending(task.id);
                    tasks.push(task);
                }
                Err(entry) => finish(&mut job, entry, &mut on_event),
            }
        }

        let dispatcher = &self.dispatcher;
        let mut in_flight = Box::pin(
            stream::iter(tasks)
                .map(|task| {
                    debug!(id = task.id.0, file = %task.file_name, "dispatching");
                    dispatcher.dispatch(task)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .fuse(),
        );
        let mut abort = abort.receiver;
        let mut aborted = false;

        while job.completed_count() < job.total_count() && !aborted {
            select! {
                outcome = in_flight.select_next_some() => {
                    let entry = BatchEntry {
                        id: outcome.id,
                        file_name: outcome.file_name,
                        outcome: outcome.result,
                    };
                    finish(&mut job, entry, &mut on_event);
                }
                signal = abort => aborted = signal.is_ok(),
                complete => break,
            }
        }

        if aborted {
            drop(in_flight);
            warn!(
                completed = job.completed_count(),
                total = job.total_count(),
                "batch aborted"
            );
            job.abort();
            on_event(BatchEvent::Aborted);
            return Ok(job);
        }

        job.complete();
        info!(
            total = job.total_count(),
            failed = job.failures().count(),
            "batch completed"
        );
        on_event(BatchEvent::Completed);
        Ok(job)
    }

    /// Probe the header and resolve settings for one file.
    fn prepare(&self, id: FileId, file: InputFile, raw: &RawSettings) -> Result<WorkerTask, BatchEntry> {
        let settings = probe(&file.bytes, &file.mime_type)
            .map_err(CompressError::from)
            .and_then(|info| resolve(raw, &info).map_err(CompressError::from));

        match settings {
            Ok(settings) => Ok(WorkerTask {
                id,
                file_name: file.name,
                mime_type: file.mime_type,
                bytes: file.bytes,
                settings,
                options: self.config.options,
            }),
            Err(err) => Err(BatchEntry {
                id,
                file_name: file.name,
                outcome: Err(FailureRecord::from(&err)),
            }),
        }
    }
}

fn finish<F>(job: &mut BatchJob, entry: BatchEntry, on_event: &mut F)
where
    F: FnMut(BatchEvent<'_>),
{
    match &entry.outcome {
        Ok(result) => debug!(
            id = entry.id.0,
            file = %entry.file_name,
            bytes = result.byte_size(),
            "file finished"
        ),
        Err(failure) => warn!(
            id = entry.id.0,
            file = %entry.file_name,
            kind = ?failure.kind,
            "file failed: {}",
            failure.message
        ),
    }

    let entry = job.record(entry);
    on_event(BatchEvent::FileFinished(entry));
    on_event(BatchEvent::Progress {
        completed: job.completed_count(),
        total: job.total_count(),
    });
}

#[cfg(test)]
mod tests {
    use std::cell::{Ref, RefCell};
    use std::rc::Rc;

    use futures::executor::{block_on, LocalPool};
    use futures::future::{FutureExt, LocalBoxFuture};
    use futures::task::LocalSpawnExt;

    use super::*;
    use crate::batch::{run_task, BatchState, InlineDispatcher, WorkerOutcome};
    use crate::format::ImageFormat;
    use crate::pipeline::ErrorKind;
    use crate::settings::{RawOutputFormat, RawResizeMode};
    use crate::test_support::{encoded, gradient};

    /// Owned copy of a [`BatchEvent`] for assertions.
    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Finished { id: usize, ok: bool },
        Progress(usize, usize),
        Completed,
        Aborted,
    }

    impl From<BatchEvent<'_>> for Seen {
        fn from(event: BatchEvent<'_>) -> Self {
            match event {
                BatchEvent::FileFinished(entry) => Seen::Finished {
                    id: entry.id.0,
                    ok: entry.outcome.is_ok(),
                },
                BatchEvent::Progress { completed, total } => Seen::Progress(completed, total),
                BatchEvent::Completed => Seen::Completed,
                BatchEvent::Aborted => Seen::Aborted,
            }
        }
    }

    /// Dispatcher whose tasks only finish when the test releases them.
    #[derive(Clone, Default)]
    struct GatedDispatcher {
        waiting: Rc<RefCell<Vec<(WorkerTask, oneshot::Sender<WorkerOutcome>)>>>,
    }

    impl GatedDispatcher {
        fn dispatched(&self) -> Vec<usize> {
            self.waiting.borrow().iter().map(|(task, _)| task.id.0).collect()
        }

        /// Run the task for `id` and deliver its outcome. Returns false if the
        /// orchestrator is no longer listening.
        fn release(&self, id: usize) -> bool {
            let mut waiting = self.waiting.borrow_mut();
            let index = waiting
                .iter()
                .position(|(task, _)| task.id.0 == id)
                .expect("task was dispatched");
            let (task, sender) = waiting.remove(index);
            sender.send(run_task(task)).is_ok()
        }

        fn all_cancelled(&self) -> bool {
            self.waiting.borrow().iter().all(|(_, sender)| sender.is_canceled())
        }
    }

    impl Dispatcher for GatedDispatcher {
        type Future = LocalBoxFuture<'static, WorkerOutcome>;

        fn dispatch(&self, task: WorkerTask) -> Self::Future {
            let (sender, receiver) = oneshot::channel();
            let id = task.id;
            let file_name = task.file_name.clone();
            self.waiting.borrow_mut().push((task, sender));

            async move {
                receiver.await.unwrap_or_else(|_| {
                    WorkerOutcome::failed(id, file_name, FailureRecord::new(ErrorKind::Worker, "dropped"))
                })
            }
            .boxed_local()
        }
    }

    struct Running {
        events: Rc<RefCell<Vec<Seen>>>,
        job: Rc<RefCell<Option<Result<BatchJob, ValidationError>>>>,
    }

    impl Running {
        /// The finished job; panics if the batch is still running or was rejected.
        fn job(&self) -> Ref<'_, BatchJob> {
            Ref::map(self.job.borrow(), |slot| match slot {
                Some(Ok(job)) => job,
                other => panic!("batch not finished: {other:?}"),
            })
        }
    }

    fn spawn_batch(
        pool: &LocalPool,
        dispatcher: GatedDispatcher,
        max_concurrency: usize,
        files: Vec<InputFile>,
        abort: AbortSignal,
    ) -> Running {
        let events = Rc::new(RefCell::new(Vec::new()));
        let job = Rc::new(RefCell::new(None));
        let orchestrator = BatchOrchestrator::new(
            dispatcher,
            BatchConfig {
                max_concurrency,
                ..Default::default()
            },
        );

        let (sink, slot) = (events.clone(), job.clone());
        pool.spawner()
            .spawn_local(async move {
                let finished = orchestrator
                    .compress(files, &RawSettings::default(), abort, |event| {
                        sink.borrow_mut().push(Seen::from(event))
                    })
                    .await;
                *slot.borrow_mut() = Some(finished);
            })
            .unwrap();

        Running { events, job }
    }

    fn png(name: &str, width: u32, height: u32) -> InputFile {
        InputFile::new(name, "image/png", encoded(&gradient(width, height), ImageFormat::Png))
    }

    fn pngs(count: usize) -> Vec<InputFile> {
        (0..count).map(|i| png(&format!("img{i}.png"), 6, 4)).collect()
    }

    fn run_inline(files: Vec<InputFile>, raw: &RawSettings) -> (BatchJob, Vec<Seen>) {
        let orchestrator = BatchOrchestrator::new(InlineDispatcher, BatchConfig::default());
        let mut events = Vec::new();
        let job = block_on(orchestrator.compress(files, raw, AbortSignal::never(), |event| {
            events.push(Seen::from(event))
        }))
        .unwrap();
        (job, events)
    }

    #[test]
    fn test_partial_failure_completes() {
        let files = vec![
            png("a.png", 20, 10),
            InputFile::new("b.png", "image/png", vec![0x00, 0x11, 0x22, 0x33]),
            png("c.png", 10, 20),
        ];

        let (job, events) = run_inline(files, &RawSettings::default());

        assert_eq!(job.state(), BatchState::Completed);
        assert!(job.is_complete());
        assert_eq!(job.completed_count(), 3);
        assert_eq!(job.successes().count(), 2);

        let failures: Vec<_> = job.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.file_name, "b.png");
        assert_eq!(failures[0].1.kind, ErrorKind::Decode);

        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Seen::Progress(done, total) => Some((*done, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(events.last(), Some(&Seen::Completed));
        assert_eq!(job.export_all().len(), 2);
    }

    #[test]
    fn test_body_corruption_fails_in_worker() {
        // Header is intact, so the file is dispatched and fails while decoding
        let mut bytes = encoded(&gradient(64, 64), ImageFormat::Png);
        bytes.truncate(bytes.len() / 2);
        let files = vec![png("ok.png", 8, 8), InputFile::new("cut.png", "image/png", bytes)];

        let (job, _) = run_inline(files, &RawSettings::default());

        assert!(job.is_complete());
        let failures: Vec<_> = job.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.id, FileId(1));
        assert_eq!(failures[0].1.kind, ErrorKind::Decode);
    }

    #[test]
    fn test_pre_dispatch_failures_are_per_file() {
        let files = vec![
            InputFile::new("anim.gif", "image/gif", vec![b'G', b'I', b'F']),
            png("fine.png", 8, 8),
        ];
        let (job, _) = run_inline(files, &RawSettings::default());
        assert_eq!(job.failures().next().map(|(_, f)| f.kind), Some(ErrorKind::UnsupportedFormat));
        assert_eq!(job.successes().count(), 1);

        // 5000% fits the small file but not the wide one
        let scale_up = RawSettings {
            resize_enabled: true,
            resize_mode: RawResizeMode::Percentage,
            percentage: Some(5000.0),
            ..Default::default()
        };
        let (job, _) = run_inline(vec![png("small.png", 4, 2), png("wide.png", 700, 10)], &scale_up);
        assert!(job.is_complete());
        assert_eq!(job.successes().count(), 1);
        let failures: Vec<_> = job.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.file_name, "wide.png");
        assert_eq!(failures[0].1.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_invalid_settings_reject_the_batch() {
        let orchestrator = BatchOrchestrator::new(InlineDispatcher, BatchConfig::default());

        for raw in [
            RawSettings {
                quality: 150.0,
                ..Default::default()
            },
            RawSettings {
                resize_enabled: true,
                resize_mode: RawResizeMode::Percentage,
                percentage: None,
                ..Default::default()
            },
        ] {
            let mut events = Vec::new();
            let result = block_on(orchestrator.compress(pngs(3), &raw, AbortSignal::never(), |event| {
                events.push(Seen::from(event))
            }));

            assert_eq!(result.map(|job| job.total_count()), Err(validate(&raw).unwrap_err()));
            assert!(events.is_empty());
        }
    }

    #[test]
    fn test_percentage_uses_each_files_dimensions() {
        let raw = RawSettings {
            resize_enabled: true,
            resize_mode: RawResizeMode::Percentage,
            percentage: Some(50.0),
            output_format: RawOutputFormat::Webp,
            ..Default::default()
        };
        let files = vec![png("wide.png", 40, 10), png("tall.png", 10, 40)];

        let (job, _) = run_inline(files, &raw);

        let dims: Vec<_> = job
            .sorted_by_input()
            .iter()
            .map(|e| {
                let result = e.outcome.as_ref().unwrap();
                (result.width, result.height, result.output_format)
            })
            .collect();
        assert_eq!(
            dims,
            vec![(20, 5, ImageFormat::Webp), (5, 20, ImageFormat::Webp)]
        );
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let (job, events) = run_inline(Vec::new(), &RawSettings::default());
        assert_eq!(job.state(), BatchState::Completed);
        assert_eq!(job.total_count(), 0);
        assert_eq!(events, vec![Seen::Completed]);
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut pool = LocalPool::new();
        let gate = GatedDispatcher::default();
        let run = spawn_batch(&pool, gate.clone(), 4, pngs(3), AbortSignal::never());

        pool.run_until_stalled();
        assert_eq!(gate.dispatched(), vec![0, 1, 2]);

        for id in [2, 0, 1] {
            assert!(gate.release(id));
            pool.run_until_stalled();
        }

        let events = run.events.borrow();
        let finished: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Seen::Finished { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![2, 0, 1]);

        let job = run.job();
        assert!(job.is_complete());
        let arrival: Vec<_> = job.results().iter().map(|e| e.id.0).collect();
        assert_eq!(arrival, vec![2, 0, 1]);
        let input: Vec<_> = job.sorted_by_input().iter().map(|e| e.id.0).collect();
        assert_eq!(input, vec![0, 1, 2]);
    }

    #[test]
    fn test_concurrency_ceiling_queues_the_rest() {
        let mut pool = LocalPool::new();
        let gate = GatedDispatcher::default();
        let run = spawn_batch(&pool, gate.clone(), 2, pngs(5), AbortSignal::never());

        pool.run_until_stalled();
        assert_eq!(gate.dispatched(), vec![0, 1]);

        assert!(gate.release(1));
        pool.run_until_stalled();
        assert_eq!(gate.dispatched(), vec![0, 2]);

        for id in [0, 2, 3, 4] {
            assert!(gate.release(id));
            pool.run_until_stalled();
            assert!(gate.dispatched().len() <= 2);
        }

        let job = run.job();
        assert!(job.is_complete());
        assert_eq!(job.completed_count(), 5);
        assert!(job.pending().is_empty());
    }

    #[test]
    fn test_abort_stops_events_and_discards_results() {
        let mut pool = LocalPool::new();
        let gate = GatedDispatcher::default();
        let (handle, signal) = abort_pair();
        let run = spawn_batch(&pool, gate.clone(), 10, pngs(10), signal);

        pool.run_until_stalled();
        assert_eq!(gate.dispatched().len(), 10);

        for id in 0..4 {
            assert!(gate.release(id));
        }
        pool.run_until_stalled();

        handle.abort();
        pool.run_until_stalled();

        let seen_at_abort = run.events.borrow().len();
        assert_eq!(run.events.borrow().last(), Some(&Seen::Aborted));

        // In-flight work was dropped: nobody is listening any more
        assert!(gate.all_cancelled());
        assert!(!gate.release(7));
        pool.run_until_stalled();
        assert_eq!(run.events.borrow().len(), seen_at_abort);

        let job = run.job();
        assert_eq!(job.state(), BatchState::Aborted);
        assert_eq!(job.completed_count(), 4);
        assert!(job.results().is_empty());
        assert!(job.export_all().is_empty());

        let progress = run
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Seen::Progress(..)))
            .count();
        assert_eq!(progress, 4);
    }

    #[test]
    fn test_abort_handle_reports_finished_batch() {
        let mut pool = LocalPool::new();
        let gate = GatedDispatcher::default();
        let (handle, signal) = abort_pair();
        let run = spawn_batch(&pool, gate.clone(), 4, pngs(2), signal);

        pool.run_until_stalled();
        assert!(!handle.is_finished());

        assert!(gate.release(0));
        pool.run_until_stalled();
        assert!(!handle.is_finished());

        assert!(gate.release(1));
        pool.run_until_stalled();
        assert!(handle.is_finished());
        assert_eq!(run.events.borrow().last(), Some(&Seen::Completed));

        // Too late to matter
        handle.abort();
        pool.run_until_stalled();
        assert_eq!(run.job().state(), BatchState::Completed);
    }

    #[test]
    fn test_abort_handle_finished_after_rejection() {
        let orchestrator = BatchOrchestrator::new(InlineDispatcher, BatchConfig::default());
        let (handle, signal) = abort_pair();
        let raw = RawSettings {
            quality: -3.0,
            ..Default::default()
        };

        let result = block_on(orchestrator.compress(pngs(1), &raw, signal, |_| {}));
        assert!(result.is_err());
        assert!(handle.is_finished());
    }

    #[test]
    fn test_dropped_abort_handle_does_not_abort() {
        let mut pool = LocalPool::new();
        let gate = GatedDispatcher::default();
        let (handle, signal) = abort_pair();
        let run = spawn_batch(&pool, gate.clone(), 4, pngs(2), signal);

        drop(handle);
        pool.run_until_stalled();
        assert!(gate.release(0));
        assert!(gate.release(1));
        pool.run_until_stalled();

        assert_eq!(run.events.borrow().last(), Some(&Seen::Completed));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_dispatcher_batch() {
        use crate::batch::BlockingDispatcher;

        let orchestrator = BatchOrchestrator::new(
            BlockingDispatcher::try_current().unwrap(),
            BatchConfig {
                max_concurrency: 2,
                ..Default::default()
            },
        );
        let mut files = pngs(5);
        files.push(InputFile::new("broken.webp", "image/webp", vec![1, 2, 3]));

        let mut progress = Vec::new();
        let job = orchestrator
            .compress(files, &RawSettings::default(), AbortSignal::never(), |event| {
                if let BatchEvent::Progress { completed, .. } = event {
                    progress.push(completed);
                }
            })
            .await
            .unwrap();

        assert!(job.is_complete());
        assert_eq!(job.completed_count(), 6);
        assert_eq!(job.successes().count(), 5);
        assert_eq!(progress, vec![1, 2, 3, 4, 5, 6]);
    }
}

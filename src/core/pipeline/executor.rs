//! Concurrent hashing of changed candidates.
//!
//! The caller thread filters candidates through the state store and feeds
//! the changed ones into a bounded channel. A fixed pool of scoped worker
//! threads competes for them; each worker owns its row and failure buffers,
//! which are merged after all workers have joined. State is only recorded
//! for rows that survive the merge.

use crate::core::enumerator::Candidate;
use crate::core::hasher::PermutationHasher;
use crate::core::index::HashRow;
use crate::core::state::StateStore;
use crate::core::store::ObjectStore;
use crate::error::StoreError;
use crate::events::{Event, EventSender, FailureStage, HashEvent, HashProgress, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default cap on the bytes read for one object (64 MiB)
pub const DEFAULT_MAX_OBJECT_BYTES: u64 = 64 * 1024 * 1024;

/// Shared flag that stops a run early
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One object that was skipped because it could not be hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Counters of one hashing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSummary {
    /// Candidates handed to workers
    pub submitted: usize,
    pub processed: usize,
    pub skipped_unchanged: usize,
    pub failed: usize,
    /// Submitted candidates dropped by a timeout or cancellation
    pub not_attempted: usize,
    /// True when hashing stopped before every candidate was seen
    pub incomplete: bool,
    pub duration_ms: u64,
}

/// Everything a hashing pass produced
#[derive(Debug, Default)]
pub struct OrchestratorOutcome {
    pub rows: Vec<HashRow>,
    pub summary: HashSummary,
    pub failures: Vec<ItemFailure>,
}

#[derive(Default)]
struct WorkerOutput {
    /// Finished rows with the fingerprint they were hashed at
    rows: Vec<(HashRow, String)>,
    failures: Vec<ItemFailure>,
    not_attempted: usize,
}

/// Builder for [`HashOrchestrator`]
pub struct HashOrchestratorBuilder<'a> {
    store: &'a dyn ObjectStore,
    hasher: &'a PermutationHasher,
    state: &'a StateStore,
    workers: usize,
    queue_capacity: Option<usize>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    max_object_bytes: u64,
}

impl<'a> HashOrchestratorBuilder<'a> {
    /// Number of worker threads (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bounded queue size between the feeder and the workers.
    ///
    /// Defaults to twice the worker count.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Stop submitting work once `timeout` has elapsed
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Objects larger than this are failed at fetch without being read
    pub fn max_object_bytes(mut self, limit: u64) -> Self {
        self.max_object_bytes = limit;
        self
    }

    pub fn build(self) -> HashOrchestrator<'a> {
        let workers = self.workers.max(1);
        HashOrchestrator {
            store: self.store,
            hasher: self.hasher,
            state: self.state,
            workers,
            queue_capacity: self.queue_capacity.unwrap_or(workers * 2).max(1),
            timeout: self.timeout,
            cancel: self.cancel,
            max_object_bytes: self.max_object_bytes,
        }
    }
}

/// Hashes changed candidates on a fixed-size worker pool
pub struct HashOrchestrator<'a> {
    store: &'a dyn ObjectStore,
    hasher: &'a PermutationHasher,
    state: &'a StateStore,
    workers: usize,
    queue_capacity: usize,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    max_object_bytes: u64,
}

impl<'a> HashOrchestrator<'a> {
    pub fn builder(
        store: &'a dyn ObjectStore,
        hasher: &'a PermutationHasher,
        state: &'a StateStore,
    ) -> HashOrchestratorBuilder<'a> {
        HashOrchestratorBuilder {
            store,
            hasher,
            state,
            workers: 16,
            queue_capacity: None,
            timeout: None,
            cancel: CancellationToken::new(),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }

    /// Hash every candidate whose fingerprint changed.
    ///
    /// Per-object failures are collected, never returned as errors. Rows of
    /// completed objects are kept when the run is interrupted.
    pub fn run(
        &self,
        candidates: impl Iterator<Item = Candidate>,
        events: &EventSender,
    ) -> OrchestratorOutcome {
        let start = Instant::now();
        let deadline = self.timeout.map(|t| start + t);

        let submitted = AtomicUsize::new(0);
        let skipped_unchanged = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let mut feeder_interrupted = false;
        let mut worker_panicked = false;

        tracing::info!("Hashing with {} workers", self.workers);
        events.send(Event::Hash(HashEvent::Started {
            workers: self.workers,
        }));

        let (work_tx, work_rx) = crossbeam_channel::bounded::<Candidate>(self.queue_capacity);

        let outputs: Vec<WorkerOutput> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let rx = work_rx.clone();
                    let events = events.clone();
                    let (submitted, skipped_unchanged, completed) =
                        (&submitted, &skipped_unchanged, &completed);

                    scope.spawn(move || {
                        let mut output = WorkerOutput::default();

                        for candidate in rx.iter() {
                            if self.should_stop(deadline) {
                                output.not_attempted += 1;
                                continue;
                            }

                            match self.process_isolated(&candidate) {
                                Ok(row) => output.rows.push((row, candidate.fingerprint.clone())),
                                Err(failure) => {
                                    tracing::warn!(
                                        "Skipping {} ({}): {}",
                                        failure.key,
                                        failure.stage,
                                        failure.message
                                    );
                                    events.send(Event::Hash(HashEvent::Skipped {
                                        key: failure.key.clone(),
                                        stage: failure.stage,
                                        message: failure.message.clone(),
                                    }));
                                    output.failures.push(failure);
                                }
                            }

                            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                            events.send(Event::Hash(HashEvent::Progress(HashProgress {
                                completed: done,
                                submitted: submitted.load(Ordering::SeqCst),
                                skipped_unchanged: skipped_unchanged.load(Ordering::SeqCst),
                                current_key: candidate.key,
                            })));
                        }

                        output
                    })
                })
                .collect();

            // Workers hold the only receivers now
            drop(work_rx);

            for candidate in candidates {
                if self.should_stop(deadline) {
                    feeder_interrupted = true;
                    break;
                }

                if !self.state.needs_processing(&candidate.key, &candidate.fingerprint) {
                    skipped_unchanged.fetch_add(1, Ordering::SeqCst);
                    continue;
                }

                submitted.fetch_add(1, Ordering::SeqCst);
                if work_tx.send(candidate).is_err() {
                    break;
                }
            }

            // Workers drain what is queued, then exit
            drop(work_tx);

            handles
                .into_iter()
                .filter_map(|handle| match handle.join() {
                    Ok(output) => Some(output),
                    Err(_) => {
                        tracing::error!("A hash worker panicked; its results are lost");
                        worker_panicked = true;
                        None
                    }
                })
                .collect()
        });

        let mut outcome = OrchestratorOutcome::default();
        for output in outputs {
            for (row, fingerprint) in output.rows {
                self.state.record_processed(&row.image_name, &fingerprint);
                outcome.rows.push(row);
            }
            outcome.failures.extend(output.failures);
            outcome.summary.not_attempted += output.not_attempted;
        }

        // Worker completion order is arbitrary
        outcome.rows.sort_by(|a, b| a.image_name.cmp(&b.image_name));
        outcome.failures.sort_by(|a, b| a.key.cmp(&b.key));

        let summary = &mut outcome.summary;
        summary.submitted = submitted.load(Ordering::SeqCst);
        summary.processed = outcome.rows.len();
        summary.failed = outcome.failures.len();
        summary.skipped_unchanged = skipped_unchanged.load(Ordering::SeqCst);
        summary.incomplete = feeder_interrupted || summary.not_attempted > 0 || worker_panicked;
        summary.duration_ms = start.elapsed().as_millis() as u64;

        if summary.incomplete {
            tracing::warn!(
                "Hashing stopped early: {} submitted objects not attempted",
                summary.not_attempted
            );
            events.send(Event::Pipeline(PipelineEvent::Interrupted));
        }

        tracing::info!(
            "Hashed {} objects ({} unchanged, {} failed) in {}ms",
            summary.processed,
            summary.skipped_unchanged,
            summary.failed,
            summary.duration_ms
        );
        events.send(Event::Hash(HashEvent::Completed {
            processed: summary.processed,
            failed: summary.failed,
            skipped_unchanged: summary.skipped_unchanged,
        }));

        outcome
    }

    fn should_stop(&self, deadline: Option<Instant>) -> bool {
        self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// [`Self::process`] with a panic turned into a failure of that object
    fn process_isolated(&self, candidate: &Candidate) -> Result<HashRow, ItemFailure> {
        catch_unwind(AssertUnwindSafe(|| self.process(candidate))).unwrap_or_else(|panic_info| {
            let panic_msg = panic_info
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(key = %candidate.key, panic_message = %panic_msg, "Hashing panicked");
            Err(ItemFailure {
                key: candidate.key.clone(),
                stage: FailureStage::Panic,
                message: panic_msg,
            })
        })
    }

    fn process(&self, candidate: &Candidate) -> Result<HashRow, ItemFailure> {
        let bytes = self.fetch(candidate).map_err(|e| ItemFailure {
            key: candidate.key.clone(),
            stage: FailureStage::Fetch,
            message: e.to_string(),
        })?;

        let hashes = self
            .hasher
            .hash_bytes(&candidate.key, &bytes)
            .map_err(|e| ItemFailure {
                key: candidate.key.clone(),
                stage: FailureStage::Decode,
                message: e.to_string(),
            })?;

        Ok(HashRow {
            image_name: candidate.key.clone(),
            job_number: candidate.job.job_number.clone(),
            job_url: candidate.job.job_url.clone(),
            hashes,
        })
    }

    /// Read the whole object, refusing anything over the size limit
    fn fetch(&self, candidate: &Candidate) -> Result<Vec<u8>, StoreError> {
        let too_large = |size: u64| StoreError::TooLarge {
            key: candidate.key.clone(),
            size,
            limit: self.max_object_bytes,
        };

        if candidate.size > self.max_object_bytes {
            return Err(too_large(candidate.size));
        }

        let reader = self.store.open(&candidate.key)?;
        let mut bytes = Vec::with_capacity(candidate.size as usize);
        reader
            .take(self.max_object_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|source| StoreError::Read {
                key: candidate.key.clone(),
                source,
            })?;

        // The listing can be stale; trust what was actually read
        if bytes.len() as u64 > self.max_object_bytes {
            return Err(too_large(bytes.len() as u64));
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enumerator::Job;
    use crate::core::hasher::HasherConfig;
    use crate::core::store::InMemoryStore;
    use crate::events::EventChannel;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes(seed: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(40, 30, |x, y| {
            Rgb([((x * seed) % 256) as u8, ((y * 7 + seed) % 256) as u8, 90])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn candidate(key: &str, fingerprint: &str, size: u64) -> Candidate {
        Candidate {
            key: key.to_string(),
            fingerprint: fingerprint.to_string(),
            size,
            job: Arc::new(Job {
                prefix: "jobs/1/".to_string(),
                job_number: "1".to_string(),
                job_url: "https://example.com/1".to_string(),
            }),
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: InMemoryStore,
        state: StateStore,
        hasher: PermutationHasher,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let state = StateStore::open(&dir.path().join("seen.json")).unwrap();
        Fixture {
            _dir: dir,
            store: InMemoryStore::new(),
            state,
            hasher: HasherConfig::new().resize(32, 32).build().unwrap(),
        }
    }

    fn candidates_for(store: &InMemoryStore, count: u32) -> Vec<Candidate> {
        (0..count)
            .map(|i| {
                let key = format!("jobs/1/{:03}.png", i);
                let bytes = png_bytes(i + 1);
                let size = bytes.len() as u64;
                store.put(&key, bytes, &format!("e{}", i));
                candidate(&key, &format!("e{}", i), size)
            })
            .collect()
    }

    #[test]
    fn hashes_every_changed_candidate() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 10);

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .workers(4)
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert_eq!(outcome.summary.processed, 10);
        assert_eq!(outcome.summary.submitted, 10);
        assert!(!outcome.summary.incomplete);
        assert_eq!(f.state.len(), 10);
        assert_eq!(outcome.rows[0].job_url, "https://example.com/1");
        assert_eq!(outcome.rows[0].hashes.len(), 3);
    }

    #[test]
    fn unchanged_candidates_are_never_fetched() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 3);
        f.state.record_processed("jobs/1/000.png", "e0");
        f.store.fail_reads_of("jobs/1/000.png");

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .workers(2)
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert_eq!(outcome.summary.skipped_unchanged, 1);
        assert_eq!(outcome.summary.processed, 2);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn one_bad_object_does_not_stop_the_rest() {
        let f = fixture();
        let mut candidates = candidates_for(&f.store, 5);
        f.store.put("jobs/1/corrupt.jpg", b"garbage".to_vec(), "x");
        candidates.push(candidate("jobs/1/corrupt.jpg", "x", 7));
        f.store.fail_reads_of("jobs/1/001.png");

        let (sender, receiver) = EventChannel::new();
        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .workers(3)
            .build()
            .run(candidates.into_iter(), &sender);
        drop(sender);

        assert_eq!(outcome.summary.processed, 4);
        assert_eq!(outcome.summary.failed, 2);

        let stages: Vec<_> = outcome.failures.iter().map(|f| (f.key.as_str(), f.stage)).collect();
        assert_eq!(
            stages,
            vec![
                ("jobs/1/001.png", FailureStage::Fetch),
                ("jobs/1/corrupt.jpg", FailureStage::Decode),
            ]
        );

        // Failed objects stay unrecorded so the next run retries them
        assert!(f.state.needs_processing("jobs/1/corrupt.jpg", "x"));

        let skipped = receiver
            .iter()
            .filter(|e| matches!(e, Event::Hash(HashEvent::Skipped { .. })))
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn oversized_object_fails_at_fetch() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 1);

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .max_object_bytes(16)
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.failures[0].stage, FailureStage::Fetch);
        assert!(outcome.failures[0].message.contains("limit"));
    }

    #[test]
    fn cancelled_run_attempts_nothing() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 5);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .cancellation(token)
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert!(outcome.summary.incomplete);
        assert_eq!(outcome.summary.processed, 0);
        assert!(f.state.is_empty());
    }

    #[test]
    fn zero_timeout_keeps_state_untouched() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 5);

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .timeout(Some(Duration::ZERO))
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert!(outcome.summary.incomplete);
        assert!(outcome.rows.is_empty());
        assert!(f.state.is_empty());
    }

    #[test]
    fn zero_workers_still_makes_progress() {
        let f = fixture();
        let candidates = candidates_for(&f.store, 2);

        let outcome = HashOrchestrator::builder(&f.store, &f.hasher, &f.state)
            .workers(0)
            .queue_capacity(0)
            .build()
            .run(candidates.into_iter(), &crate::events::null_sender());

        assert_eq!(outcome.summary.processed, 2);
    }
}

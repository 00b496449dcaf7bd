//! End-to-end indexing run.

use super::executor::{CancellationToken, HashOrchestrator, ItemFailure};
use crate::config::IndexerConfig;
use crate::core::enumerator::{EnumerateConfig, JobEnumerator};
use crate::core::hasher::HasherConfig;
use crate::core::index::{HashIndex, IndexSchema};
use crate::core::state::StateStore;
use crate::core::store::ObjectStore;
use crate::error::IndexerError;
use crate::events::{
    Event, EventSender, IndexEvent, PipelineEvent, PipelinePhase, PipelineSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// What one run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub jobs_discovered: usize,
    pub jobs_failed: usize,
    pub candidates_found: usize,
    pub processed: usize,
    pub skipped_unchanged: usize,
    pub failed: usize,
    pub not_attempted: usize,
    /// Hashing stopped early; the next run picks up the rest
    pub incomplete: bool,
    pub rows_in_index: usize,
    /// False when nothing changed and the existing files were left alone
    pub index_written: bool,
    pub output_path: PathBuf,
    pub failures: Vec<ItemFailure>,
    pub duration_ms: u64,
}

/// One incremental indexing run over a store
pub struct IndexRun<'a> {
    config: &'a IndexerConfig,
    store: &'a dyn ObjectStore,
    cancel: CancellationToken,
}

impl<'a> IndexRun<'a> {
    pub fn new(config: &'a IndexerConfig, store: &'a dyn ObjectStore) -> Self {
        Self {
            config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop hashing when `token` is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run every phase.
    ///
    /// Per-object failures end up in the report. Errors are returned only
    /// for failures that leave nothing useful to persist: config, root
    /// listing, index or state I/O. The state snapshot is written only after
    /// the index write succeeded.
    pub fn execute(&self, events: &EventSender) -> Result<RunReport, IndexerError> {
        let result = self.execute_phases(events);
        if let Err(e) = &result {
            tracing::error!("Run failed: {}", e);
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: e.to_string(),
            }));
        }
        result
    }

    fn execute_phases(&self, events: &EventSender) -> Result<RunReport, IndexerError> {
        let config = self.config;
        config.validate()?;

        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!("Starting run {} under '{}'", run_id, config.root_prefix);
        events.send(Event::Pipeline(PipelineEvent::Started {
            run_id: run_id.to_string(),
        }));

        // Phase 1: load index and state
        phase(events, PipelinePhase::Loading);

        let output_path = config.resolved_output_path();
        let mut index = HashIndex::load(
            &output_path,
            config.output_format,
            IndexSchema::for_mode(config.hash_mode),
        )?;
        events.send(Event::Index(IndexEvent::Loaded { rows: index.len() }));

        let state = StateStore::open(&config.state_path)?;
        // A key without a full row (lost, or hashed under another mode) is re-hashed
        let repaired = state.retain_keys(|key| index.is_complete(key));
        if repaired > 0 {
            tracing::warn!(
                "{} state entries had no complete index row and will be re-hashed",
                repaired
            );
        }
        let layout_changed = index.layout_changed();
        if layout_changed {
            tracing::info!(
                "Index {} was written for another mode; it will be rewritten",
                output_path.display()
            );
        }
        tracing::info!(
            "Loaded {} index rows and {} state entries",
            index.len(),
            state.len()
        );

        let hasher = HasherConfig::new()
            .mode(config.hash_mode)
            .resize(config.resize_width, config.resize_height)
            .build()?;

        // Phase 2: enumerate
        phase(events, PipelinePhase::Enumerating);

        let mut enumerate_config = EnumerateConfig::new(&config.root_prefix);
        enumerate_config.max_jobs = config.max_jobs;
        enumerate_config.extensions = Some(config.image_extensions.clone());
        let mut enumeration =
            JobEnumerator::new(self.store, enumerate_config).start_with_events(events)?;

        // Phase 3: hash (enumeration is consumed lazily by the feeder)
        phase(events, PipelinePhase::Hashing);

        let outcome = HashOrchestrator::builder(self.store, &hasher, &state)
            .workers(config.workers)
            .timeout(config.timeout())
            .cancellation(self.cancel.clone())
            .max_object_bytes(config.max_object_bytes)
            .build()
            .run(&mut enumeration, events);
        let stats = enumeration.stats().clone();

        // Phase 4: merge and persist
        phase(events, PipelinePhase::Writing);

        let index_written = if outcome.rows.is_empty() && output_path.exists() && !layout_changed {
            tracing::info!("No new rows; leaving {} untouched", output_path.display());
            events.send(Event::Index(IndexEvent::Unchanged));
            false
        } else {
            let merge = index.merge(outcome.rows);
            tracing::info!(
                "Merged {} new and {} replaced rows",
                merge.inserted,
                merge.replaced
            );

            index.write(&output_path, config.output_format)?;
            events.send(Event::Index(IndexEvent::Written {
                path: output_path.clone(),
                rows: index.len(),
            }));

            state.persist()?;
            events.send(Event::Index(IndexEvent::StatePersisted {
                path: state.snapshot_path().to_path_buf(),
                entries: state.len(),
            }));
            true
        };

        let summary = outcome.summary;
        let report = RunReport {
            run_id,
            started_at,
            jobs_discovered: stats.jobs_discovered,
            jobs_failed: stats.jobs_failed,
            candidates_found: stats.candidates_found,
            processed: summary.processed,
            skipped_unchanged: summary.skipped_unchanged,
            failed: summary.failed,
            not_attempted: summary.not_attempted,
            incomplete: summary.incomplete,
            rows_in_index: index.len(),
            index_written,
            output_path,
            failures: outcome.failures,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Run {} finished: {} processed, {} unchanged, {} failed, {} rows in index",
            run_id,
            report.processed,
            report.skipped_unchanged,
            report.failed,
            report.rows_in_index
        );
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                jobs_discovered: report.jobs_discovered,
                candidates_found: report.candidates_found,
                processed: report.processed,
                skipped_unchanged: report.skipped_unchanged,
                failed: report.failed,
                duration_ms: report.duration_ms,
            },
        }));

        Ok(report)
    }
}

fn phase(events: &EventSender, phase: PipelinePhase) {
    tracing::debug!("Phase: {}", phase);
    events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
}

//! Job-by-job namespace walking.

use super::{filter::ImageKeyFilter, Candidate, Job};
use crate::core::store::{normalize_prefix, ObjectStore};
use crate::error::EnumerateError;
use crate::events::{null_sender, EnumerateEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the per-job object holding the job URL
pub const SENTINEL_NAME: &str = "url.txt";

/// Configuration for the enumerator
#[derive(Debug, Clone)]
pub struct EnumerateConfig {
    /// Root prefix whose children are jobs
    pub root_prefix: String,
    /// Stop after this many jobs (None = all)
    pub max_jobs: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

impl EnumerateConfig {
    /// Enumerate every job under `root_prefix` with default extensions
    pub fn new(root_prefix: &str) -> Self {
        Self {
            root_prefix: root_prefix.to_string(),
            max_jobs: None,
            extensions: None,
        }
    }
}

/// Counters collected while enumerating
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationStats {
    /// Jobs listed under the root (after the job cap)
    pub jobs_discovered: usize,
    /// Jobs whose objects were listed successfully
    pub jobs_enumerated: usize,
    /// Jobs skipped because their listing failed
    pub jobs_failed: usize,
    /// Image candidates yielded so far
    pub candidates_found: usize,
}

/// Walks the store and yields candidates one job at a time
pub struct JobEnumerator<'a> {
    store: &'a dyn ObjectStore,
    config: EnumerateConfig,
    filter: ImageKeyFilter,
}

impl<'a> JobEnumerator<'a> {
    /// Create a new enumerator over `store`
    pub fn new(store: &'a dyn ObjectStore, config: EnumerateConfig) -> Self {
        let mut filter = ImageKeyFilter::new(SENTINEL_NAME);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions);
        }

        Self {
            store,
            config,
            filter,
        }
    }

    /// List the jobs and return a lazy candidate sequence
    pub fn start(self) -> Result<Enumeration<'a>, EnumerateError> {
        self.start_with_events(&null_sender())
    }

    /// List the jobs with event reporting.
    ///
    /// Failing to list the root is fatal. Each job's objects are only
    /// listed when the sequence reaches that job.
    pub fn start_with_events(
        self,
        events: &EventSender,
    ) -> Result<Enumeration<'a>, EnumerateError> {
        let root = normalize_prefix(&self.config.root_prefix);
        info!(root = %root, "Listing job prefixes");
        events.send(Event::Enumerate(EnumerateEvent::Started { root: root.clone() }));

        let mut prefixes = self
            .store
            .list_child_prefixes(&root)
            .map_err(|source| EnumerateError::RootListing {
                prefix: root.clone(),
                source,
            })?;

        if let Some(max_jobs) = self.config.max_jobs {
            if prefixes.len() > max_jobs {
                info!(max_jobs, total = prefixes.len(), "Reached job limit, ignoring remaining jobs");
                prefixes.truncate(max_jobs);
            }
        }

        let stats = EnumerationStats {
            jobs_discovered: prefixes.len(),
            ..Default::default()
        };

        Ok(Enumeration {
            store: self.store,
            filter: self.filter,
            pending_jobs: prefixes.into(),
            current: VecDeque::new(),
            stats,
            events: events.clone(),
            finished: false,
        })
    }
}

/// Lazy, finite sequence of candidates
///
/// Restarting means calling [`JobEnumerator::start`] again; nothing is cached
/// between runs.
pub struct Enumeration<'a> {
    store: &'a dyn ObjectStore,
    filter: ImageKeyFilter,
    pending_jobs: VecDeque<String>,
    current: VecDeque<Candidate>,
    stats: EnumerationStats,
    events: EventSender,
    finished: bool,
}

impl<'a> Enumeration<'a> {
    /// Counters so far; final once the sequence is exhausted
    pub fn stats(&self) -> &EnumerationStats {
        &self.stats
    }

    fn read_job_url(&self, prefix: &str) -> String {
        let sentinel_key = format!("{}{}", prefix, SENTINEL_NAME);
        match self.store.read_small(&sentinel_key) {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => {
                debug!(key = %sentinel_key, "No job url sentinel");
                String::new()
            }
            Err(e) => {
                warn!(key = %sentinel_key, error = %e, "Failed to read job url sentinel, leaving it empty");
                String::new()
            }
        }
    }

    /// List one job into `current`. Returns false when the job was skipped.
    fn load_job(&mut self, prefix: String) -> bool {
        let objects = match self.store.list_objects(&prefix) {
            Ok(objects) => objects,
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Failed to list job, skipping it");
                self.stats.jobs_failed += 1;
                self.events.send(Event::Enumerate(EnumerateEvent::JobFailed {
                    prefix,
                    message: e.to_string(),
                }));
                return false;
            }
        };

        let job = Arc::new(Job {
            job_number: Job::number_from_prefix(&prefix),
            job_url: self.read_job_url(&prefix),
            prefix,
        });

        let before = self.current.len();
        for object in objects {
            if !self.filter.should_include(&object.key) {
                continue;
            }
            self.current.push_back(Candidate {
                key: object.key,
                fingerprint: object.fingerprint,
                size: object.size,
                job: Arc::clone(&job),
            });
        }
        let image_count = self.current.len() - before;

        self.stats.jobs_enumerated += 1;
        debug!(job = %job.job_number, images = image_count, "Listed job");
        self.events.send(Event::Enumerate(EnumerateEvent::JobFound {
            job_number: job.job_number.clone(),
            images: image_count,
        }));
        true
    }
}

impl Iterator for Enumeration<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(candidate) = self.current.pop_front() {
                self.stats.candidates_found += 1;
                return Some(candidate);
            }

            match self.pending_jobs.pop_front() {
                Some(prefix) => {
                    self.load_job(prefix);
                }
                None => {
                    if !self.finished {
                        self.finished = true;
                        info!(
                            jobs = self.stats.jobs_enumerated,
                            failed_jobs = self.stats.jobs_failed,
                            images = self.stats.candidates_found,
                            "Enumeration complete"
                        );
                        self.events.send(Event::Enumerate(EnumerateEvent::Completed {
                            jobs: self.stats.jobs_enumerated,
                            candidates: self.stats.candidates_found,
                        }));
                    }
                    return None;
                }
            }
        }
    }
}

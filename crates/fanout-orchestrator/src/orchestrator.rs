//! Run orchestration - discovers candidates and dispatches one agent per candidate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::Stream;
use tracing::{debug, info, warn};

use fanout_agent_sdk::{AgentService, CandidateRecord, DiscoveryService};
use fanout_core::{Candidate, CandidateId, RunPhase, RunSnapshot};

use crate::config::{render_goal, OrchestratorConfig, RunRequest};
use crate::error::DiscoveryError;
use crate::runner::TaskRunner;
use crate::session::{lock, RunHandle, RunShared};

/// Starts runs and keeps track of the current one.
///
/// Starting a new run cancels the previous run.
pub struct Orchestrator {
    discovery: Arc<dyn DiscoveryService>,
    agent: Arc<dyn AgentService>,
    config: OrchestratorConfig,
    current: Mutex<Option<RunHandle>>,
    /// Starts currently waiting on discovery.
    discovering: AtomicUsize,
}

impl Orchestrator {
    /// Create a new Orchestrator.
    pub fn new(
        discovery: Arc<dyn DiscoveryService>,
        agent: Arc<dyn AgentService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            discovery,
            agent,
            config,
            current: Mutex::new(None),
            discovering: AtomicUsize::new(0),
        }
    }

    /// Discover candidates for `query` and dispatch one agent task per candidate.
    pub async fn start_run(&self, query: &str) -> Result<RunHandle, DiscoveryError> {
        self.start_run_with(RunRequest::new(query)).await
    }

    /// Like [`Orchestrator::start_run`], with per-run overrides.
    ///
    /// Returns once every task has been dispatched; results arrive through
    /// the handle. Fails before any dispatch if discovery errors or yields
    /// no usable candidates.
    pub async fn start_run_with(&self, request: RunRequest) -> Result<RunHandle, DiscoveryError> {
        // Replace whatever was running before
        if let Some(previous) = self.reset() {
            info!(run_id = %previous.run_id(), "Previous run replaced");
        }

        let candidates = {
            let _discovering = DiscoveringGuard::enter(&self.discovering);
            self.discover(&request.query).await?
        };

        let timeout = request.task_timeout.unwrap_or(self.config.task_timeout);
        let template = request
            .goal_template
            .as_deref()
            .unwrap_or(&self.config.goal_template);

        let shared = RunShared::new(request.query.clone(), candidates.clone());
        let handle = RunHandle::new(shared.clone());
        info!(
            run_id = %handle.run_id(),
            query = %request.query,
            candidates = candidates.len(),
            timeout_secs = timeout.as_secs_f64(),
            "Starting run"
        );

        for (index, candidate) in candidates.into_iter().enumerate() {
            let runner = TaskRunner {
                index,
                goal: render_goal(template, &request.query, &candidate),
                candidate,
                timeout,
                stream_end: self.config.stream_end,
                agent: self.agent.clone(),
                shared: shared.clone(),
                cancel: shared.cancel_token(),
            };
            shared.tracker().spawn(runner.run());
        }
        shared.tracker().close();

        // A start that overlapped this one may have installed its run meanwhile
        let displaced = lock(&self.current).replace(handle.clone());
        if let Some(previous) = displaced {
            info!(run_id = %previous.run_id(), "Previous run replaced");
            self.cancel_run(&previous);
        }
        Ok(handle)
    }

    async fn discover(&self, query: &str) -> Result<Vec<Candidate>, DiscoveryError> {
        let records = self.discovery.discover(query).await.map_err(|e| {
            warn!(query = %query, error = %e, "Discovery failed");
            DiscoveryError::Service(e)
        })?;

        let found = records.len();
        let candidates = build_candidates(records, self.config.max_candidates);
        debug!(query = %query, found, usable = candidates.len(), "Discovery complete");

        if candidates.is_empty() {
            warn!(query = %query, "Discovery returned no usable candidates");
            return Err(DiscoveryError::NoCandidates {
                query: query.to_string(),
            });
        }
        Ok(candidates)
    }

    /// Cancel a run. Returns immediately; see [`RunHandle::cancel`].
    pub fn cancel_run(&self, handle: &RunHandle) -> bool {
        let cancelled = handle.cancel();
        if cancelled {
            info!(run_id = %handle.run_id(), "Run cancelled");
        }
        cancelled
    }

    /// Snapshot stream for a run; see [`RunHandle::observe`].
    pub fn observe(&self, handle: &RunHandle) -> impl Stream<Item = RunSnapshot> + Send + 'static {
        handle.observe()
    }

    /// The most recently started run, if any.
    pub fn current_run(&self) -> Option<RunHandle> {
        lock(&self.current).clone()
    }

    /// Phase of the orchestrator as a whole.
    pub fn phase(&self) -> RunPhase {
        if self.discovering.load(Ordering::Acquire) > 0 {
            return RunPhase::Discovering;
        }
        match lock(&self.current).as_ref() {
            Some(handle) => handle.phase(),
            None => RunPhase::Idle,
        }
    }

    /// Cancel and forget the current run, returning it.
    pub fn reset(&self) -> Option<RunHandle> {
        let previous = lock(&self.current).take();
        if let Some(handle) = &previous {
            self.cancel_run(handle);
        }
        previous
    }
}

/// Counts one in-flight discovery for as long as it lives.
struct DiscoveringGuard<'a>(&'a AtomicUsize);

impl<'a> DiscoveringGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for DiscoveringGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Turn discovery records into candidates.
///
/// Records with a blank name or url are dropped, repeated urls keep their
/// first occurrence, and at most `max` candidates are kept.
fn build_candidates(records: Vec<CandidateRecord>, max: usize) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for record in records {
        if candidates.len() >= max {
            debug!(max, "Candidate limit reached");
            break;
        }

        let key = record.url.trim().trim_end_matches('/').to_lowercase();
        if !key.is_empty() && seen.contains(&key) {
            debug!(url = %record.url, "Skipping duplicate candidate");
            continue;
        }

        let id = CandidateId::from_discovery(candidates.len(), &record.name);
        match Candidate::new(id, record.name.as_str(), record.url.as_str()) {
            Ok(candidate) => {
                seen.insert(key);
                candidates.push(candidate);
            }
            Err(e) => warn!(error = %e, "Skipping invalid candidate"),
        }
    }

    candidates
}

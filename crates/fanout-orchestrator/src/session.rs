//! Shared run state and the handle given to callers.
//!
//! Each task slot has its own lock and is written only by its runner.
//! Run completion is decided by an atomic counter of terminal transitions;
//! observers read snapshots from a watch channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use fanout_core::{
    Candidate, RunId, RunPhase, RunSnapshot, RunSummary, TaskEntry, TaskState, TaskUpdate,
    Transition,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TaskSlot {
    candidate: Candidate,
    state: Mutex<TaskState>,
}

/// Result of applying an update to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Applied {
    pub transition: Transition,
    /// This update was the one that finished the run.
    pub finished_run: bool,
}

/// State shared between a run's handle and its task runners.
pub(crate) struct RunShared {
    run_id: RunId,
    query: String,
    slots: Vec<TaskSlot>,
    phase: Mutex<RunPhase>,
    finished: AtomicBool,
    terminal_count: AtomicUsize,
    snapshots: watch::Sender<RunSnapshot>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RunShared {
    /// Create the state for a run whose tasks are about to be dispatched.
    pub fn new(query: impl Into<String>, candidates: Vec<Candidate>) -> Arc<Self> {
        let query = query.into();
        let run_id = RunId::generate();
        let tasks: Vec<TaskEntry> = candidates
            .iter()
            .map(|candidate| TaskEntry {
                candidate: candidate.clone(),
                state: TaskState::new(),
            })
            .collect();

        let initial = RunSnapshot {
            run_id: run_id.clone(),
            query: query.clone(),
            phase: RunPhase::Running,
            tasks,
            terminal_count: 0,
            version: 0,
        };
        let (snapshots, _) = watch::channel(initial);

        Arc::new(Self {
            run_id,
            query,
            slots: candidates
                .into_iter()
                .map(|candidate| TaskSlot {
                    candidate,
                    state: Mutex::new(TaskState::new()),
                })
                .collect(),
            phase: Mutex::new(RunPhase::Running),
            finished: AtomicBool::new(false),
            terminal_count: AtomicUsize::new(0),
            snapshots,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn phase(&self) -> RunPhase {
        *lock(&self.phase)
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_count.load(Ordering::Acquire)
    }

    /// Apply an update to one task and publish the change.
    pub fn apply(&self, index: usize, update: TaskUpdate) -> Applied {
        let Some(slot) = self.slots.get(index) else {
            return Applied {
                transition: Transition::Ignored,
                finished_run: false,
            };
        };

        let transition = lock(&slot.state).apply(update);
        let finished_run = match transition {
            Transition::Ignored => return Applied {
                transition,
                finished_run: false,
            },
            Transition::Updated => false,
            Transition::Terminal => self.record_terminal(),
        };

        self.publish();
        Applied {
            transition,
            finished_run,
        }
    }

    /// Count one terminal transition. Returns true if it completed the run.
    fn record_terminal(&self) -> bool {
        let done = self.terminal_count.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(run_id = %self.run_id, done, total = self.slots.len(), "Task reached terminal state");
        done == self.slots.len() && self.finish("all tasks terminal")
    }

    /// Move the run to Finished. Only the first caller wins.
    fn finish(&self, reason: &str) -> bool {
        if self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *lock(&self.phase) = RunPhase::Finished;
        info!(run_id = %self.run_id, reason, "Run finished");
        true
    }

    /// Finish the run and signal every runner to stop.
    pub fn cancel(&self) -> bool {
        let first = self.finish("cancelled");
        self.cancel.cancel();
        if first {
            self.publish();
        }
        first
    }

    /// Replace the published snapshot with the current state.
    ///
    /// Built inside the watch lock so a newer snapshot is never
    /// overwritten by an older one.
    fn publish(&self) {
        self.snapshots.send_modify(|snapshot| {
            let version = snapshot.version + 1;
            *snapshot = self.build_snapshot(version);
        });
    }

    fn build_snapshot(&self, version: u64) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id.clone(),
            query: self.query.clone(),
            phase: self.phase(),
            tasks: self
                .slots
                .iter()
                .map(|slot| TaskEntry {
                    candidate: slot.candidate.clone(),
                    state: lock(&slot.state).clone(),
                })
                .collect(),
            terminal_count: self.terminal_count(),
            version,
        }
    }
}

/// Handle to a running (or finished) run.
///
/// Cheap to clone; every clone refers to the same run.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl RunHandle {
    pub(crate) fn new(shared: Arc<RunShared>) -> Self {
        Self { shared }
    }

    /// Run identifier.
    pub fn run_id(&self) -> &RunId {
        self.shared.run_id()
    }

    /// The query this run was started with.
    pub fn query(&self) -> &str {
        &self.shared.query
    }

    /// Candidates in discovery order.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.shared.slots.iter().map(|s| s.candidate.clone()).collect()
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.shared.phase()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Summary of the latest snapshot.
    pub fn summary(&self) -> RunSummary {
        self.snapshot().summary()
    }

    /// Stream of snapshots: the current one, then one per published change.
    ///
    /// Bursts may be coalesced, but the latest state is always delivered.
    /// The stream ends after the first settled snapshot.
    pub fn observe(&self) -> impl Stream<Item = RunSnapshot> + Send + 'static {
        let snapshots = WatchStream::new(self.shared.snapshots.subscribe());
        stream::unfold((snapshots, false), |(mut snapshots, done)| async move {
            if done {
                return None;
            }
            let snapshot = snapshots.next().await?;
            let settled = snapshot.is_settled();
            Some((snapshot, (snapshots, settled)))
        })
    }

    /// Cancel every unfinished task and finish the run.
    ///
    /// Returns immediately; runners close their streams on their own.
    /// Returns false if the run had already finished.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Wait until the run is finished and every task is terminal.
    pub async fn wait_finished(&self) -> RunSnapshot {
        let mut rx = self.shared.snapshots.subscribe();
        let settled = match rx.wait_for(RunSnapshot::is_settled).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.snapshot())
    }

    /// Wait until every runner has exited and released its stream.
    pub async fn join(&self) {
        self.shared.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::{CandidateId, Outcome, TaskStatus};

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| {
                Candidate::new(
                    CandidateId::from_discovery(i, &format!("c{}", i)),
                    format!("C{}", i),
                    format!("https://c{}.test", i),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_initial_snapshot() {
        let shared = RunShared::new("q", candidates(3));
        let handle = RunHandle::new(shared);
        let snapshot = handle.snapshot();

        assert_eq!(snapshot.phase, RunPhase::Running);
        assert_eq!(snapshot.tasks.len(), 3);
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.tasks.iter().all(|t| t.state.status == TaskStatus::Idle));
    }

    #[test]
    fn test_terminal_counted_once_per_task() {
        let shared = RunShared::new("q", candidates(2));

        shared.apply(0, TaskUpdate::Dispatched);
        assert!(!shared.apply(0, TaskUpdate::Failed("a".into())).finished_run);
        let again = shared.apply(0, TaskUpdate::Failed("b".into()));
        assert_eq!(again.transition, Transition::Ignored);
        assert_eq!(shared.terminal_count(), 1);
        assert_eq!(shared.phase(), RunPhase::Running);

        shared.apply(1, TaskUpdate::Dispatched);
        let last = shared.apply(1, TaskUpdate::Cancelled);
        assert!(last.finished_run);
        assert_eq!(shared.terminal_count(), 2);
        assert_eq!(shared.phase(), RunPhase::Finished);
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let shared = RunShared::new("q", candidates(1));
        let applied = shared.apply(5, TaskUpdate::Dispatched);
        assert_eq!(applied.transition, Transition::Ignored);
    }

    #[test]
    fn test_ignored_update_does_not_publish() {
        let shared = RunShared::new("q", candidates(1));
        let handle = RunHandle::new(shared.clone());

        shared.apply(0, TaskUpdate::Progress("too early".into()));
        assert_eq!(handle.snapshot().version, 0);

        shared.apply(0, TaskUpdate::Dispatched);
        assert_eq!(handle.snapshot().version, 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let shared = RunShared::new("q", candidates(2));
        let handle = RunHandle::new(shared);

        assert!(handle.cancel());
        assert_eq!(handle.phase(), RunPhase::Finished);
        assert!(handle.is_cancelled());
        assert!(!handle.cancel());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finish_fires_exactly_once_under_contention() {
        for _ in 0..20 {
            let n = 16;
            let shared = RunShared::new("q", candidates(n));
            let mut joins = Vec::new();

            for index in 0..n {
                let shared = shared.clone();
                joins.push(tokio::spawn(async move {
                    let candidate = shared.slots[index].candidate.clone();
                    let mut finished = 0;
                    let updates = vec![
                        TaskUpdate::Dispatched,
                        TaskUpdate::Progress("working".into()),
                        TaskUpdate::Completed(Outcome::fallback(&candidate)),
                        TaskUpdate::Failed("late".into()),
                        TaskUpdate::Cancelled,
                    ];
                    for update in updates {
                        tokio::task::yield_now().await;
                        if shared.apply(index, update).finished_run {
                            finished += 1;
                        }
                    }
                    finished
                }));
            }

            let mut finished = 0;
            for join in joins {
                finished += join.await.unwrap();
            }

            assert_eq!(finished, 1);
            assert_eq!(shared.terminal_count(), n);
            assert_eq!(shared.phase(), RunPhase::Finished);
        }
    }

    #[tokio::test]
    async fn test_observe_ends_when_settled() {
        let shared = RunShared::new("q", candidates(1));
        let handle = RunHandle::new(shared.clone());
        let observer = handle.observe();

        shared.apply(0, TaskUpdate::Dispatched);
        shared.apply(0, TaskUpdate::Failed("x".into()));

        let snapshots: Vec<RunSnapshot> = observer.collect().await;
        let last = snapshots.last().unwrap();
        assert!(last.is_settled());
        assert_eq!(last.terminal_count, 1);
        assert!(snapshots.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[tokio::test]
    async fn test_observe_after_settled_yields_once_and_ends() {
        let shared = RunShared::new("q", candidates(1));
        let handle = RunHandle::new(shared.clone());
        shared.apply(0, TaskUpdate::Dispatched);
        shared.apply(0, TaskUpdate::Failed("x".into()));
        assert!(handle.snapshot().is_settled());

        let collected = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            handle.observe().collect::<Vec<RunSnapshot>>(),
        )
        .await
        .expect("observe should end after the settled snapshot");

        assert_eq!(collected.len(), 1);
        assert!(collected[0].is_settled());
    }

    #[tokio::test]
    async fn test_wait_finished_after_cancel() {
        let shared = RunShared::new("q", candidates(2));
        let handle = RunHandle::new(shared.clone());
        shared.apply(0, TaskUpdate::Dispatched);

        handle.cancel();
        shared.apply(0, TaskUpdate::Cancelled);
        shared.apply(1, TaskUpdate::Cancelled);

        let snapshot = handle.wait_finished().await;
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.summary().counts.cancelled, 2);
    }
}

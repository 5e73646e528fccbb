// src/queue/mod.rs

//! Concurrency-bounded admission scheduler over a set of operations.
//!
//! The queue re-runs admission whenever an operation is submitted, a member
//! (or a dependency living elsewhere) finishes, the queue is resumed, or its
//! capacity is raised. Admission is the only critical section over the
//! membership: it reads member state, picks winners through the pure
//! [`admission`] policy, marks them admitted, releases the lock, and only
//! then starts them on the injected [`Spawner`].
//!
//! A slot stays taken from admission until the operation has finished and
//! its completion callback has returned, so the number of members in
//! `Executing` never exceeds `max_concurrent`. Hand-off operations only
//! occupy a spawner task while they publish `Executing`; the slot, not the
//! thread, is what `max_concurrent` bounds.
//!
//! Every unfinished member holds the queue alive through its finish hook,
//! so dropping the last handle never strands submitted work. The cycle
//! breaks when the member finishes and its hook has run.
//!
//! - [`admission`] is the pure priority/FIFO selection.
//! - [`config`] holds `QueueConfig`.

pub mod admission;
pub mod config;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::errors::{OpQueueError, Result};
use crate::exec::{Spawner, TokioSpawner};
use crate::observe::{ObserverRegistry, Property, PropertyChange, PropertyObserver, SubjectId};
use crate::operation::Operation;
use crate::sync::lock;
use crate::types::{ExecutionStyle, OperationId, QueueId};

pub use admission::Candidate;
pub use config::QueueConfig;

use config::validate_max_concurrent;

#[derive(Debug)]
struct Member {
    op: Operation,
    seq: u64,
    admitted: bool,
}

#[derive(Debug)]
struct QueueState {
    name: Option<String>,
    max_concurrent: usize,
    suspended: bool,
    /// Unfinished members in submission order.
    members: Vec<Member>,
    /// Slots taken by admitted, not yet released members.
    running: usize,
    next_seq: u64,
}

struct QueueShared {
    id: QueueId,
    spawner: Arc<dyn Spawner>,
    state: Mutex<QueueState>,
    /// Number of unfinished members; waiters watch it reach zero.
    pending_tx: watch::Sender<usize>,
    observers: ObserverRegistry,
}

/// Handle to an operation queue. Clones share the same queue.
#[derive(Clone)]
pub struct OperationQueue {
    shared: Arc<QueueShared>,
}

impl OperationQueue {
    /// Queue that starts operations on the current tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self> {
        let spawner = TokioSpawner::current()?;
        Self::with_spawner(config, Arc::new(spawner))
    }

    /// Queue that starts operations on `spawner`.
    pub fn with_spawner(config: QueueConfig, spawner: Arc<dyn Spawner>) -> Result<Self> {
        config.validate()?;

        let (pending_tx, _) = watch::channel(0);
        let queue = Self {
            shared: Arc::new(QueueShared {
                id: QueueId::next(),
                spawner,
                state: Mutex::new(QueueState {
                    name: config.name,
                    max_concurrent: config.max_concurrent,
                    suspended: config.suspended,
                    members: Vec::new(),
                    running: 0,
                    next_seq: 0,
                }),
                pending_tx,
                observers: ObserverRegistry::new(),
            }),
        };

        info!(
            queue = %queue.label(),
            max_concurrent = config.max_concurrent,
            suspended = config.suspended,
            "operation queue created"
        );
        Ok(queue)
    }

    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    pub fn name(&self) -> Option<String> {
        lock(&self.shared.state).name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let mut st = lock(&self.shared.state);
        st.name = Some(name.clone());
        self.shared
            .observers
            .emit(PropertyChange::name(self.subject(), Some(name)));
    }

    /// Name if set, otherwise the id. Used in log fields.
    pub fn label(&self) -> String {
        self.name().unwrap_or_else(|| self.id().to_string())
    }

    pub fn add_observer(&self, observer: &PropertyObserver) {
        self.shared.observers.attach(observer);
    }

    pub fn remove_observer(&self, observer: &PropertyObserver) {
        self.shared.observers.detach(observer);
    }

    /// Submit one operation. Never blocks.
    pub fn submit(&self, op: &Operation) -> Result<()> {
        self.submit_all([op])
    }

    /// Submit a batch. The batch is checked up front: if any operation was
    /// already submitted, has left `Ready`, or appears twice, nothing is
    /// enqueued.
    pub fn submit_all<'a, I>(&self, ops: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Operation>,
    {
        let ops: Vec<Operation> = ops.into_iter().cloned().collect();
        if ops.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for op in &ops {
            if op.is_submitted() || !seen.insert(op.id()) {
                warn!(queue = %self.label(), op = %op.label(), "operation submitted twice");
                return Err(OpQueueError::AlreadySubmitted(op.id()));
            }
            if !op.is_ready() {
                warn!(queue = %self.label(), op = %op.label(), "submitted operation is not ready");
                return Err(OpQueueError::NotReady(op.id()));
            }
        }

        // Claim every operation. Losing a race against another submitter
        // still enqueues what was claimed so nothing is stranded.
        let mut claimed = Vec::with_capacity(ops.len());
        let mut first_err = None;
        for op in ops {
            match op.mark_submitted() {
                Ok(()) => claimed.push(op),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        for op in &claimed {
            let queue = self.clone();
            let id = op.id();
            op.when_finished(Box::new(move || queue.member_finished(id)));
        }

        let outside_deps = self.enqueue(&claimed);

        // Dependencies that are not our members would never trigger our
        // admission on their own.
        for dep in outside_deps {
            let queue = self.clone();
            dep.when_finished(Box::new(move || queue.admit()));
        }

        self.admit();

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Submit a batch and wait until each operation in it has finished.
    pub async fn submit_all_and_wait(&self, ops: &[Operation]) -> Result<()> {
        self.submit_all(ops)?;
        for op in ops {
            op.wait_until_finished().await;
        }
        Ok(())
    }

    /// Cancel every unfinished member. Running bodies are not interrupted;
    /// they see the flag at their next checkpoint.
    pub fn cancel_all(&self) {
        let ops = self.operations();
        info!(queue = %self.label(), count = ops.len(), "cancelling all operations");
        for op in ops {
            op.cancel();
        }
    }

    /// While suspended nothing new is admitted; running operations continue.
    pub fn set_suspended(&self, suspended: bool) {
        {
            let mut st = lock(&self.shared.state);
            if st.suspended == suspended {
                return;
            }
            st.suspended = suspended;
            self.shared.observers.emit(PropertyChange::flag(
                self.subject(),
                Property::Suspended,
                suspended,
            ));
        }

        info!(queue = %self.label(), suspended, "queue suspension changed");
        if !suspended {
            self.admit();
        }
    }

    pub fn is_suspended(&self) -> bool {
        lock(&self.shared.state).suspended
    }

    /// Change the concurrency limit.
    ///
    /// Raising it admits more work immediately. Lowering it never stops
    /// running operations; it only holds back further admissions until the
    /// number of taken slots drops below the new limit.
    pub fn set_max_concurrent(&self, max_concurrent: usize) -> Result<()> {
        validate_max_concurrent(max_concurrent)?;
        {
            let mut st = lock(&self.shared.state);
            if st.max_concurrent == max_concurrent {
                return Ok(());
            }
            st.max_concurrent = max_concurrent;
            self.shared.observers.emit(PropertyChange::count(
                self.subject(),
                Property::MaxConcurrentOperationCount,
                max_concurrent,
            ));
        }

        debug!(queue = %self.label(), max_concurrent, "max_concurrent changed");
        self.admit();
        Ok(())
    }

    pub fn max_concurrent(&self) -> usize {
        lock(&self.shared.state).max_concurrent
    }

    /// Number of members that have not finished.
    pub fn operation_count(&self) -> usize {
        lock(&self.shared.state).members.len()
    }

    /// Number of members currently in `Executing`.
    pub fn executing_count(&self) -> usize {
        lock(&self.shared.state)
            .members
            .iter()
            .filter(|m| m.op.is_executing())
            .count()
    }

    /// Unfinished members in submission order.
    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.shared.state)
            .members
            .iter()
            .map(|m| m.op.clone())
            .collect()
    }

    /// Members waiting on at least one unfinished dependency.
    ///
    /// Operations caught in a dependency cycle stay in this list forever.
    pub fn blocked_operations(&self) -> Vec<Operation> {
        lock(&self.shared.state)
            .members
            .iter()
            .filter(|m| !m.admitted && !m.op.dependencies_finished())
            .map(|m| m.op.clone())
            .collect()
    }

    /// Wait until every member, including ones submitted during the wait,
    /// has finished. Returns `false` if `timeout` elapsed first.
    pub async fn wait_until_all_finished(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.shared.pending_tx.subscribe();
        let all_done = async move { rx.wait_for(|pending| *pending == 0).await.is_ok() };

        match timeout {
            None => all_done.await,
            Some(limit) => tokio::time::timeout(limit, all_done).await.unwrap_or(false),
        }
    }

    fn subject(&self) -> SubjectId {
        SubjectId::Queue(self.id())
    }

    /// Append claimed operations to the membership. Returns the dependencies
    /// of the new members that are not themselves members.
    fn enqueue(&self, claimed: &[Operation]) -> Vec<Operation> {
        if claimed.is_empty() {
            return Vec::new();
        }

        let mut st = lock(&self.shared.state);
        let before = st.members.len();
        for op in claimed {
            // A member must be able to finish after it joined, or the
            // pending count would never drop back.
            if !op.is_ready() {
                warn!(
                    queue = ?st.name,
                    op = %op.label(),
                    state = %op.state(),
                    "claimed operation left Ready; not enqueued"
                );
                continue;
            }
            let seq = st.next_seq;
            st.next_seq += 1;
            debug!(queue = ?st.name, op = %op.label(), seq, "operation submitted");
            st.members.push(Member {
                op: op.clone(),
                seq,
                admitted: false,
            });
        }
        if st.members.len() != before {
            self.publish_count(&st);
        }

        let member_ids: HashSet<OperationId> = st.members.iter().map(|m| m.op.id()).collect();
        let mut outside: Vec<Operation> = Vec::new();
        for op in claimed {
            for dep in op.dependencies() {
                if !member_ids.contains(&dep.id()) && !outside.contains(&dep) {
                    outside.push(dep);
                }
            }
        }
        outside
    }

    /// One admission pass.
    fn admit(&self) {
        let winners: Vec<Operation> = {
            let mut st = lock(&self.shared.state);
            if st.suspended {
                return;
            }
            let free = st.max_concurrent.saturating_sub(st.running);
            if free == 0 {
                return;
            }

            let candidates: Vec<Candidate> = st
                .members
                .iter()
                .filter(|m| !m.admitted && m.op.is_ready() && m.op.dependencies_finished())
                .map(|m| Candidate {
                    seq: m.seq,
                    priority: m.op.priority(),
                })
                .collect();

            let chosen = admission::select(candidates, free);
            let mut winners = Vec::with_capacity(chosen.len());
            for pick in chosen {
                if let Some(member) = st.members.iter_mut().find(|m| m.seq == pick.seq) {
                    member.admitted = true;
                    winners.push(member.op.clone());
                }
            }
            st.running += winners.len();
            winners
        };

        for op in winners {
            debug!(
                queue = %self.label(),
                op = %op.label(),
                priority = %op.priority(),
                cancelled = op.is_cancelled(),
                "admitting operation"
            );
            self.dispatch(op);
        }
    }

    fn dispatch(&self, op: Operation) {
        match op.style() {
            ExecutionStyle::Blocking => self
                .shared
                .spawner
                .spawn_blocking(Box::new(move || start_admitted(&op))),
            ExecutionStyle::HandOff => self.shared.spawner.spawn(
                async move {
                    start_admitted(&op);
                }
                .boxed(),
            ),
        }
    }

    /// Finish hook of a member: release its slot and re-run admission.
    fn member_finished(&self, id: OperationId) {
        {
            let mut st = lock(&self.shared.state);
            if let Some(pos) = st.members.iter().position(|m| m.op.id() == id) {
                let member = st.members.remove(pos);
                if member.admitted {
                    st.running = st.running.saturating_sub(1);
                }
                debug!(
                    queue = ?st.name,
                    op = %member.op.label(),
                    remaining = st.members.len(),
                    "member finished"
                );
                self.publish_count(&st);
            }
        }
        self.admit();
    }

    fn publish_count(&self, st: &QueueState) {
        let count = st.members.len();
        self.shared.pending_tx.send_replace(count);
        self.shared.observers.emit(PropertyChange::count(
            self.subject(),
            Property::OperationCount,
            count,
        ));
    }
}

fn start_admitted(op: &Operation) {
    if let Err(err) = op.start_admitted() {
        error!(op = %op.label(), error = %err, "admitted operation failed to start");
    }
}

impl fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = lock(&self.shared.state);
        f.debug_struct("OperationQueue")
            .field("id", &self.shared.id)
            .field("name", &st.name)
            .field("max_concurrent", &st.max_concurrent)
            .field("suspended", &st.suspended)
            .field("members", &st.members.len())
            .field("running", &st.running)
            .finish_non_exhaustive()
    }
}

// src/operation/mod.rs

//! A single schedulable, cancellable unit of work.
//!
//! An [`Operation`] is a cheap, clonable handle. The queue that runs it and
//! any number of outside callers may hold handles at the same time, so every
//! piece of mutable state sits behind a lock or an atomic:
//!
//! - the lifecycle state (plus the pending work, completion callback and
//!   finish hooks) sits behind one mutex and only changes by compare-and-set,
//!   see [`state`];
//! - the cancellation flag is an atomic that only ever goes `false -> true`;
//! - the dependency set sits behind its own mutex and is sealed once the
//!   operation is submitted or started.
//!
//! State-change notifications are enqueued while the state lock is held, so
//! observers see one operation's changes in transition order. No lock is held
//! while a work body, completion callback or finish hook runs.
//!
//! - [`state`] holds the lifecycle enum and the compare-and-set helper.
//! - [`work`] holds the two execution styles.
//! - [`builder`] offers a fluent constructor.

pub mod builder;
pub mod state;
pub mod work;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::dag::Dependencies;
use crate::errors::{OpQueueError, Result};
use crate::exec::Spawner;
use crate::observe::{ObserverRegistry, Property, PropertyChange, PropertyObserver, SubjectId};
use crate::sync::lock;
use crate::types::{ExecutionStyle, OperationId, QueuePriority};

pub use builder::OperationBuilder;
pub use state::OperationState;
pub use work::{BlockingBody, HandOffBody, OperationContext};

use state::compare_and_set;
use work::Work;

pub(crate) type Completion = Box<dyn FnOnce(&Operation) + Send + 'static>;

/// Internal callback run after an operation finished (used by queues).
pub(crate) type FinishHook = Box<dyn FnOnce() + Send + 'static>;

struct Core {
    state: OperationState,
    work: Option<Work>,
    completion: Option<Completion>,
    finish_hooks: Vec<FinishHook>,
}

struct Shared {
    id: OperationId,
    style: ExecutionStyle,
    name: Mutex<Option<String>>,
    priority: AtomicI8,
    cancelled: AtomicBool,
    submitted: AtomicBool,
    core: Mutex<Core>,
    state_tx: watch::Sender<OperationState>,
    dependencies: Mutex<Dependencies>,
    observers: ObserverRegistry,
}

/// Handle to one unit of work with a `Ready -> Executing -> Finished`
/// lifecycle.
#[derive(Clone)]
pub struct Operation {
    shared: Arc<Shared>,
}

impl Operation {
    /// Operation whose body runs on the thread that starts it.
    pub fn blocking<F>(body: F) -> Self
    where
        F: FnOnce(&OperationContext) + Send + 'static,
    {
        Self::from_parts(Work::blocking(body), None, QueuePriority::default())
    }

    /// Operation whose body is handed to `spawner` when it starts.
    ///
    /// `start()` returns as soon as the body has been handed off.
    pub fn hand_off<F, Fut>(spawner: Arc<dyn Spawner>, body: F) -> Self
    where
        F: FnOnce(OperationContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::from_parts(Work::hand_off(spawner, body), None, QueuePriority::default())
    }

    pub fn builder() -> OperationBuilder {
        OperationBuilder::new()
    }

    pub(crate) fn from_parts(work: Work, name: Option<String>, priority: QueuePriority) -> Self {
        let (state_tx, _) = watch::channel(OperationState::Ready);
        Self {
            shared: Arc::new(Shared {
                id: OperationId::next(),
                style: work.style(),
                name: Mutex::new(name),
                priority: AtomicI8::new(priority.as_i8()),
                cancelled: AtomicBool::new(false),
                submitted: AtomicBool::new(false),
                core: Mutex::new(Core {
                    state: OperationState::Ready,
                    work: Some(work),
                    completion: None,
                    finish_hooks: Vec::new(),
                }),
                state_tx,
                dependencies: Mutex::new(Dependencies::new()),
                observers: ObserverRegistry::new(),
            }),
        }
    }

    pub fn id(&self) -> OperationId {
        self.shared.id
    }

    pub fn name(&self) -> Option<String> {
        lock(&self.shared.name).clone()
    }

    /// Rename the operation. Names are for diagnostics only.
    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let mut slot = lock(&self.shared.name);
        *slot = Some(name.clone());
        self.shared
            .observers
            .emit(PropertyChange::name(self.subject(), Some(name)));
    }

    /// Name if set, otherwise the id. Used in log fields.
    pub fn label(&self) -> String {
        self.name().unwrap_or_else(|| self.id().to_string())
    }

    pub fn priority(&self) -> QueuePriority {
        QueuePriority::from_i8(self.shared.priority.load(Ordering::Acquire))
    }

    /// Change the admission priority. Takes effect at the next admission scan.
    pub fn set_priority(&self, priority: QueuePriority) {
        self.shared.priority.store(priority.as_i8(), Ordering::Release);
    }

    pub fn state(&self) -> OperationState {
        lock(&self.shared.core).state
    }

    /// `state == Ready`.
    ///
    /// This ignores dependencies: a queue checks those separately before it
    /// admits the operation.
    pub fn is_ready(&self) -> bool {
        self.state() == OperationState::Ready
    }

    pub fn is_executing(&self) -> bool {
        self.state() == OperationState::Executing
    }

    pub fn is_finished(&self) -> bool {
        self.state() == OperationState::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Whether `start()` hands the body off instead of running it inline.
    pub fn is_asynchronous(&self) -> bool {
        self.shared.style == ExecutionStyle::HandOff
    }

    pub fn style(&self) -> ExecutionStyle {
        self.shared.style
    }

    /// Whether the operation has been submitted to a queue.
    pub fn is_submitted(&self) -> bool {
        self.shared.submitted.load(Ordering::Acquire)
    }

    /// Request cancellation.
    ///
    /// Idempotent and non-blocking. An operation that has not started yet
    /// finishes without running its body; a running body is expected to
    /// notice through [`OperationContext::is_cancelled`]. Cancelling a
    /// finished operation has no effect.
    pub fn cancel(&self) {
        let core = lock(&self.shared.core);
        if core.state == OperationState::Finished {
            return;
        }
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!(op = %self.label(), state = %core.state, "cancellation requested");
        self.emit_flag(Property::Cancelled, true);
    }

    /// Declare that this operation must wait for `other` to finish.
    ///
    /// Fails once the operation has been submitted or started.
    pub fn add_dependency(&self, other: &Operation) -> Result<()> {
        lock(&self.shared.dependencies)
            .add(self.id(), other)
            .inspect_err(|err| warn!(op = %self.label(), error = %err, "add_dependency rejected"))?;
        Ok(())
    }

    /// Remove a previously declared dependency. Returns whether it was present.
    pub fn remove_dependency(&self, other: &Operation) -> Result<bool> {
        lock(&self.shared.dependencies)
            .remove(self.id(), other)
            .inspect_err(|err| warn!(op = %self.label(), error = %err, "remove_dependency rejected"))
    }

    /// Snapshot of the declared dependencies.
    pub fn dependencies(&self) -> Vec<Operation> {
        lock(&self.shared.dependencies).iter().cloned().collect()
    }

    /// Whether every dependency has finished.
    pub fn dependencies_finished(&self) -> bool {
        lock(&self.shared.dependencies).all_finished()
    }

    /// Dependencies that have not finished yet.
    pub fn unfinished_dependencies(&self) -> Vec<Operation> {
        lock(&self.shared.dependencies).unfinished()
    }

    /// Register the callback run exactly once after the operation finished.
    ///
    /// Replaces a previously registered callback. Fails once the operation
    /// has finished. The callback runs on whichever thread finished the
    /// operation, also when it finished because it was cancelled.
    pub fn set_completion<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Operation) + Send + 'static,
    {
        let mut core = lock(&self.shared.core);
        if core.state == OperationState::Finished {
            warn!(op = %self.label(), "set_completion called after operation finished");
            return Err(OpQueueError::AlreadyFinished(self.id()));
        }
        core.completion = Some(Box::new(callback));
        Ok(())
    }

    pub fn add_observer(&self, observer: &PropertyObserver) {
        self.shared.observers.attach(observer);
    }

    pub fn remove_observer(&self, observer: &PropertyObserver) {
        self.shared.observers.detach(observer);
    }

    /// Start an operation that is not managed by a queue.
    ///
    /// Dependencies are not consulted. A cancelled operation finishes
    /// immediately; otherwise it moves to `Executing` and runs its work
    /// (inline for blocking operations, handed off otherwise).
    pub fn start(&self) -> Result<()> {
        self.start_with(false)
    }

    /// Resolves once the operation has finished.
    pub async fn wait_until_finished(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }

    pub(crate) fn subject(&self) -> SubjectId {
        SubjectId::Operation(self.id())
    }

    /// Claim the operation for a queue and freeze its dependencies.
    ///
    /// The claim is taken under the state lock, the same lock `start()`
    /// checks it under, so an operation is either started by hand or owned
    /// by a queue, never both.
    pub(crate) fn mark_submitted(&self) -> Result<()> {
        {
            let core = lock(&self.shared.core);
            if core.state != OperationState::Ready {
                return Err(OpQueueError::NotReady(self.id()));
            }
            if self.shared.submitted.swap(true, Ordering::AcqRel) {
                return Err(OpQueueError::AlreadySubmitted(self.id()));
            }
        }
        lock(&self.shared.dependencies).seal();
        Ok(())
    }

    /// Run `hook` once the operation has finished, immediately if it already
    /// has. The hook never runs while an operation lock is held.
    pub(crate) fn when_finished(&self, hook: FinishHook) {
        let mut core = lock(&self.shared.core);
        if core.state == OperationState::Finished {
            drop(core);
            hook();
            return;
        }
        core.finish_hooks.push(hook);
    }

    /// Start path for queue admission.
    pub(crate) fn start_admitted(&self) -> Result<()> {
        self.start_with(true)
    }

    fn start_with(&self, admitted: bool) -> Result<()> {
        lock(&self.shared.dependencies).seal();

        let mut core = lock(&self.shared.core);
        if !admitted && self.is_submitted() {
            drop(core);
            warn!(op = %self.label(), "start called on an operation owned by a queue");
            return Err(OpQueueError::AlreadySubmitted(self.id()));
        }

        if self.is_cancelled() {
            self.transition(&mut core, OperationState::Ready, OperationState::Finished)
                .map_err(|_| OpQueueError::NotReady(self.id()))?;
            core.work = None;
            let completion = core.completion.take();
            let hooks = mem::take(&mut core.finish_hooks);
            drop(core);

            debug!(op = %self.label(), "cancelled before start; body skipped");
            self.run_finish_callbacks(completion, hooks);
            return Ok(());
        }

        self.transition(&mut core, OperationState::Ready, OperationState::Executing)
            .map_err(|_| OpQueueError::NotReady(self.id()))?;
        let work = core.work.take();
        drop(core);

        debug!(op = %self.label(), style = ?self.style(), "operation started");

        match work {
            Some(work) => work.run(self.clone()),
            None => {
                error!(op = %self.label(), "operation started without work; finishing");
                self.finish();
            }
        }
        Ok(())
    }

    /// `Executing -> Finished`, then completion callback, then finish hooks.
    ///
    /// Called exactly once by the execution style that ran the body; any
    /// further call is ignored.
    pub(crate) fn finish(&self) {
        let mut core = lock(&self.shared.core);
        if let Err(found) =
            self.transition(&mut core, OperationState::Executing, OperationState::Finished)
        {
            debug!(op = %self.label(), state = %found, "finish ignored; operation not executing");
            return;
        }
        let completion = core.completion.take();
        let hooks = mem::take(&mut core.finish_hooks);
        drop(core);

        debug!(op = %self.label(), cancelled = self.is_cancelled(), "operation finished");
        self.run_finish_callbacks(completion, hooks);
    }

    fn transition(
        &self,
        core: &mut Core,
        from: OperationState,
        to: OperationState,
    ) -> std::result::Result<(), OperationState> {
        compare_and_set(&mut core.state, from, to)?;
        self.emit_flag(from.property(), false);
        self.emit_flag(to.property(), true);
        self.shared.state_tx.send_replace(to);
        Ok(())
    }

    fn run_finish_callbacks(&self, completion: Option<Completion>, hooks: Vec<FinishHook>) {
        if let Some(callback) = completion {
            if catch_unwind(AssertUnwindSafe(|| callback(self))).is_err() {
                error!(op = %self.label(), "completion callback panicked");
            }
        }
        for hook in hooks {
            hook();
        }
    }

    fn emit_flag(&self, property: Property, value: bool) {
        self.shared
            .observers
            .emit(PropertyChange::flag(self.subject(), property, value));
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .field("style", &self.style())
            .finish_non_exhaustive()
    }
}

/// One-line diagnostic summary.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let dependencies: Vec<String> = self.dependencies().iter().map(Operation::label).collect();
        write!(
            f,
            "Operation name: {} cancelled: {} executing: {} finished: {} ready: {} asynchronous: {} dependencies: [{}] priority: {}",
            self.label(),
            self.is_cancelled(),
            state == OperationState::Executing,
            state == OperationState::Finished,
            state == OperationState::Ready,
            self.is_asynchronous(),
            dependencies.join(", "),
            self.priority(),
        )
    }
}

//! FIFO command queue serviced by a dedicated engine thread.
//!
//! Submitting never blocks: a command is appended to the queue and assigned
//! the next timeline value. The engine thread pops commands in submission
//! order, executes them and raises the queue's completion timeline to the
//! command's timeline value once it is done.
//!
//! ```text
//! controller:  submit(a)=1  submit(b)=2  submit(c)=3 ... synchronize()
//!                   \            \            \               |
//! engine:            exec(a) set(1) exec(b) set(2) exec(c) set(3) -> wakes
//! ```
//!
//! Failures never stop the engine. A command that fails (or panics) produces
//! a [`Fault`] which is kept until the next [`CommandQueue::synchronize`].

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use snafu::ResultExt;

use crate::error::{DeferredSnafu, EngineSpawnSnafu, Result};
use crate::registry::DeviceSpec;
use crate::sync::TimelineSignal;

/// Failure raised while executing a command on an engine thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Name of the command that failed.
    pub operation: String,
    /// Timeline value the failing command was submitted at.
    pub timeline: u64,
    pub reason: String,
}

impl Fault {
    pub fn new(operation: impl Into<String>, timeline: u64, reason: impl Into<String>) -> Self {
        Self { operation: operation.into(), timeline, reason: reason.into() }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (timeline {}) failed: {}", self.operation, self.timeline, self.reason)
    }
}

/// Unit of work executed by an engine thread.
pub trait Command: Send + 'static {
    /// Operation name used in logs and faults.
    fn name(&self) -> &str;

    /// Execute the command. `timeline` is the value it was submitted at.
    fn execute(&mut self, timeline: u64) -> std::result::Result<(), Fault>;

    /// Called when `execute` failed or panicked, before the command is dropped.
    fn on_fault(&self, _fault: &Fault) {}
}

/// Observable state of the synchronization barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BarrierState {
    Idle,
    /// At least one caller is blocked in `synchronize`.
    Draining,
}

#[derive(Debug)]
struct QueueState<C> {
    pending: VecDeque<(u64, C)>,
    submitted: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared<C> {
    device: DeviceSpec,
    state: Mutex<QueueState<C>>,
    work_available: Condvar,
    completed: TimelineSignal,
    /// Faults not yet reported by `synchronize`, in timeline order.
    faults: Mutex<Vec<Fault>>,
    drainers: AtomicUsize,
}

impl<C: Command> Shared<C> {
    fn run(&self) {
        tracing::debug!(device = %self.device, "engine started");
        loop {
            let (timeline, mut command) = {
                let mut state = self.state.lock();
                loop {
                    if let Some(next) = state.pending.pop_front() {
                        break next;
                    }
                    if state.closed {
                        tracing::debug!(device = %self.device, "engine stopped");
                        return;
                    }
                    self.work_available.wait(&mut state);
                }
            };

            let name = command.name().to_owned();
            tracing::trace!(device = %self.device, timeline, operation = %name, "executing");

            let outcome = catch_unwind(AssertUnwindSafe(|| command.execute(timeline)))
                .unwrap_or_else(|payload| Err(Fault::new(name.as_str(), timeline, panic_message(payload.as_ref()))));

            if let Err(fault) = outcome {
                tracing::warn!(device = %self.device, %fault, "command failed");
                command.on_fault(&fault);
                self.faults.lock().push(fault);
            }
            drop(command);
            self.completed.set(timeline);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "engine panicked".to_owned()
    }
}

/// Per-device FIFO queue with its engine thread.
///
/// Dropping the queue closes it; the engine finishes every command that was
/// already submitted and is then joined.
#[derive(Debug)]
pub struct CommandQueue<C: Command> {
    shared: Arc<Shared<C>>,
    engine: Option<JoinHandle<()>>,
}

impl<C: Command> CommandQueue<C> {
    /// Create the queue and spawn its engine thread.
    pub fn new(device: DeviceSpec) -> Result<Self> {
        let shared = Arc::new(Shared {
            device,
            state: Mutex::new(QueueState { pending: VecDeque::new(), submitted: 0, closed: false }),
            work_available: Condvar::new(),
            completed: TimelineSignal::default(),
            faults: Mutex::new(Vec::new()),
            drainers: AtomicUsize::new(0),
        });

        let engine_shared = Arc::clone(&shared);
        let engine = std::thread::Builder::new()
            .name(format!("kiln-engine-{device}"))
            .spawn(move || engine_shared.run())
            .context(EngineSpawnSnafu { device })?;

        Ok(Self { shared, engine: Some(engine) })
    }

    pub fn device(&self) -> DeviceSpec {
        self.shared.device
    }

    /// Append `command` and return its timeline value. Never blocks on execution.
    pub fn submit(&self, command: C) -> u64 {
        self.submit_with(|_| command)
    }

    /// Like [`submit`](Self::submit), with the command built from its timeline value.
    ///
    /// `build` runs before the engine can observe the command, so bookkeeping
    /// keyed by the timeline is in place before execution starts.
    pub fn submit_with(&self, build: impl FnOnce(u64) -> C) -> u64 {
        let mut state = self.shared.state.lock();
        let timeline = state.submitted + 1;
        let command = build(timeline);
        state.submitted = timeline;
        state.pending.push_back((timeline, command));
        drop(state);

        self.shared.work_available.notify_one();
        timeline
    }

    /// Timeline value of the last submitted command.
    pub fn submitted(&self) -> u64 {
        self.shared.state.lock().submitted
    }

    /// Timeline value of the last completed command.
    pub fn completed(&self) -> u64 {
        self.shared.completed.value()
    }

    /// Commands submitted but not yet completed.
    pub fn pending(&self) -> u64 {
        self.submitted().saturating_sub(self.completed())
    }

    pub fn barrier_state(&self) -> BarrierState {
        match self.shared.drainers.load(Ordering::Acquire) {
            0 => BarrierState::Idle,
            _ => BarrierState::Draining,
        }
    }

    /// Block until every command up to `timeline` has completed.
    ///
    /// Faults are not reported here; callers inspect the buffers they depend on.
    pub fn wait_for(&self, timeline: u64) {
        self.shared.completed.wait(timeline.min(self.submitted()));
    }

    /// Block until every command submitted before the call has completed.
    ///
    /// Returns the first fault recorded since the previous call, once.
    #[tracing::instrument(skip_all, fields(device = %self.shared.device))]
    pub fn synchronize(&self) -> Result<()> {
        let target = self.submitted();

        self.shared.drainers.fetch_add(1, Ordering::AcqRel);
        self.shared.completed.wait(target);
        self.shared.drainers.fetch_sub(1, Ordering::AcqRel);

        let first = {
            let mut faults = self.shared.faults.lock();
            let first = faults.iter().position(|fault| fault.timeline <= target).map(|i| faults[i].clone());
            faults.retain(|fault| fault.timeline > target);
            first
        };

        match first {
            Some(fault) => DeferredSnafu { fault }.fail(),
            None => Ok(()),
        }
    }
}

impl<C: Command> Drop for CommandQueue<C> {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.work_available.notify_all();

        if let Some(engine) = self.engine.take()
            && engine.join().is_err()
        {
            tracing::warn!(device = %self.shared.device, "engine thread panicked");
        }
    }
}

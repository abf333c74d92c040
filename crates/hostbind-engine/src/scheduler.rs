//! Owning-thread scheduler
//!
//! Synchronous methods must run on one designated thread. Callers enqueue
//! a task paired with a completion channel and block until the task
//! completes or their cancellation token fires. An abandoned task still
//! runs; its result is discarded.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
use hostbind_sdk::CancellationToken;

use crate::error::{CallError, SchedulerError};

/// Unit of work for the owning thread
pub type SyncTask = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer queue executing tasks in submission order
pub trait SyncScheduler: Send + Sync {
    /// Enqueue a task
    fn submit(&self, task: SyncTask) -> Result<(), SchedulerError>;

    /// Whether the current thread is the owning thread
    fn is_owner_thread(&self) -> bool;
}

// ============================================================================
// OwnerThread
// ============================================================================

/// Dedicated thread draining a FIFO task queue
pub struct OwnerThread {
    name: String,
    sender: Option<Sender<SyncTask>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    queued: Arc<AtomicUsize>,
}

impl OwnerThread {
    /// Start the owning thread
    pub fn spawn(name: impl Into<String>) -> Result<Self, SchedulerError> {
        let name = name.into();
        let (sender, receiver) = unbounded::<SyncTask>();
        let queued = Arc::new(AtomicUsize::new(0));

        let loop_queued = queued.clone();
        let loop_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || OwnerThread::run_loop(&loop_name, receiver, loop_queued))?;
        let thread_id = handle.thread().id();

        tracing::debug!(thread = %name, "Owner thread started");
        Ok(Self {
            name,
            sender: Some(sender),
            handle: Some(handle),
            thread_id,
            queued,
        })
    }

    fn run_loop(name: &str, receiver: Receiver<SyncTask>, queued: Arc<AtomicUsize>) {
        for task in receiver.iter() {
            queued.fetch_sub(1, Ordering::AcqRel);
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!(thread = name, "Task panicked on owner thread");
            }
        }
        tracing::debug!(thread = name, "Owner thread stopped");
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks waiting in the queue (not counting the one running)
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Id of the owning thread
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Stop accepting tasks, drain the queue and join the thread
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if thread::current().id() == self.thread_id {
                // Dropped from one of its own tasks; the loop exits on its own
                return;
            }
            if handle.join().is_err() {
                tracing::error!(thread = %self.name, "Owner thread panicked");
            }
        }
    }
}

impl SyncScheduler for OwnerThread {
    fn submit(&self, task: SyncTask) -> Result<(), SchedulerError> {
        let sender = self.sender.as_ref().ok_or(SchedulerError::Closed)?;
        self.queued.fetch_add(1, Ordering::AcqRel);
        sender.send(task).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            SchedulerError::Closed
        })
    }

    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for OwnerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for OwnerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerThread")
            .field("name", &self.name)
            .field("queued", &self.queued())
            .field("running", &self.sender.is_some())
            .finish()
    }
}

// ============================================================================
// Blocking hand-off
// ============================================================================

/// Run `f` on the owning thread and wait for its result.
///
/// Returns `CallError::Cancelled` as soon as `cancel` fires; the task is
/// left to finish and its result is dropped. With `run_inline`, a caller
/// already on the owning thread runs `f` directly. Without it, such a
/// caller would wait on itself, so callers on the owning thread must pass
/// `run_inline = true`.
pub fn run_on_owner<R, F>(
    scheduler: &dyn SyncScheduler,
    cancel: &CancellationToken,
    run_inline: bool,
    f: F,
) -> Result<R, CallError>
where
    F: FnOnce() -> Result<R, CallError> + Send + 'static,
    R: Send + 'static,
{
    cancel.check()?;
    if run_inline && scheduler.is_owner_thread() {
        return f();
    }

    let (done, completion) = bounded::<Result<R, CallError>>(1);
    scheduler
        .submit(Box::new(move || {
            // Receiver may be gone if the caller was cancelled
            let _ = done.send(f());
        }))
        .map_err(|err| CallError::InvalidState(err.to_string()))?;

    select! {
        recv(completion) -> result => match result {
            Ok(result) => result,
            Err(_) => Err(CallError::invocation("task dropped by owner thread")),
        },
        recv(cancel.signal()) -> _ => {
            tracing::debug!("Wait for owner thread abandoned");
            Err(CallError::Cancelled)
        }
    }
}

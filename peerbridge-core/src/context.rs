//! Affinity contexts: the single thread an object's state is confined to.
//!
//! A [`Dispatcher`] binds a context to the thread that creates it and owns
//! the context's FIFO work queue.  [`AffinityContext`] is the cheap, `Send`
//! handle other threads use to get work onto that thread.
//!
//! # Threading model
//!
//! - A caller already on the owning thread runs its operation inline.  It is
//!   never queued, so reentrant calls made from inside a work item cannot
//!   deadlock on their own context.
//! - A caller on any other thread enqueues a work item and blocks until the
//!   owning thread has run it.  Work items run one at a time, in arrival order.
//! - `shutdown` stops the queue from accepting new items, but items already
//!   queued still run, and calls they make on their own context still run
//!   inline.  Only dropping the dispatcher destroys the context for everyone.
//! - There is no timeout and no cancellation: a queued item runs to completion
//!   or fault, or is discarded (and its caller released with
//!   [`BridgeError::ContextUnavailable`]) when the dispatcher is dropped.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::errors::BridgeError;

type WorkItem = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct ContextState {
    name: String,
    owner: ThreadId,
    /// Cleared by `shutdown`: no new cross-thread work.
    available: AtomicBool,
    /// Set when the dispatcher is dropped: no work at all, inline included.
    destroyed: AtomicBool,
    /// `None` once the context is torn down.  Senders push under this lock,
    /// which is what fixes the FIFO order across caller threads.
    queue: Mutex<Option<Sender<WorkItem>>>,
}

impl ContextState {
    /// Returns `true` if this call performed the teardown.
    fn tear_down(&self) -> bool {
        let was_available = self.available.swap(false, Ordering::SeqCst);
        self.queue.lock().take();
        was_available
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.tear_down();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// AffinityContext
// ---------------------------------------------------------------------------

/// Handle to a single owning thread.
///
/// Cloning is cheap; every clone refers to the same context.  The owning
/// thread is fixed when the context is created and never reassigned.
#[derive(Clone)]
pub struct AffinityContext {
    state: Arc<ContextState>,
}

impl fmt::Debug for AffinityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityContext")
            .field("name", &self.state.name)
            .field("owner", &self.state.owner)
            .field("available", &self.is_available())
            .finish()
    }
}

impl AffinityContext {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Thread the context is bound to.
    pub fn owner(&self) -> ThreadId {
        self.state.owner
    }

    /// `true` when the calling thread is the owning thread.
    pub fn check_access(&self) -> bool {
        thread::current().id() == self.state.owner
    }

    /// `false` once the context has been shut down or its dispatcher dropped.
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    /// Number of cross-thread work items waiting to run.
    pub fn pending(&self) -> usize {
        self.state.queue.lock().as_ref().map_or(0, |queue| queue.len())
    }

    /// Stop accepting work.
    ///
    /// Items already queued still run if the dispatcher keeps running, and
    /// same-thread calls they make still run inline.  Cross-thread calls made
    /// after this returns fail with `ContextUnavailable`.
    pub fn shutdown(&self) {
        if self.state.tear_down() {
            debug!("affinity context '{}' shut down", self.state.name);
        }
    }

    /// Run `operation(argument)` on the owning thread and return its result.
    ///
    /// On the owning thread the operation runs in place, unless the
    /// dispatcher has been dropped.  From any other thread it is queued and
    /// the caller blocks until the owning thread has run it.  A fault raised by
    /// the operation is returned to the caller unchanged, and a panic is
    /// returned as [`BridgeError::OperationPanicked`].
    pub fn run_on_context<A, R, F>(&self, operation: F, argument: A) -> Result<R, BridgeError>
    where
        F: FnOnce(A) -> Result<R, BridgeError> + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        if self.state.is_destroyed() {
            return Err(self.unavailable());
        }

        if self.check_access() {
            trace!("'{}': running inline on owning thread", self.state.name);
            return operation(argument);
        }

        if !self.is_available() {
            return Err(self.unavailable());
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded::<Result<R, BridgeError>>(1);
        let item: WorkItem = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || operation(argument)))
                .unwrap_or_else(|payload| {
                    Err(BridgeError::OperationPanicked(panic_message(payload.as_ref())))
                });
            let _ = reply_tx.send(outcome);
        });

        {
            let queue = self.state.queue.lock();
            let Some(sender) = queue.as_ref() else {
                return Err(self.unavailable());
            };
            sender.send(item).map_err(|_| self.unavailable())?;
        }
        trace!("'{}': queued cross-thread work item", self.state.name);

        // Disconnected means the item was dropped unrun (dispatcher gone).
        reply_rx.recv().map_err(|_| {
            BridgeError::ContextUnavailable(format!(
                "context '{}' was torn down before the invocation ran",
                self.state.name
            ))
        })?
    }

    fn unavailable(&self) -> BridgeError {
        BridgeError::ContextUnavailable(format!(
            "context '{}' no longer accepts work",
            self.state.name
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "operation panicked".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher (owning side)
// ---------------------------------------------------------------------------

/// Owning side of an [`AffinityContext`].
///
/// The `PhantomData<*const ()>` field keeps the dispatcher `!Send`: it
/// must stay on the thread the context is bound to.  Dropping it tears the
/// context down and discards whatever is still queued.
#[must_use = "dropping the Dispatcher tears its context down"]
pub struct Dispatcher {
    context: AffinityContext,
    queue: Receiver<WorkItem>,
    _not_send: PhantomData<*const ()>,
}

impl Dispatcher {
    /// Bind a new context to the calling thread.
    pub fn attach(name: impl Into<String>) -> Self {
        let (sender, queue) = crossbeam_channel::unbounded();
        let state = Arc::new(ContextState {
            name: name.into(),
            owner: thread::current().id(),
            available: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            queue: Mutex::new(Some(sender)),
        });
        debug!(
            "affinity context '{}' attached to thread {:?}",
            state.name, state.owner
        );
        Self {
            context: AffinityContext { state },
            queue,
            _not_send: PhantomData,
        }
    }

    pub fn context(&self) -> AffinityContext {
        self.context.clone()
    }

    /// Process work items until the context is shut down.
    ///
    /// Items queued before the shutdown are still run.
    pub fn run(&self) {
        debug!("affinity context '{}' dispatching", self.context.name());
        while let Ok(item) = self.queue.recv() {
            item();
        }
        debug!("affinity context '{}' stopped dispatching", self.context.name());
    }

    /// Run every item queued right now without blocking.  Returns how many ran.
    pub fn pump_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(item) = self.queue.try_recv() {
            item();
            ran += 1;
        }
        ran
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.context.state.destroy();
        // Dropping an unrun item drops its reply slot, which releases the caller.
        let discarded = self.queue.try_iter().count();
        if discarded > 0 {
            warn!(
                "affinity context '{}' dropped with {discarded} queued invocation(s)",
                self.context.name()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Dedicated context thread
// ---------------------------------------------------------------------------

/// Settings for [`ContextThread::spawn`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Context name; also used as the OS thread name.
    pub name: String,
    /// Stack size for the owning thread, `None` for the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            name: "peerbridge-context".to_owned(),
            stack_size: None,
        }
    }
}

/// A thread that owns one [`AffinityContext`] and runs its dispatcher.
///
/// Dropping the `ContextThread` shuts the context down and joins the thread.
#[must_use = "dropping the ContextThread stops its context"]
pub struct ContextThread {
    context: AffinityContext,
    thread: Option<JoinHandle<()>>,
}

impl ContextThread {
    pub fn spawn(options: ContextOptions) -> Result<Self, BridgeError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let mut builder = thread::Builder::new().name(options.name.clone());
        if let Some(size) = options.stack_size {
            builder = builder.stack_size(size);
        }

        let name = options.name;
        let thread = builder
            .spawn(move || {
                let dispatcher = Dispatcher::attach(name);
                if ready_tx.send(dispatcher.context()).is_err() {
                    return;
                }
                dispatcher.run();
            })
            .map_err(|e| {
                BridgeError::ContextUnavailable(format!("failed to spawn context thread: {e}"))
            })?;

        let context = ready_rx.recv().map_err(|_| {
            BridgeError::ContextUnavailable("context thread exited during startup".to_owned())
        })?;

        Ok(Self {
            context,
            thread: Some(thread),
        })
    }

    pub fn context(&self) -> &AffinityContext {
        &self.context
    }

    /// Shut the context down and wait for the thread to finish the items
    /// that were already queued.
    pub fn shutdown(mut self) -> Result<(), BridgeError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), BridgeError> {
        self.context.shutdown();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // Joining ourselves would never return.
        if thread.thread().id() == thread::current().id() {
            return Ok(());
        }
        thread.join().map_err(|_| {
            BridgeError::ContextUnavailable(format!(
                "context thread '{}' panicked",
                self.context.name()
            ))
        })
    }
}

impl Drop for ContextThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution engine: a fixed pool of workers draining a bounded admission
//! queue, with a completion channel and irreversible batch cancellation.
//!
//! Admission is bounded by a semaphore of `capacity` permits. A permit is
//! taken in [`Engine::submit`] and released only after the task's outcome
//! has been published, so `capacity` bounds queued plus running tasks.
//!
//! A task submitted with a key can be pulled back out of the queue with
//! [`Engine::discard`], which releases its permit.
//!
//! Cancellation ([`Engine::cancel_batch`]) flips the phase under the same
//! lock `submit` enqueues under, which gives every submission a total order
//! against it: either it was enqueued first, or it fails with
//! [`EngineError::Rejected`].

mod progress;

pub use progress::{LogProgress, ProgressObserver};

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Future returned by a [`Task`].
pub type TaskFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// A unit of work. The token is cancelled when the batch is cancelled;
/// long-running tasks should watch it and unwind.
pub type Task<T, E> = Box<dyn FnOnce(CancellationToken) -> TaskFuture<T, E> + Send>;

/// What [`Engine::consume`] hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The task returned `Ok`
    Completed(T),
    /// The task returned `Err`
    Failed(E),
    /// The task panicked; carries the panic message
    Panicked(String),
    /// The batch was cancelled
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Started,
    Cancelled,
}

jsd_core::simple_display! {
    Phase {
        Created => "created",
        Started => "started",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is cancelled, submission rejected")]
    Rejected,

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine is cancelled")]
    Cancelled,
}

struct Queued<T, E> {
    key: Option<u64>,
    task: Task<T, E>,
    permit: OwnedSemaphorePermit,
}

struct State<T, E> {
    phase: Phase,
    queue: VecDeque<Queued<T, E>>,
}

struct Progress {
    label: String,
    total: usize,
    done: AtomicUsize,
    observer: Arc<dyn ProgressObserver>,
}

struct Shared<T, E> {
    workers: usize,
    capacity: usize,
    state: Mutex<State<T, E>>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    ready: Notify,
    outcomes_tx: mpsc::UnboundedSender<Outcome<T, E>>,
    outcomes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Outcome<T, E>>>,
    live_workers: AtomicUsize,
    /// Fired by the last worker loop to exit
    drained: CancellationToken,
    progress: Mutex<Option<Arc<Progress>>>,
}

/// Bounded concurrent task runner. Clones share the same engine.
pub struct Engine<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Engine<T, E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T, E> Engine<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// `workers` and `capacity` are raised to at least 1.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                workers,
                capacity,
                state: Mutex::new(State { phase: Phase::Created, queue: VecDeque::new() }),
                permits: Arc::new(Semaphore::new(capacity)),
                cancel: CancellationToken::new(),
                ready: Notify::new(),
                outcomes_tx,
                outcomes_rx: tokio::sync::Mutex::new(outcomes_rx),
                live_workers: AtomicUsize::new(0),
                drained: CancellationToken::new(),
                progress: Mutex::new(None),
            }),
        }
    }

    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Spawn the worker loops, reporting progress through `tracing`.
    ///
    /// `total` is advisory and only feeds progress reporting.
    pub fn start(&self, label: &str, total: usize) -> Result<(), EngineError> {
        self.start_with(label, total, Arc::new(LogProgress))
    }

    /// Spawn the worker loops with a custom progress observer.
    pub fn start_with(
        &self,
        label: &str,
        total: usize,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.lock();
            match state.phase {
                Phase::Started => return Err(EngineError::AlreadyStarted),
                Phase::Cancelled => return Err(EngineError::Cancelled),
                Phase::Created => {
                    state.phase = Phase::Started;
                    self.shared.live_workers.store(self.shared.workers, Ordering::SeqCst);
                }
            }
        }

        observer.started(label, total);
        *self.shared.progress.lock() = Some(Arc::new(Progress {
            label: label.to_string(),
            total,
            done: AtomicUsize::new(0),
            observer,
        }));

        for index in 0..self.shared.workers {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(worker_loop(shared, index));
        }
        info!(
            label,
            workers = self.shared.workers,
            capacity = self.shared.capacity,
            "engine started"
        );
        Ok(())
    }

    /// Enqueue a task, waiting while the engine is at capacity.
    ///
    /// Fails with [`EngineError::Rejected`] if the batch is cancelled before
    /// the task is enqueued, including while this call is waiting.
    pub async fn submit(&self, task: Task<T, E>) -> Result<(), EngineError> {
        self.enqueue(None, task).await
    }

    /// [`Engine::submit`] under `key`, so the task can be discarded while
    /// it is still queued.
    pub async fn submit_keyed(&self, key: u64, task: Task<T, E>) -> Result<(), EngineError> {
        self.enqueue(Some(key), task).await
    }

    async fn enqueue(&self, key: Option<u64>, task: Task<T, E>) -> Result<(), EngineError> {
        let permits = Arc::clone(&self.shared.permits);
        let permit = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => return Err(EngineError::Rejected),
            permit = permits.acquire_owned() => permit.map_err(|_| EngineError::Rejected)?,
        };

        {
            let mut state = self.shared.state.lock();
            if state.phase == Phase::Cancelled {
                return Err(EngineError::Rejected);
            }
            state.queue.push_back(Queued { key, task, permit });
        }
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Drop the queued task submitted under `key` without running it and
    /// free its slot. Returns `false` if no such task is queued, including
    /// when a worker has already taken it.
    pub fn discard(&self, key: u64) -> bool {
        let removed = {
            let mut state = self.shared.state.lock();
            let position = state.queue.iter().position(|queued| queued.key == Some(key));
            position.and_then(|index| state.queue.remove(index))
        };
        match removed {
            Some(queued) => {
                drop(queued);
                debug!(key, "queued task discarded");
                true
            }
            None => false,
        }
    }

    /// Wait for the next outcome.
    ///
    /// Once the batch is cancelled every call, pending or future, returns
    /// [`Outcome::Interrupted`].
    pub async fn consume(&self) -> Outcome<T, E> {
        if self.is_cancelled() {
            return Outcome::Interrupted;
        }
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Outcome::Interrupted,
            outcome = async { self.shared.outcomes_rx.lock().await.recv().await } => {
                outcome.unwrap_or(Outcome::Interrupted)
            }
        }
    }

    /// Cancel the batch. Idempotent; all effects hold when this returns.
    ///
    /// Queued tasks are dropped unrun, running tasks see their token
    /// cancelled, and waiting `submit`/`consume` callers are woken.
    pub fn cancel_batch(&self) {
        let discarded = {
            let mut state = self.shared.state.lock();
            if state.phase == Phase::Cancelled {
                None
            } else {
                state.phase = Phase::Cancelled;
                Some(std::mem::take(&mut state.queue))
            }
        };

        self.shared.permits.close();
        self.shared.cancel.cancel();
        self.shared.ready.notify_waiters();

        if let Some(discarded) = discarded {
            info!(discarded = discarded.len(), "batch cancelled");
        }
        // Never started: no worker will fire `drained`
        if self.shared.live_workers.load(Ordering::SeqCst) == 0 {
            self.shared.drained.cancel();
        }
    }

    /// Wait until every worker loop has exited.
    ///
    /// Returns immediately if the engine was never started.
    pub async fn join(&self) {
        if self.phase() == Phase::Created {
            return;
        }
        self.shared.drained.cancelled().await;
    }
}

/// Decrements the live worker count when a worker loop exits.
struct WorkerExit<'a, T, E> {
    shared: &'a Shared<T, E>,
    index: usize,
}

impl<T, E> Drop for WorkerExit<'_, T, E> {
    fn drop(&mut self) {
        debug!(worker = self.index, "worker exited");
        if self.shared.live_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.drained.cancel();
        }
    }
}

async fn worker_loop<T, E>(shared: Arc<Shared<T, E>>, index: usize)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let _exit = WorkerExit { shared: &shared, index };

    loop {
        // Register interest before looking at the queue so a push between
        // the check and the wait is not missed.
        let notified = shared.ready.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let next = {
            let mut state = shared.state.lock();
            if state.phase == Phase::Cancelled {
                break;
            }
            state.queue.pop_front()
        };

        let Some(Queued { task, permit, .. }) = next else {
            tokio::select! {
                _ = &mut notified => {}
                _ = shared.cancel.cancelled() => {}
            }
            continue;
        };

        let outcome = run_task(task, shared.cancel.child_token()).await;
        if let Outcome::Panicked(message) = &outcome {
            warn!(worker = index, %message, "task panicked");
        }
        let _ = shared.outcomes_tx.send(outcome);

        let progress = shared.progress.lock().clone();
        if let Some(progress) = progress {
            let done = progress.done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.observer.finished(&progress.label, done, progress.total);
        }
        drop(permit);
    }
}

/// Run a task on its own tokio task so a panic is captured as an outcome.
async fn run_task<T, E>(task: Task<T, E>, token: CancellationToken) -> Outcome<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match tokio::spawn(task(token)).await {
        Ok(Ok(value)) => Outcome::Completed(value),
        Ok(Err(err)) => Outcome::Failed(err),
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Outcome::Panicked(message)
        }
        Err(_) => Outcome::Interrupted,
    }
}

#[cfg(test)]
#[path = "../engine_tests.rs"]
mod tests;

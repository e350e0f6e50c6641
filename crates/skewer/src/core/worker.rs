//! Module for managing the background worker task.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::{task::JoinHandle, sync::Notify};
use crate::error::{Error, Result};

/// A handle for managing a background worker task.
///
/// This struct provides a convenient way to spawn, manage, and gracefully shut down
/// a long-running worker loop in the Tokio runtime. The loop owns nothing but the
/// running flag and the notifier; all queue state lives in the broker, so stopping
/// a worker never loses work that was not already claimed.
///
/// # Example
///
/// ```ignore
/// use skewer::core::BatchWorkerHandle;
/// use std::sync::atomic::Ordering;
/// use std::time::Duration;
///
/// async fn example() {
///     let mut worker = BatchWorkerHandle::new(|running, notifier| {
///         tokio::spawn(async move {
///             while running.load(Ordering::SeqCst) {
///                 // Claim and process a batch
///
///                 // Idle until woken or the interval elapses
///                 tokio::select! {
///                     _ = notifier.notified() => {},
///                     _ = tokio::time::sleep(Duration::from_millis(250)) => {},
///                 }
///             }
///             Ok(())
///         })
///     });
///
///     worker.shutdown();
///     worker.join().await.unwrap();
/// }
/// ```
pub struct BatchWorkerHandle {
    /// Flag indicating whether the background task should continue running
    running: Arc<AtomicBool>,

    /// Handle to the spawned background task, becomes `None` once joined or shut down
    handle: Option<JoinHandle<Result<()>>>,

    /// Notification mechanism to wake up the background task
    notifier: Arc<Notify>,
}

impl BatchWorkerHandle {
    /// Creates a new `BatchWorkerHandle` by spawning a background task.
    ///
    /// # Parameters
    ///
    /// * `task` - A function that takes a running flag and a notifier, and returns a `JoinHandle`.
    ///   This function is responsible for creating and spawning the actual background task.
    ///
    /// # Returns
    ///
    /// A new `BatchWorkerHandle` instance with the task running.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<Result<()>> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Wakes the background task if it is idling.
    ///
    /// Producers in the same process may call this after enqueueing to cut the
    /// idle wait short. It is never required for correctness.
    pub fn notify(&self) {
        self.notifier.notify_one();
    }

    /// Returns a clone of the atomic boolean that indicates whether the task should continue running.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Returns a clone of the notifier that can be used to wake up the background task.
    pub fn notifier(&self) -> Arc<Notify> {
        self.notifier.clone()
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the task to stop after its current cycle.
    fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();
    }

    /// Initiates a graceful shutdown of the background task.
    ///
    /// This method:
    /// 1. Sets the running flag to `false`
    /// 2. Notifies the task to wake up (so it can observe that it should stop)
    /// 3. Takes ownership of the task handle and spawns a separate task to await its completion
    pub fn shutdown(&mut self) {
        self.signal_stop();

        if let Some(handle) = self.handle.take() {
            tokio::spawn(async move {
                let _ = handle.await;
            });
        }
    }

    /// Waits for the background task to exit and returns its outcome.
    ///
    /// Does not ask the task to stop; call [`shutdown`](Self::shutdown) first
    /// for that, or use [`stop`](Self::stop). Joining a handle that was already
    /// joined or shut down returns `Ok(())`.
    pub async fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            None => Ok(()),
            Some(handle) => handle
                .await
                .map_err(|e| Error::WorkerStopped(e.to_string()))?,
        }
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn stop(mut self) -> Result<()> {
        self.signal_stop();
        self.join().await
    }
}

impl Drop for BatchWorkerHandle {
    /// Ensures the background task is properly terminated when the handle is dropped.
    fn drop(&mut self) {
        self.shutdown();
    }
}

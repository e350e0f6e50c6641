use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use crate::broker::Broker;
use crate::communication::{Item, ItemId};
use crate::config::WorkerConfig;
use crate::core::{BatchWorkerHandle, JobQueue, ResultStore};
use crate::error::{Error, Result};
use super::core_trait::{BatchTransform, TransformError};
use super::state::{CycleOutcome, Transition, WorkerState};

/// # BatchWorker
///
/// The consumer side of the protocol: repeatedly claims a batch from the
/// [`JobQueue`], runs the [`BatchTransform`] over it once, and publishes one
/// result per item to the [`ResultStore`].
///
/// The loop is a state machine over [`WorkerState`]. An empty queue (or an
/// unreachable broker) sends it to `Idle`, the only state that sleeps; after a
/// batch it claims again immediately, which keeps latency low under load
/// without spinning when there is nothing to do.
///
/// ## Type Parameters
///
/// * `B` - The broker shared with producers
/// * `T` - The compute transform
/// * `P` - The payload type of queued items
/// * `R` - The result type published per item
pub struct BatchWorker<B, T, P, R> {
    queue: JobQueue<B>,
    results: ResultStore<B>,
    transform: T,
    config: WorkerConfig,
    _marker: PhantomData<fn() -> (P, R)>,
}

impl<B, T, P, R> BatchWorker<B, T, P, R>
where
    B: Broker,
    T: BatchTransform<P, R>,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + Sync + 'static,
{
    pub fn new(
        queue: JobQueue<B>,
        results: ResultStore<B>,
        transform: T,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            results,
            transform,
            config,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Advances the state machine by one step.
    ///
    /// # Returns
    ///
    /// The next state, plus the cycle outcome when this step finished a cycle.
    /// An `Err` means the transform reported an unrecoverable resource fault
    /// and the loop must stop.
    pub async fn step(&self, state: WorkerState<P, R>) -> Result<Transition<P, R>> {
        match state {
            WorkerState::Idle => Ok(Transition::to(WorkerState::Claiming)),
            WorkerState::Claiming => Ok(self.claim().await),
            WorkerState::Processing(batch) => self.process(batch).await,
            WorkerState::Publishing { ids, results } => Ok(self.publish(ids, results).await),
        }
    }

    async fn claim(&self) -> Transition<P, R> {
        match self.queue.claim_batch(self.config.max_batch_size).await {
            Ok(batch) if batch.is_empty() => Transition::finish(WorkerState::Idle, CycleOutcome::Idle),
            Ok(batch) => Transition::to(WorkerState::Processing(batch)),
            Err(e @ Error::Decode(_)) => {
                warn!(queue = self.queue.name(), error = %e, "discarding batch with malformed entry");
                Transition::finish(WorkerState::Claiming, CycleOutcome::Malformed)
            }
            Err(e) => {
                error!(queue = self.queue.name(), error = %e, "failed to claim batch");
                Transition::finish(WorkerState::Idle, CycleOutcome::Unavailable)
            }
        }
    }

    async fn process(&self, batch: Vec<Item<P>>) -> Result<Transition<P, R>> {
        let size = batch.len();
        let (ids, payloads): (Vec<ItemId>, Vec<P>) = batch.into_iter().map(|item| item.into_parts()).unzip();
        info!(size, "processing batch");

        let outcome = match self.transform.forward(payloads).await {
            Ok(results) if results.len() == size => {
                return Ok(Transition::to(WorkerState::Publishing { ids, results }));
            }
            Ok(results) => TransformError::LengthMismatch {
                expected: size,
                actual: results.len(),
            },
            Err(e) => e,
        };

        if outcome.is_fatal() {
            error!(size, error = %outcome, "transform hit an unrecoverable fault, stopping worker");
            return Err(outcome.into());
        }
        warn!(size, error = %outcome, "transform rejected batch, dropping it");
        Ok(Transition::finish(WorkerState::Claiming, CycleOutcome::Dropped(size)))
    }

    async fn publish(&self, ids: Vec<ItemId>, results: Vec<R>) -> Transition<P, R> {
        let size = ids.len();
        for (published, (id, result)) in ids.into_iter().zip(results.iter()).enumerate() {
            if let Err(e) = self.results.publish(id, result, self.config.result_ttl).await {
                error!(
                    %id,
                    published,
                    remaining = size - published,
                    error = %e,
                    "failed to publish result, abandoning rest of batch"
                );
                return Transition::finish(WorkerState::Idle, CycleOutcome::Unavailable);
            }
        }
        debug!(size, "published batch");
        Transition::finish(WorkerState::Claiming, CycleOutcome::Published(size))
    }

    /// Runs exactly one cycle: claim, and if anything was claimed, process and publish.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut state = WorkerState::Claiming;
        loop {
            let transition = self.step(state).await?;
            if let Some(outcome) = transition.outcome {
                return Ok(outcome);
            }
            state = transition.next;
        }
    }

    /// Drives the loop until `running` is cleared or the transform reports a
    /// resource fault.
    ///
    /// `running` is only consulted between cycles: a batch that has been
    /// claimed is always processed and published before the loop returns.
    ///
    /// While idle the loop waits for the configured interval, or until
    /// `notifier` fires, whichever comes first.
    pub async fn run(&self, running: Arc<AtomicBool>, notifier: Arc<Notify>) -> Result<()> {
        info!(
            queue = self.queue.name(),
            batch_size = self.config.max_batch_size,
            "worker started"
        );
        let mut state = WorkerState::Claiming;

        loop {
            // a claimed batch is always published before the loop exits
            if state.is_between_cycles() && !running.load(Ordering::SeqCst) {
                break;
            }
            if state.is_idle() {
                tokio::select! {
                    _ = notifier.notified() => {},
                    _ = tokio::time::sleep(self.config.idle_interval) => {},
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            state = self.step(state).await?.next;
        }

        info!(queue = self.queue.name(), "worker stopped");
        Ok(())
    }

    /// Spawns the loop onto the current Tokio runtime.
    ///
    /// The returned handle stops the loop when shut down or dropped.
    pub fn spawn(self) -> BatchWorkerHandle {
        BatchWorkerHandle::new(move |running, notifier| {
            tokio::spawn(async move { self.run(running, notifier).await })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::broker::MemoryBroker;

    /// Tags each payload with its position in the batch.
    struct IndexTagger {
        batches: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl BatchTransform<String, (usize, String)> for IndexTagger {
        async fn forward(&self, batch: Vec<String>) -> std::result::Result<Vec<(usize, String)>, TransformError> {
            self.batches.lock().unwrap().push(batch.len());
            Ok(batch.into_iter().enumerate().collect())
        }
    }

    struct Failing(TransformError);

    #[async_trait]
    impl BatchTransform<String, String> for Failing {
        async fn forward(&self, _batch: Vec<String>) -> std::result::Result<Vec<String>, TransformError> {
            Err(self.0.clone())
        }
    }

    /// Sleeps before echoing, to hold a batch in flight.
    struct Slow(Duration);

    #[async_trait]
    impl BatchTransform<String, String> for Slow {
        async fn forward(&self, batch: Vec<String>) -> std::result::Result<Vec<String>, TransformError> {
            tokio::time::sleep(self.0).await;
            Ok(batch)
        }
    }

    struct ShortChanging;

    #[async_trait]
    impl BatchTransform<String, String> for ShortChanging {
        async fn forward(&self, batch: Vec<String>) -> std::result::Result<Vec<String>, TransformError> {
            Ok(batch.into_iter().skip(1).collect())
        }
    }

    fn config(max_batch_size: usize) -> WorkerConfig {
        WorkerConfig {
            max_batch_size,
            idle_interval: Duration::from_millis(250),
            result_ttl: Duration::from_secs(60),
        }
    }

    fn parts(broker: &Arc<MemoryBroker>) -> (JobQueue<MemoryBroker>, ResultStore<MemoryBroker>) {
        (JobQueue::new(broker.clone(), "jobs"), ResultStore::new(broker.clone()))
    }

    async fn enqueue_all(queue: &JobQueue<MemoryBroker>, payloads: &[&str]) -> Vec<ItemId> {
        let mut ids = vec![];
        for payload in payloads {
            let item = Item::new(payload.to_string());
            queue.enqueue(&item).await.unwrap();
            ids.push(item.id());
        }
        ids
    }

    #[tokio::test]
    async fn test_empty_queue_goes_idle() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let worker = BatchWorker::new(queue, results, Failing(TransformError::Batch("unused".into())), config(4));

        let transition = worker.step(WorkerState::Claiming).await.unwrap();
        assert!(transition.next.is_idle());
        assert_eq!(transition.outcome, Some(CycleOutcome::Idle));

        let transition = worker.step(WorkerState::Idle).await.unwrap();
        assert_eq!(transition.next.name(), "claiming");
        assert_eq!(transition.outcome, None);
    }

    #[tokio::test]
    async fn test_cycle_publishes_in_claim_order() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let ids = enqueue_all(&queue, &["a", "b", "c", "d", "e"]).await;
        let batches = Arc::new(Mutex::new(vec![]));
        let worker = BatchWorker::new(
            queue.clone(),
            results.clone(),
            IndexTagger { batches: batches.clone() },
            config(3),
        );

        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Published(3));
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Published(2));
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);
        assert_eq!(*batches.lock().unwrap(), vec![3, 2]);

        let expected = [(0, "a"), (1, "b"), (2, "c"), (0, "d"), (1, "e")];
        for (id, (index, payload)) in ids.into_iter().zip(expected) {
            let got: Option<(usize, String)> = results.take_if_ready(id).await.unwrap();
            assert_eq!(got, Some((index, payload.to_string())));
        }
    }

    #[tokio::test]
    async fn test_rejected_batch_publishes_nothing() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let ids = enqueue_all(&queue, &["a", "b"]).await;
        let worker = BatchWorker::new(
            queue.clone(),
            results.clone(),
            Failing(TransformError::Batch("cannot decode image".into())),
            config(8),
        );

        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Dropped(2));
        for id in ids {
            let got: Option<String> = results.take_if_ready(id).await.unwrap();
            assert!(got.is_none());
        }
        // the loop carries on with the next claim
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);
    }

    #[tokio::test]
    async fn test_length_mismatch_drops_batch() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let ids = enqueue_all(&queue, &["a", "b", "c"]).await;
        let worker = BatchWorker::new(queue, results.clone(), ShortChanging, config(8));

        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Dropped(3));
        for id in ids {
            let got: Option<String> = results.take_if_ready(id).await.unwrap();
            assert!(got.is_none());
        }
    }

    #[tokio::test]
    async fn test_resource_fault_is_fatal() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        enqueue_all(&queue, &["a"]).await;
        let worker = BatchWorker::new(
            queue,
            results,
            Failing(TransformError::Resource("device lost".into())),
            config(8),
        );

        let err = worker.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Transform(TransformError::Resource(_))));
    }

    #[tokio::test]
    async fn test_malformed_entry_is_skipped() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        broker.push_tail("jobs", b"{\"garbage\":true}".to_vec()).await.unwrap();
        let worker = BatchWorker::new(
            queue.clone(),
            results,
            IndexTagger { batches: Default::default() },
            config(8),
        );

        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Malformed);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_worker_stops_on_resource_fault() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        enqueue_all(&queue, &["a"]).await;
        let mut handle = BatchWorker::new(
            queue,
            results,
            Failing(TransformError::Resource("out of memory".into())),
            config(8),
        )
        .spawn();

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, Error::Transform(TransformError::Resource(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_worker_stops_cleanly() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let handle = BatchWorker::new(
            queue,
            results,
            IndexTagger { batches: Default::default() },
            config(8),
        )
        .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_batch_publishes_claimed_items() {
        let broker = Arc::new(MemoryBroker::new());
        let (queue, results) = parts(&broker);
        let ids = enqueue_all(&queue, &["in-flight"]).await;
        let handle = BatchWorker::new(
            queue.clone(),
            results.clone(),
            Slow(Duration::from_secs(1)),
            config(8),
        )
        .spawn();

        // the batch is claimed and the transform is still running
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(queue.is_empty().await.unwrap());
        handle.stop().await.unwrap();

        let got: Option<String> = results.take_if_ready(ids[0]).await.unwrap();
        assert_eq!(got.as_deref(), Some("in-flight"));
    }
}

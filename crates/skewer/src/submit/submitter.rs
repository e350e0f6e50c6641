use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tracing::{debug, instrument, warn};
use crate::broker::Broker;
use crate::communication::{Item, ItemId, Ticket};
use crate::config::SubmitConfig;
use crate::core::{JobQueue, ResultStore};
use crate::error::{Error, Result};
use super::state::AwaitState;

/// # Submitter
///
/// The producer side of the protocol: enqueue an item under a fresh
/// correlation id, then poll the result store for that id until the result
/// appears or the polling budget runs out.
///
/// Polling is bounded twice over: by `max_attempts` (each not-ready attempt is
/// followed by one `poll_interval` sleep) and, optionally, by a wall-clock
/// `await_timeout`. Whichever bound trips first produces
/// [`Error::TimedOut`]. Timing out only stops this producer from waiting; the
/// worker may still process the item, and its unread result then expires.
pub struct Submitter<B> {
    queue: JobQueue<B>,
    results: ResultStore<B>,
    config: SubmitConfig,
    worker_notifier: Option<Arc<Notify>>,
}

impl<B> Clone for Submitter<B> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            results: self.results.clone(),
            config: self.config.clone(),
            worker_notifier: self.worker_notifier.clone(),
        }
    }
}

impl<B: Broker> Submitter<B> {
    pub fn new(queue: JobQueue<B>, results: ResultStore<B>, config: SubmitConfig) -> Self {
        Self {
            queue,
            results,
            config,
            worker_notifier: None,
        }
    }

    /// Wakes an in-process worker after every enqueue.
    ///
    /// Only an optimization for workers sharing this process; a remote worker
    /// picks the item up on its next claim regardless.
    pub fn with_worker_notifier(mut self, notifier: Arc<Notify>) -> Self {
        self.worker_notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &SubmitConfig {
        &self.config
    }

    /// Enqueues `payload` under a fresh id and returns the ticket to await.
    #[instrument(skip(self, payload), fields(queue = self.queue.name()), err)]
    pub async fn submit<P, R>(&self, payload: P) -> Result<Ticket<R>>
    where
        P: Serialize + Send + Sync,
    {
        let item = Item::new(payload);
        self.queue.enqueue(&item).await?;
        if let Some(notifier) = &self.worker_notifier {
            notifier.notify_one();
        }
        debug!(id = %item.id(), "enqueued");
        Ok(Ticket::new(item.id()))
    }

    /// Advances the await state machine by one step.
    ///
    /// A `Polling` step makes one destructive read; when it comes back not
    /// ready, it sleeps one poll interval before reporting the next state.
    /// Terminal states are returned unchanged.
    pub async fn poll_step<R>(&self, id: ItemId, state: AwaitState<R>) -> Result<AwaitState<R>>
    where
        R: DeserializeOwned + Send,
    {
        let attempts = match state {
            AwaitState::Enqueued => return Ok(AwaitState::Polling { attempts: 0 }),
            AwaitState::Polling { attempts } => attempts,
            terminal => return Ok(terminal),
        };

        if let Some(result) = self.results.take_if_ready(id).await? {
            return Ok(AwaitState::Delivered { result, attempts });
        }

        let attempts = attempts + 1;
        tokio::time::sleep(self.config.poll_interval).await;
        if attempts >= self.config.max_attempts {
            Ok(AwaitState::TimedOut { attempts })
        } else {
            Ok(AwaitState::Polling { attempts })
        }
    }

    async fn poll_until_done<R>(&self, id: ItemId, attempts: &mut u32) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        let mut state = AwaitState::Enqueued;
        loop {
            state = self.poll_step(id, state).await?;
            *attempts = state.attempts();
            match state {
                AwaitState::Delivered { result, attempts } => {
                    debug!(%id, attempts, "result delivered");
                    return Ok(result);
                }
                AwaitState::TimedOut { attempts } => return Err(Error::TimedOut { id, attempts }),
                _ => {}
            }
        }
    }

    /// Polls for the result of `ticket` until it is delivered or a bound trips.
    #[instrument(skip(self, ticket), fields(id = %ticket.id()), err)]
    pub async fn await_result<R>(&self, ticket: &Ticket<R>) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        let id = ticket.id();
        let mut attempts = 0;
        let outcome = match self.config.await_timeout {
            None => self.poll_until_done(id, &mut attempts).await,
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, self.poll_until_done(id, &mut attempts)).await;
                bounded.unwrap_or(Err(Error::TimedOut { id, attempts }))
            }
        };

        if outcome.as_ref().is_err_and(Error::is_timeout) {
            warn!(
                waited_ms = ticket.submitted_at().elapsed().as_millis() as u64,
                "gave up waiting for result"
            );
        }
        outcome
    }

    /// Submits `payload` and waits for its result.
    pub async fn run<P, R>(&self, payload: P) -> Result<R>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let ticket = self.submit(payload).await?;
        self.await_result(&ticket).await
    }

    /// Submits every payload, then waits for all of their results concurrently.
    ///
    /// Results come back in the order the payloads were given. One payload
    /// timing out does not affect the others.
    pub async fn run_many<P, R, I>(&self, payloads: I) -> Vec<Result<R>>
    where
        I: IntoIterator<Item = P>,
        P: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let mut tickets = vec![];
        for payload in payloads {
            tickets.push(self.submit::<P, R>(payload).await);
        }

        futures::future::join_all(tickets.into_iter().map(|ticket| async move {
            match ticket {
                Ok(ticket) => self.await_result(&ticket).await,
                Err(e) => Err(e),
            }
        }))
        .await
    }
}

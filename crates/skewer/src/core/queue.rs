use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use crate::broker::Broker;
use crate::communication::Item;
use crate::error::Result;

/// How [`JobQueue::claim_batch`] removes items from the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimMode {
    /// A single atomic multi-pop. Safe with any number of workers.
    #[default]
    Atomic,

    /// Read the head range and trim it with [`Broker::range_trim_head`].
    ///
    /// For brokers without a multi-pop (Redis before 6.2, where this runs as
    /// `LRANGE` + `LTRIM` inside `MULTI`). Safe with many workers only when
    /// the broker runs both steps as one transaction; the trait's default
    /// does not.
    ReadThenTrim,
}

impl fmt::Display for ClaimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimMode::Atomic => f.write_str("atomic"),
            ClaimMode::ReadThenTrim => f.write_str("read-then-trim"),
        }
    }
}

impl FromStr for ClaimMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" | "pop" => Ok(ClaimMode::Atomic),
            "read-then-trim" | "read_then_trim" | "range-trim" => Ok(ClaimMode::ReadThenTrim),
            other => Err(format!("unknown claim mode `{other}` (expected `atomic` or `read-then-trim`)")),
        }
    }
}

/// # JobQueue
///
/// The shared FIFO of pending [`Item`]s, held entirely in the broker.
///
/// Producers [`enqueue`](JobQueue::enqueue) at the tail; workers
/// [`claim_batch`](JobQueue::claim_batch) from the head. The queue is
/// unbounded: enqueueing never signals backpressure.
///
/// Cloning is cheap and clones address the same broker list.
pub struct JobQueue<B> {
    broker: Arc<B>,
    name: String,
    mode: ClaimMode,
}

impl<B> Clone for JobQueue<B> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            name: self.name.clone(),
            mode: self.mode,
        }
    }
}

impl<B> fmt::Debug for JobQueue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<B: Broker> JobQueue<B> {
    /// Creates a queue over the broker list `name`, claiming atomically.
    pub fn new(broker: Arc<B>, name: impl Into<String>) -> Self {
        Self::with_mode(broker, name, ClaimMode::Atomic)
    }

    /// Creates a queue with an explicit claim mode.
    pub fn with_mode(broker: Arc<B>, name: impl Into<String>, mode: ClaimMode) -> Self {
        Self { broker, name: name.into(), mode }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ClaimMode {
        self.mode
    }

    /// Appends `item` to the tail of the queue.
    #[instrument(skip(self, item), fields(queue = %self.name, id = %item.id()), err)]
    pub async fn enqueue<P: Serialize>(&self, item: &Item<P>) -> Result<()> {
        let bytes = item.encode()?;
        self.broker.push_tail(&self.name, bytes).await?;
        Ok(())
    }

    /// Removes up to `max_size` items from the head of the queue, oldest first.
    ///
    /// An empty queue yields an empty batch, not an error. If any claimed
    /// entry fails to decode, the whole batch is reported as a decode error;
    /// its entries have already left the queue.
    #[instrument(skip(self), fields(queue = %self.name, mode = %self.mode), err)]
    pub async fn claim_batch<P: DeserializeOwned>(&self, max_size: usize) -> Result<Vec<Item<P>>> {
        if max_size == 0 {
            return Ok(vec![]);
        }

        let raw = match self.mode {
            ClaimMode::Atomic => self.broker.pop_head(&self.name, max_size).await?,
            ClaimMode::ReadThenTrim => self.broker.range_trim_head(&self.name, max_size).await?,
        };

        if !raw.is_empty() {
            debug!(claimed = raw.len(), "claimed batch");
        }

        raw.iter()
            .map(|bytes| Item::decode(bytes))
            .collect()
    }

    /// Number of items waiting to be claimed.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.broker.list_len(&self.name).await?)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

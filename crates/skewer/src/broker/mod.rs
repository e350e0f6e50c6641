//! # Broker
//!
//! The shared, process-external store that producers and workers coordinate
//! through. Nothing in this crate holds queue or result state of its own; every
//! piece of shared mutable state lives behind a [`Broker`].
//!
//! ## Primitives
//!
//! A broker offers two families of operations:
//!
//! - an ordered list (append to tail, read/trim/pop from head), backing the job queue
//! - an expiring key/value space, backing the result store
//!
//! Two of the operations are required to be atomic from the broker's point of
//! view: [`Broker::pop_head`] and [`Broker::take`]. Both shipped brokers also
//! make [`Broker::range_trim_head`] atomic. Everything the queue and the
//! result store promise about single delivery rests on those two.
//!
//! ## Implementations
//!
//! - [`MemoryBroker`] - an in-process fake, used by tests and single-process setups
//! - `RedisBroker` - a Redis-backed broker (requires the `redis` feature)

use std::time::Duration;
use async_trait::async_trait;

mod memory;

#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
#[cfg(feature = "redis")]
/// Redis broker implementation.
///
/// This module is only available when the `redis` feature flag is enabled.
mod redis;

pub use memory::MemoryBroker;

#[cfg(feature = "redis")]
pub use self::redis::RedisBroker;

/// Errors surfaced by a broker. The core never retries them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker command error: {0}")]
    Command(String),
}

/// Result alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// The storage primitives the queue and result store are built on.
///
/// Values are opaque bytes; encoding is the caller's concern.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Append `value` to the tail of `list`, creating the list if needed.
    async fn push_tail(&self, list: &str, value: Vec<u8>) -> BrokerResult<()>;

    /// Atomically remove and return up to `count` values from the head of `list`.
    ///
    /// Concurrent callers never observe the same value. An empty or missing
    /// list yields an empty vector.
    async fn pop_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>>;

    /// Return up to `count` values from the head of `list` without removing them.
    async fn range_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>>;

    /// Drop the first `count` values of `list`.
    async fn trim_head(&self, list: &str, count: usize) -> BrokerResult<()>;

    /// Return up to `count` values from the head of `list` and drop them, as
    /// one step.
    ///
    /// The default issues [`range_head`](Broker::range_head) and then
    /// [`trim_head`](Broker::trim_head) as two separate calls, so concurrent
    /// callers may see overlapping values. Implementations that can run both
    /// inside one transaction should override it.
    async fn range_trim_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        let values = self.range_head(list, count).await?;
        if !values.is_empty() {
            self.trim_head(list, values.len()).await?;
        }
        Ok(values)
    }

    /// Number of values currently held in `list`.
    async fn list_len(&self, list: &str) -> BrokerResult<usize>;

    /// Write `value` under `key`, overwriting any existing value, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BrokerResult<()>;

    /// Read the live value under `key`, if any.
    async fn get(&self, key: &str) -> BrokerResult<Option<Vec<u8>>>;

    /// Delete `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> BrokerResult<bool>;

    /// Atomically read and delete `key`.
    ///
    /// Of any number of concurrent callers, at most one receives the value.
    async fn take(&self, key: &str) -> BrokerResult<Option<Vec<u8>>>;
}

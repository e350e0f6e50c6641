use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use crate::broker::Broker;
use crate::communication::ItemId;
use crate::error::{Error, Result};

/// # ResultStore
///
/// Self-expiring results keyed by the originating item's id.
///
/// A result exists until whichever comes first: a destructive read through
/// [`take_if_ready`](ResultStore::take_if_ready), or the TTL given to
/// [`publish`](ResultStore::publish). Nothing is retained indefinitely.
pub struct ResultStore<B> {
    broker: Arc<B>,
    key_prefix: String,
}

impl<B> Clone for ResultStore<B> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            key_prefix: self.key_prefix.clone(),
        }
    }
}

impl<B> fmt::Debug for ResultStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl<B: Broker> ResultStore<B> {
    /// Creates a store that keys results by the bare item id.
    pub fn new(broker: Arc<B>) -> Self {
        Self::with_prefix(broker, "")
    }

    /// Creates a store that keys results as `<prefix><id>`.
    pub fn with_prefix(broker: Arc<B>, key_prefix: impl Into<String>) -> Self {
        Self {
            broker,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, id: ItemId) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Writes `result` under `id`, overwriting any previous value, expiring after `ttl`.
    #[instrument(skip(self, result), fields(id = %id, ttl_ms = ttl.as_millis() as u64), err)]
    pub async fn publish<R: Serialize>(&self, id: ItemId, result: &R, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(result).map_err(Error::Encode)?;
        self.broker.set_with_ttl(&self.key(id), bytes, ttl).await?;
        Ok(())
    }

    /// Reads and deletes the result for `id` if one is ready.
    ///
    /// Returns `Ok(None)` when nothing has been published (or it expired).
    /// Never waits for a result to arrive. Of several concurrent readers, at
    /// most one sees the value.
    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn take_if_ready<R: DeserializeOwned>(&self, id: ItemId) -> Result<Option<R>> {
        match self.broker.take(&self.key(id)).await? {
            None => Ok(None),
            Some(bytes) => {
                debug!("result delivered");
                serde_json::from_slice(&bytes).map(Some).map_err(Error::Decode)
            }
        }
    }
}

//! Crate-level error type.
//!
//! Each concern keeps its own error enum ([`BrokerError`], [`TransformError`],
//! [`ConfigError`]); [`Error`] is what the queue, result store, worker and
//! submitter hand back to callers.

use crate::broker::BrokerError;
use crate::communication::ItemId;
use crate::config::ConfigError;
use crate::worker::TransformError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The broker was unreachable or rejected a command.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// An item or result could not be serialized for the broker.
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// A queue entry or stored result could not be deserialized.
    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),

    /// No result was published for `id` within the producer's polling bounds.
    #[error("timed out waiting for result of {id} after {attempts} attempt(s)")]
    TimedOut { id: ItemId, attempts: u32 },

    /// The compute transform rejected a batch.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker loop task ended abnormally (panic or cancellation).
    #[error("worker task stopped: {0}")]
    WorkerStopped(String),
}

impl Error {
    /// Whether this error is the producer-side timeout outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }
}

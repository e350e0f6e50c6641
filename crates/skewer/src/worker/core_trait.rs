use async_trait::async_trait;

/// Failure modes of a [`BatchTransform`].
///
/// Every variant aborts the whole batch: none of its items get a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The batch could not be processed (for example a malformed payload).
    /// The worker logs it and moves on to the next batch.
    #[error("batch rejected: {0}")]
    Batch(String),

    /// An unrecoverable resource fault (device lost, out of memory). The
    /// worker stops and reports it.
    #[error("resource fault: {0}")]
    Resource(String),

    /// The transform returned a different number of results than it was given.
    #[error("transform returned {actual} result(s) for a batch of {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl TransformError {
    /// Whether the worker should stop rather than continue with the next batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransformError::Resource(_))
    }
}

/// Defines the compute step applied to each claimed batch.
///
/// The transform is opaque to the queue: it receives the payloads of one batch
/// in claim order and must return exactly one result per payload, in the same
/// order. Results are paired with items by position, not by id.
///
/// # Type Parameters
///
/// * `P` - The payload type carried by queued items
/// * `R` - The result type published for each item
///
/// # Example
///
/// ```ignore
/// use skewer::worker::{BatchTransform, TransformError};
/// use async_trait::async_trait;
///
/// struct Lengths;
///
/// #[async_trait]
/// impl BatchTransform<String, usize> for Lengths {
///     async fn forward(&self, batch: Vec<String>) -> Result<Vec<usize>, TransformError> {
///         Ok(batch.iter().map(String::len).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchTransform<P, R>: Send + Sync + 'static
where P: Send + 'static, R: Send + 'static
{
    /// Processes one batch.
    ///
    /// # Parameters
    ///
    /// * `batch` - The payloads of the claimed items, oldest first
    ///
    /// # Returns
    ///
    /// One result per input position, or an error that aborts the batch.
    ///
    /// # Async Behavior
    ///
    /// CPU-heavy transforms should move their work off the async executor
    /// (e.g. with `tokio::task::spawn_blocking`) so the worker's timers keep
    /// running.
    async fn forward(&self, batch: Vec<P>) -> Result<Vec<R>, TransformError>;
}

/// Adapts a synchronous closure into a [`BatchTransform`].
pub struct FnTransform<F>(pub F);

#[async_trait]
impl<F, P, R> BatchTransform<P, R> for FnTransform<F>
where
    F: Fn(Vec<P>) -> Result<Vec<R>, TransformError> + Send + Sync + 'static,
    P: Send + 'static,
    R: Send + 'static,
{
    async fn forward(&self, batch: Vec<P>) -> Result<Vec<R>, TransformError> {
        (self.0)(batch)
    }
}

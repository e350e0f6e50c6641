//! # Worker Loop
//!
//! The consumer half of the protocol.
//!
//! ## Overview
//!
//! A worker continuously drains the shared queue in bounded batches, hands
//! each batch to an opaque [`BatchTransform`], and publishes one result per
//! item under the item's id with a bounded lifetime.
//!
//! ## Key Components
//!
//! * [`BatchTransform`] - The compute step: ordered payloads in, ordered results out
//! * [`BatchWorker`] - Drives the claim/process/publish cycle
//! * [`WorkerState`] - The states the loop moves through
//!
//! ## Failure semantics
//!
//! - A rejected batch ([`TransformError::Batch`] or a result count mismatch) is
//!   dropped whole; its producers simply time out.
//! - A [`TransformError::Resource`] fault stops the loop and is returned from
//!   the worker handle.
//! - Broker errors are logged; the loop idles before trying again.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use skewer::broker::MemoryBroker;
//! use skewer::config::WorkerConfig;
//! use skewer::core::{JobQueue, ResultStore};
//! use skewer::worker::{BatchWorker, FnTransform, TransformError};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let broker = Arc::new(MemoryBroker::new());
//! let worker = BatchWorker::new(
//!     JobQueue::new(broker.clone(), "image_queue"),
//!     ResultStore::new(broker.clone()),
//!     FnTransform(|batch: Vec<String>| -> Result<Vec<usize>, TransformError> {
//!         Ok(batch.iter().map(String::len).collect())
//!     }),
//!     WorkerConfig::default(),
//! );
//!
//! let handle = worker.spawn();
//! // ... producers submit through the same broker ...
//! handle.stop().await.unwrap();
//! # }
//! ```

mod batcher;
mod core_trait;
mod state;

pub use batcher::BatchWorker;
pub use core_trait::{BatchTransform, FnTransform, TransformError};
pub use state::{CycleOutcome, Transition, WorkerState};

//! # Core Protocol
//!
//! The core module provides the broker-facing halves of the coordination
//! protocol, plus the handle that owns a running worker task.
//!
//! ## Module Structure
//!
//! * [`queue`] - The shared job queue. Producers append items to the tail; workers
//!   claim bounded batches from the head, either with an atomic multi-pop or with the
//!   single-worker read-then-trim sequence (see [`ClaimMode`]).
//!
//! * [`results`] - The result store. Results are published under their item's id with
//!   a TTL and consumed with a destructive read.
//!
//! * [`worker`] - Background worker management. The `BatchWorkerHandle` type offers a
//!   convenient interface for spawning, waking, and gracefully shutting down the
//!   worker loop.
//!
//! Producer and worker never talk to each other directly; the broker behind
//! these types is the only shared state.
pub mod queue;
pub mod results;
pub mod worker;

pub use queue::{ClaimMode, JobQueue};
pub use results::ResultStore;
pub use worker::BatchWorkerHandle;

//! # Skewer
//!
//! A broker-coordinated batch queue: producers that do not know about each
//! other have their work gathered into batches by a worker process, and each
//! producer gets back exactly its own result.
//!
//! ## Overview
//!
//! Producers and workers never talk to one another directly. Everything flows
//! through a shared key/list store (the broker):
//!
//! - A producer appends an item tagged with a fresh correlation id to a named
//!   FIFO list, then polls the store for a result stored under that id.
//! - A worker repeatedly claims up to `max_batch_size` items from the head of
//!   the list, runs one batched transform over their payloads, and publishes
//!   each output under the corresponding id with a time-to-live.
//! - The first successful read of a result deletes it.
//!
//! Any number of producers and workers may run concurrently, in one process
//! or many, as long as they share a broker.
//!
//! ## Architecture
//!
//! ### Broker
//!
//! The [`Broker`](broker::Broker) trait is the minimal set of list and
//! key/value commands the protocol needs. [`MemoryBroker`](broker::MemoryBroker)
//! implements it in-process; `RedisBroker` implements it over Redis behind the
//! `redis` feature.
//!
//! ### Queue and Result Store
//!
//! [`JobQueue`](core::JobQueue) and [`ResultStore`](core::ResultStore) layer the
//! protocol over a broker: serialized [`Item`]s on one list, and expiring
//! result values keyed by [`ItemId`].
//!
//! ### Worker
//!
//! A [`BatchWorker`](worker::BatchWorker) drives the claim, transform and
//! publish cycle around a user-supplied
//! [`BatchTransform`](worker::BatchTransform). Spawning it yields a
//! [`BatchWorkerHandle`](core::BatchWorkerHandle) that stops the loop when
//! dropped.
//!
//! ### Submission
//!
//! A [`Submitter`](submit::Submitter) enqueues payloads and polls for their
//! results, bounded by an attempt budget and an optional wall-clock timeout.
//!
//! ## Features
//!
//! - **redis** - Enables the Redis broker
//!
//! ## Delivery Guarantees
//!
//! Claiming is at-most-once: an item removed from the queue by a worker that
//! then crashes is lost, and its producer times out. Results that nobody reads
//! expire after their TTL.

pub mod broker;
pub mod communication;
pub mod config;
pub mod core;
pub mod error;
pub mod submit;
pub mod telemetry;
pub mod worker;


pub use communication::{Item, ItemId, Ticket};
pub use config::Config;
pub use error::{Error, Result};

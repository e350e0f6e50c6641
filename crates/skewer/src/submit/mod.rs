//! # Submission and Await
//!
//! The producer half of the protocol.
//!
//! A producer never talks to a worker. It appends an [`Item`](crate::communication::Item)
//! with a fresh id to the shared queue, then polls the result store for that id:
//!
//! 1. [`Submitter::submit`] enqueues and returns a [`Ticket`](crate::communication::Ticket)
//! 2. [`Submitter::await_result`] polls until the result is delivered or a bound trips
//! 3. [`Submitter::run`] does both
//!
//! This is polling, not push: a producer needs no listener, socket, or
//! subscription. Observed latency is at least one broker round trip and at
//! most `max_attempts × poll_interval`, plus however long the worker takes
//! to reach the item.

mod state;
mod submitter;

pub use state::AwaitState;
pub use submitter::Submitter;

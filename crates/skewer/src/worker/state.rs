use std::fmt;
use crate::communication::{Item, ItemId};

/// Where the worker loop is within one claim/process/publish cycle.
///
/// ```text
///   Idle ──▶ Claiming ──(empty / broker down)──▶ Idle
///               │
///               ▼
///          Processing ──(batch rejected)──▶ Claiming
///               │
///               ▼
///          Publishing ──▶ Claiming
/// ```
///
/// Only `Idle` waits; every other state moves on as soon as its broker or
/// transform call returns.
#[derive(Debug)]
pub enum WorkerState<P, R> {
    /// Nothing to do; the loop sleeps for the idle interval before claiming again.
    Idle,

    /// About to claim the next batch.
    Claiming,

    /// A claimed batch, in claim order, waiting for the transform.
    Processing(Vec<Item<P>>),

    /// Transform output paired positionally with the ids it belongs to.
    Publishing { ids: Vec<ItemId>, results: Vec<R> },
}

impl<P, R> WorkerState<P, R> {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Claiming => "claiming",
            WorkerState::Processing(_) => "processing",
            WorkerState::Publishing { .. } => "publishing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, WorkerState::Idle)
    }

    /// Whether no claimed batch is held in this state.
    pub fn is_between_cycles(&self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Claiming)
    }
}

/// How a completed cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue was empty.
    Idle,

    /// Every item of the batch got a published result.
    Published(usize),

    /// The transform rejected the batch; none of its items got a result.
    Dropped(usize),

    /// A claimed entry could not be decoded; the batch was discarded.
    Malformed,

    /// The broker failed mid-cycle. Any unpublished results were discarded.
    Unavailable,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Idle => f.write_str("idle"),
            CycleOutcome::Published(n) => write!(f, "published {n}"),
            CycleOutcome::Dropped(n) => write!(f, "dropped {n}"),
            CycleOutcome::Malformed => f.write_str("malformed batch"),
            CycleOutcome::Unavailable => f.write_str("broker unavailable"),
        }
    }
}

/// The result of a single state step.
#[derive(Debug)]
pub struct Transition<P, R> {
    /// The state to continue from
    pub next: WorkerState<P, R>,

    /// Set when this step finished a cycle
    pub outcome: Option<CycleOutcome>,
}

impl<P, R> Transition<P, R> {
    pub(crate) fn to(next: WorkerState<P, R>) -> Self {
        Self { next, outcome: None }
    }

    pub(crate) fn finish(next: WorkerState<P, R>, outcome: CycleOutcome) -> Self {
        Self { next, outcome: Some(outcome) }
    }
}

use std::marker::PhantomData;
use tokio::time::Instant;
use super::ItemId;

/// # Ticket
///
/// A receipt for an enqueued item, handed back by
/// [`Submitter::submit`](crate::submit::Submitter::submit).
///
/// A ticket carries only the correlation id and the time of submission; the
/// result itself is fetched by polling the result store with
/// [`Submitter::await_result`](crate::submit::Submitter::await_result).
/// Dropping a ticket abandons the result, which then expires on its own.
///
/// ## Type Parameters
///
/// * `R` - The result type the ticket will resolve to
#[derive(Debug)]
pub struct Ticket<R> {
    id: ItemId,
    submitted_at: Instant,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Ticket<R> {
    pub(crate) fn new(id: ItemId) -> Self {
        Self {
            id,
            submitted_at: Instant::now(),
            _marker: PhantomData,
        }
    }

    /// The id the result will be published under.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// When the item was enqueued.
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }
}

impl<R> Clone for Ticket<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            submitted_at: self.submitted_at,
            _marker: PhantomData,
        }
    }
}

//! # Item Module
//!
//! This module provides [`Item`], the unit of work that travels through the
//! shared queue, and [`ItemId`], the correlation identifier that ties an item
//! to the result the worker publishes for it.
//!
//! ## Wire format
//!
//! Items are stored in the broker as JSON objects:
//!
//! ```json
//! {"id": "6f1c0f5e-8d7d-4e53-9d3a-7d0f7a3c1b22", "payload": ...}
//! ```
//!
//! The payload is whatever the caller's type serializes to.

use std::fmt;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use crate::error::{Error, Result};

/// Correlation identifier generated fresh for every submission.
///
/// Uniqueness is what keeps one producer from reading another's result; a
/// random v4 UUID makes a collision with an unexpired result negligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit of submitted work: a correlation id plus an opaque payload.
///
/// Items are immutable once enqueued. The queue preserves their order, and the
/// worker relies on that order to pair each item with the transform output at
/// the same position.
///
/// ## Type Parameters
///
/// * `P` - The payload type. It only needs to round-trip through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item<P> {
    /// Correlation id, also the key the result is published under
    id: ItemId,

    /// The input for the compute transform
    payload: P,
}

impl<P> Item<P> {
    /// Creates an item with a freshly generated id.
    pub fn new(payload: P) -> Self {
        Self::with_id(ItemId::new(), payload)
    }

    /// Creates an item with a caller-chosen id.
    pub fn with_id(id: ItemId, payload: P) -> Self {
        Self { id, payload }
    }

    /// Returns the correlation id of this item.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns a reference to the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Splits the item into its id and payload.
    pub fn into_parts(self) -> (ItemId, P) {
        (self.id, self.payload)
    }
}

impl<P: Serialize> Item<P> {
    /// Serializes the item into the bytes stored in the queue.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }
}

impl<P: DeserializeOwned> Item<P> {
    /// Reconstructs an item from a queue entry.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::Decode)
    }
}

// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Durable record shapes and the read-side stream types.
//!
//! The archived forms ([`StoredEventRecord`], [`CommitRecord`]) carry ids as
//! `u128` so the whole commit document stays rkyv-friendly; the public API
//! speaks [`Uuid`].

use std::time::{SystemTime, UNIX_EPOCH};

use rkyv::{Archive, Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::EventPayload;

/// Version tag of a payload's shape, used by the codec to select a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One domain event as persisted inside a commit document.
///
/// `payload` is opaque serialized event data; this layer never interprets it.
/// `timestamp_ms` is informational only and never used for ordering.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(attr(derive(Debug)))]
pub struct StoredEventRecord {
    pub event_id: u128,
    pub aggregate_id: u128,
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub schema: u32,
    pub payload: Vec<u8>,
}

/// The atomic durable unit: a commit id plus its ordered events.
///
/// A commit may in principle span multiple aggregates; the writer in this
/// crate always builds one commit per write request. Commits are immutable
/// once written and visible to readers all-or-nothing.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(attr(derive(Debug)))]
pub struct CommitRecord {
    pub commit_id: u128,
    pub events: Vec<StoredEventRecord>,
}

impl CommitRecord {
    pub fn commit_uuid(&self) -> Uuid {
        Uuid::from_u128(self.commit_id)
    }
}

/// A producer-supplied event that has not been committed yet.
#[derive(Debug)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub payload: Box<dyn EventPayload>,
}

impl UncommittedEvent {
    /// Creates an uncommitted event with a fresh event id and the current
    /// wall-clock timestamp.
    pub fn new(aggregate_id: Uuid, sequence: u64, payload: Box<dyn EventPayload>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence,
            timestamp_ms: now_ms(),
            payload,
        }
    }
}

/// A stored event paired with the commit that made it durable, payload
/// decoded through the codec.
#[derive(Debug)]
pub struct CommittedEvent {
    pub commit_id: Uuid,
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub schema: SchemaVersion,
    pub payload: Box<dyn EventPayload>,
}

/// The read-side reconstruction result for one aggregate.
///
/// Events are filtered to the requested aggregate, span the requested
/// inclusive version range, and are ordered by `sequence` ascending.
#[derive(Debug)]
pub struct CommittedEventStream {
    pub aggregate_id: Uuid,
    pub events: Vec<CommittedEvent>,
}

impl CommittedEventStream {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommittedEvent> {
        self.events.iter()
    }

    /// The sequence numbers of the stream, in returned order.
    pub fn sequences(&self) -> Vec<u64> {
        self.events.iter().map(|e| e.sequence).collect()
    }
}

impl IntoIterator for CommittedEventStream {
    type Item = CommittedEvent;
    type IntoIter = std::vec::IntoIter<CommittedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Generates a fresh, time-ordered commit id (UUID v7).
///
/// Time ordering keeps neighboring commits close together in the backend's
/// primary key space. Callers generate one id per `store` call and may reuse
/// it only to retry that same call.
pub fn new_commit_id() -> Uuid {
    Uuid::now_v7()
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Read path: locate, filter and totally order one aggregate's events across
//! all commits that touch it.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::codec::PayloadCodec;
use crate::error::{Error, Result};
use crate::model::{CommittedEvent, CommittedEventStream, SchemaVersion};

/// Reconstructs a [`CommittedEventStream`] for an aggregate over an inclusive
/// version range.
///
/// The backend returns whole commit documents; a single commit may contain
/// events for other aggregates or out-of-range sequences, and those must not
/// leak into the result. Sequence order is authoritative regardless of commit
/// arrival order.
pub struct StreamReader {
    backend: Arc<dyn StorageBackend>,
    codec: Arc<PayloadCodec>,
}

impl StreamReader {
    pub fn new(backend: Arc<dyn StorageBackend>, codec: Arc<PayloadCodec>) -> Self {
        Self { backend, codec }
    }

    /// Returns the aggregate's events with sequence in
    /// `[min_version, max_version]`, ordered by sequence ascending.
    ///
    /// An aggregate with no matching events yields an empty stream, not an
    /// error. Decoding is strict: one unregistered schema fails the whole
    /// read rather than silently truncating history. Duplicate sequences
    /// (a writer-layer bug) are returned as-is, never deduplicated.
    pub fn read_from(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
        max_version: u64,
    ) -> Result<CommittedEventStream> {
        if aggregate_id.is_nil() {
            return Err(Error::InvalidArgument(
                "aggregate id must not be nil".to_string(),
            ));
        }
        if min_version > max_version {
            return Err(Error::InvalidArgument(format!(
                "min version {min_version} greater than max version {max_version}"
            )));
        }

        let commits = self
            .backend
            .commits_matching(aggregate_id, min_version, max_version)?;

        let wanted = aggregate_id.as_u128();
        let mut events = Vec::new();
        for commit in &commits {
            for event in &commit.events {
                if event.aggregate_id != wanted
                    || event.sequence < min_version
                    || event.sequence > max_version
                {
                    continue;
                }
                let schema = SchemaVersion(event.schema);
                let payload = self.codec.decode(schema, &event.payload)?;
                events.push(CommittedEvent {
                    commit_id: commit.commit_uuid(),
                    event_id: Uuid::from_u128(event.event_id),
                    aggregate_id,
                    sequence: event.sequence,
                    timestamp_ms: event.timestamp_ms,
                    schema,
                    payload,
                });
            }
        }

        // Stable sort: duplicates keep their commit order and stay visible.
        events.sort_by_key(|event| event.sequence);

        #[cfg(feature = "log")]
        tracing::debug!(
            aggregate_id = %aggregate_id,
            min_version,
            max_version,
            commits = commits.len(),
            events = events.len(),
            "stream read"
        );

        Ok(CommittedEventStream {
            aggregate_id,
            events,
        })
    }
}

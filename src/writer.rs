// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Commit/write path: one write request becomes one durable commit document.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::codec::PayloadCodec;
use crate::error::{Error, Result};
use crate::model::{CommitRecord, StoredEventRecord, UncommittedEvent};

/// Builds a [`CommitRecord`] from a batch of new events and persists it
/// atomically via the backend port.
///
/// The write is an upsert by commit id, so retrying a failed call with the
/// same `commit_id` is idempotent. The writer itself never retries; retry
/// policy belongs to the caller. No optimistic-concurrency validation is
/// performed on `(aggregate, sequence)` pairs — see DESIGN.md.
pub struct CommitWriter {
    backend: Arc<dyn StorageBackend>,
    codec: Arc<PayloadCodec>,
}

impl CommitWriter {
    pub fn new(backend: Arc<dyn StorageBackend>, codec: Arc<PayloadCodec>) -> Self {
        Self { backend, codec }
    }

    /// Persists `events` as one commit identified by `commit_id`.
    ///
    /// The batch must be non-empty and `aggregate_id` must be a real
    /// identity. The caller guarantees `commit_id` is generated fresh per
    /// call and only ever reused to retry this same call.
    pub fn store(
        &self,
        aggregate_id: Uuid,
        commit_id: Uuid,
        events: Vec<UncommittedEvent>,
    ) -> Result<()> {
        if aggregate_id.is_nil() {
            return Err(Error::InvalidArgument(
                "aggregate id must not be nil".to_string(),
            ));
        }
        if events.is_empty() {
            return Err(Error::InvalidArgument(
                "event batch must not be empty".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(events.len());
        for event in &events {
            let (schema, payload) = self.codec.encode(&*event.payload)?;
            records.push(StoredEventRecord {
                event_id: event.event_id.as_u128(),
                aggregate_id: event.aggregate_id.as_u128(),
                sequence: event.sequence,
                timestamp_ms: event.timestamp_ms,
                schema: schema.get(),
                payload,
            });
        }

        let record = CommitRecord {
            commit_id: commit_id.as_u128(),
            events: records,
        };
        self.backend.upsert_commit(&record)?;

        #[cfg(feature = "log")]
        tracing::debug!(
            aggregate_id = %aggregate_id,
            commit_id = %commit_id,
            event_count = events.len(),
            "commit stored"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::{PayloadCodec, PayloadRegistration};
    use crate::model::new_commit_id;
    use rkyv::{Archive, Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
    #[rkyv(attr(derive(Debug)))]
    pub struct Noted {
        pub text: String,
    }

    crate::payload_type!(Noted, schema = 1);

    fn writer(backend: Arc<MemoryBackend>) -> CommitWriter {
        let codec = PayloadCodec::register_all([PayloadRegistration::of::<Noted>()]);
        CommitWriter::new(backend, Arc::new(codec))
    }

    fn noted(aggregate_id: Uuid, sequence: u64) -> UncommittedEvent {
        UncommittedEvent::new(
            aggregate_id,
            sequence,
            Box::new(Noted {
                text: format!("note {sequence}"),
            }),
        )
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let writer = writer(Arc::new(MemoryBackend::new()));
        let err = writer
            .store(Uuid::from_u128(1), new_commit_id(), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_nil_aggregate_is_rejected() {
        let writer = writer(Arc::new(MemoryBackend::new()));
        let events = vec![noted(Uuid::nil(), 1)];
        let err = writer.store(Uuid::nil(), new_commit_id(), events).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_store_builds_one_commit_per_call() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = writer(Arc::clone(&backend));
        let aggregate = Uuid::from_u128(42);

        writer
            .store(aggregate, new_commit_id(), vec![noted(aggregate, 1), noted(aggregate, 2)])
            .unwrap();
        writer
            .store(aggregate, new_commit_id(), vec![noted(aggregate, 3)])
            .unwrap();

        assert_eq!(backend.commit_count(), 2);
    }

    #[test]
    fn test_unregistered_payload_fails_the_write() {
        #[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
        #[rkyv(attr(derive(Debug)))]
        pub struct Stray {
            pub n: u32,
        }
        crate::payload_type!(Stray, schema = 77);

        let backend = Arc::new(MemoryBackend::new());
        let writer = writer(Arc::clone(&backend));
        let aggregate = Uuid::from_u128(1);

        let events = vec![UncommittedEvent::new(
            aggregate,
            1,
            Box::new(Stray { n: 9 }),
        )];
        let err = writer.store(aggregate, new_commit_id(), events).unwrap_err();
        assert!(matches!(err, Error::SchemaNotRegistered(_)));
        assert_eq!(backend.commit_count(), 0);
    }
}

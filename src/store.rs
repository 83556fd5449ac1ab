// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! The producer-facing event store: `store` and `read_from`, nothing else.

use std::sync::Arc;
use std::thread;

use uuid::Uuid;

use crate::backend::{IndexSpec, StorageBackend};
use crate::codec::{PayloadCodec, PayloadRegistration, PayloadType};
use crate::error::Result;
use crate::model::{CommittedEventStream, UncommittedEvent};
use crate::reader::StreamReader;
use crate::writer::CommitWriter;

/// A handle over one backend: commit writer plus stream reader.
///
/// Construction is the only concurrent step in the core: the backend index
/// check and the payload registration pass run in parallel, and both must
/// complete before the store answers its first request. After that the codec
/// registry is read-only, so the handle is freely shared across threads.
pub struct EventStore {
    writer: CommitWriter,
    reader: StreamReader,
}

impl EventStore {
    pub fn builder(backend: Arc<dyn StorageBackend>) -> EventStoreBuilder {
        EventStoreBuilder {
            backend,
            registrations: Vec::new(),
            index: IndexSpec::default(),
        }
    }

    /// Persists `events` as one atomically-visible commit. Blocking;
    /// see [`CommitWriter::store`].
    pub fn store(
        &self,
        aggregate_id: Uuid,
        commit_id: Uuid,
        events: Vec<UncommittedEvent>,
    ) -> Result<()> {
        self.writer.store(aggregate_id, commit_id, events)
    }

    /// Reconstructs the aggregate's ordered event stream over
    /// `[min_version, max_version]`. Blocking; see
    /// [`StreamReader::read_from`].
    pub fn read_from(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
        max_version: u64,
    ) -> Result<CommittedEventStream> {
        self.reader.read_from(aggregate_id, min_version, max_version)
    }
}

/// Collects the payload initialization list and index spec, then builds the
/// store.
pub struct EventStoreBuilder {
    backend: Arc<dyn StorageBackend>,
    registrations: Vec<PayloadRegistration>,
    index: IndexSpec,
}

impl EventStoreBuilder {
    /// Adds one payload shape to the initialization list.
    pub fn payload<T: PayloadType>(mut self) -> Self {
        self.registrations.push(PayloadRegistration::of::<T>());
        self
    }

    /// Adds a whole initialization list at once.
    pub fn registrations(
        mut self,
        registrations: impl IntoIterator<Item = PayloadRegistration>,
    ) -> Self {
        self.registrations.extend(registrations);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.index = index;
        self
    }

    /// Runs the two startup tasks and assembles the store.
    ///
    /// A failure in either task is fatal: there is no store that cannot
    /// register its payload types or guarantee its index is usable.
    pub fn build(self) -> Result<EventStore> {
        let Self {
            backend,
            registrations,
            index,
        } = self;

        let codec = thread::scope(|s| -> Result<PayloadCodec> {
            let backend_ref = backend.as_ref();
            let index_ref = &index;
            let index_task = s.spawn(move || backend_ref.ensure_index(index_ref));
            let codec_task = s.spawn(move || PayloadCodec::register_all(registrations));

            let codec = match codec_task.join() {
                Ok(codec) => codec,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            match index_task.join() {
                Ok(result) => result?,
                Err(panic) => std::panic::resume_unwind(panic),
            }
            Ok(codec)
        })?;

        #[cfg(feature = "log")]
        tracing::info!(payload_shapes = codec.registered_count(), "event store ready");

        let codec = Arc::new(codec);
        Ok(EventStore {
            writer: CommitWriter::new(Arc::clone(&backend), Arc::clone(&codec)),
            reader: StreamReader::new(backend, codec),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::Error;
    use crate::model::CommitRecord;
    use rkyv::{Archive, Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
    #[rkyv(attr(derive(Debug)))]
    pub struct Pinged {
        pub n: u32,
    }

    crate::payload_type!(Pinged, schema = 1);

    struct BrokenIndexBackend;

    impl StorageBackend for BrokenIndexBackend {
        fn ensure_index(&self, _index: &IndexSpec) -> Result<()> {
            Err(Error::BackendUnavailable("index build failed".to_string()))
        }

        fn upsert_commit(&self, _record: &CommitRecord) -> Result<()> {
            Ok(())
        }

        fn commits_matching(
            &self,
            _aggregate_id: Uuid,
            _min_version: u64,
            _max_version: u64,
        ) -> Result<Vec<CommitRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_build_runs_both_startup_tasks() {
        let store = EventStore::builder(Arc::new(MemoryBackend::new()))
            .payload::<Pinged>()
            .build()
            .expect("build failed");

        let aggregate = Uuid::from_u128(5);
        store
            .store(
                aggregate,
                crate::model::new_commit_id(),
                vec![UncommittedEvent::new(aggregate, 1, Box::new(Pinged { n: 1 }))],
            )
            .unwrap();
        assert_eq!(store.read_from(aggregate, 1, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_index_failure_is_fatal_to_construction() {
        let result = EventStore::builder(Arc::new(BrokenIndexBackend))
            .payload::<Pinged>()
            .build();
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }

    #[test]
    fn test_duplicate_registrations_collapse() {
        let store = EventStore::builder(Arc::new(MemoryBackend::new()))
            .payload::<Pinged>()
            .payload::<Pinged>()
            .registrations([PayloadRegistration::of::<Pinged>()])
            .build()
            .expect("build failed");

        let aggregate = Uuid::from_u128(9);
        store
            .store(
                aggregate,
                crate::model::new_commit_id(),
                vec![UncommittedEvent::new(aggregate, 1, Box::new(Pinged { n: 7 }))],
            )
            .unwrap();
        let stream = store.read_from(aggregate, 0, u64::MAX).unwrap();
        assert_eq!(stream.sequences(), vec![1]);
    }
}

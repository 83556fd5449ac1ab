// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Full store flow over the LMDB driver: durability across reopen, commit
//! replacement and re-indexing, and duplicate-sequence visibility through the
//! composite index.

use std::sync::Arc;

use rkyv::{Archive, Deserialize, Serialize};
use tempfile::tempdir;
use uuid::Uuid;

use stratadb::backend::LmdbBackend;
use stratadb::model::new_commit_id;
use stratadb::{payload_type, EventStore, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(attr(derive(Debug)))]
pub struct Deposited {
    pub amount: u64,
}

payload_type!(Deposited, schema = 1);

fn open_store(path: &std::path::Path) -> EventStore {
    let backend = LmdbBackend::open(path).expect("Failed to open backend");
    EventStore::builder(Arc::new(backend))
        .payload::<Deposited>()
        .build()
        .expect("Failed to build store")
}

fn deposited(aggregate: Uuid, sequence: u64, amount: u64) -> UncommittedEvent {
    UncommittedEvent::new(aggregate, sequence, Box::new(Deposited { amount }))
}

#[test]
fn test_write_and_read_through_lmdb() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = open_store(dir.path());
    let aggregate = Uuid::from_u128(1);

    store
        .store(
            aggregate,
            new_commit_id(),
            vec![deposited(aggregate, 2, 20), deposited(aggregate, 3, 30)],
        )
        .expect("store failed");
    store
        .store(aggregate, new_commit_id(), vec![deposited(aggregate, 1, 10)])
        .expect("store failed");

    let stream = store.read_from(aggregate, 1, 3).expect("read failed");
    assert_eq!(stream.sequences(), vec![1, 2, 3]);
    let amounts: Vec<u64> = stream
        .iter()
        .map(|e| {
            e.payload
                .as_any()
                .downcast_ref::<Deposited>()
                .expect("wrong payload type")
                .amount
        })
        .collect();
    assert_eq!(amounts, vec![10, 20, 30]);
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");
    let aggregate = Uuid::from_u128(7);

    {
        let store = open_store(dir.path());
        store
            .store(aggregate, new_commit_id(), vec![deposited(aggregate, 1, 100)])
            .expect("store failed");
    }

    let store = open_store(dir.path());
    let stream = store.read_from(aggregate, 1, 1).expect("read failed");
    assert_eq!(stream.len(), 1);
    assert_eq!(
        stream.events[0]
            .payload
            .as_any()
            .downcast_ref::<Deposited>()
            .expect("wrong payload type")
            .amount,
        100
    );
}

#[test]
fn test_upsert_reindexes_replaced_commit() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = open_store(dir.path());
    let aggregate = Uuid::from_u128(3);
    let commit_id = new_commit_id();

    store
        .store(
            aggregate,
            commit_id,
            vec![deposited(aggregate, 1, 1), deposited(aggregate, 2, 2)],
        )
        .expect("first store failed");
    // Same commit id with a different event set replaces the document; the
    // old sequences must drop out of the index.
    store
        .store(aggregate, commit_id, vec![deposited(aggregate, 9, 9)])
        .expect("replacement failed");

    assert!(store.read_from(aggregate, 1, 2).expect("read failed").is_empty());
    let stream = store.read_from(aggregate, 9, 9).expect("read failed");
    assert_eq!(stream.sequences(), vec![9]);
    assert_eq!(stream.events[0].commit_id, commit_id);
}

#[test]
fn test_duplicate_sequences_survive_the_index() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = open_store(dir.path());
    let aggregate = Uuid::from_u128(4);

    store
        .store(aggregate, new_commit_id(), vec![deposited(aggregate, 5, 50)])
        .expect("store failed");
    store
        .store(aggregate, new_commit_id(), vec![deposited(aggregate, 5, 55)])
        .expect("store failed");

    let stream = store.read_from(aggregate, 5, 5).expect("read failed");
    assert_eq!(stream.sequences(), vec![5, 5]);
}

#[test]
fn test_aggregates_do_not_bleed_across_range_scans() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = open_store(dir.path());
    let a = Uuid::from_u128(0x10);
    let b = Uuid::from_u128(0x11);

    store
        .store(
            a,
            new_commit_id(),
            vec![deposited(a, 1, 1), deposited(b, 1, 2)],
        )
        .expect("store failed");
    store
        .store(b, new_commit_id(), vec![deposited(b, 2, 3)])
        .expect("store failed");

    let stream_a = store.read_from(a, 0, u64::MAX).expect("read A failed");
    assert_eq!(stream_a.sequences(), vec![1]);
    let stream_b = store.read_from(b, 0, u64::MAX).expect("read B failed");
    assert_eq!(stream_b.sequences(), vec![1, 2]);
}

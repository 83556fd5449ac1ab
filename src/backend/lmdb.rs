// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! LMDB document-store driver (via `heed`).
//!
//! Commit documents live in a `commits` database keyed by commit id. A
//! composite secondary index keyed by `aggregate_id + sequence + commit_id`
//! (big-endian) backs the range queries; the commit id is part of the key so
//! that two commits claiming the same `(aggregate, sequence)` pair remain
//! independently reachable.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use heed::byteorder::BE;
use heed::types::{Bytes, U128};
use heed::{Database, Env, EnvOpenOptions};
use uuid::Uuid;

use crate::backend::{IndexSpec, StorageBackend};
use crate::codec;
use crate::error::{Error, Result};
use crate::model::CommitRecord;
use crate::{constants, timed_dbg};

type CommitsDb = Database<U128<BE>, Bytes>;
type StreamIndexDb = Database<Bytes, U128<BE>>;

/// Composite index key: `aggregate_id (16) + sequence (8) + commit_id (16)`.
pub(crate) struct StreamKey {
    aggregate_id: u128,
    sequence: u64,
    commit_id: u128,
}

impl StreamKey {
    pub(crate) fn new(aggregate_id: u128, sequence: u64, commit_id: u128) -> Self {
        Self {
            aggregate_id,
            sequence,
            commit_id,
        }
    }

    pub(crate) fn to_be_bytes(&self) -> [u8; 40] {
        let mut buf = [0u8; 40];
        buf[0..16].copy_from_slice(&self.aggregate_id.to_be_bytes());
        buf[16..24].copy_from_slice(&self.sequence.to_be_bytes());
        buf[24..40].copy_from_slice(&self.commit_id.to_be_bytes());
        buf
    }
}

/// Configuration for opening the LMDB backend.
#[derive(Debug, Clone)]
pub struct LmdbBackendConfig {
    pub path: PathBuf,
    pub map_size: usize,
    pub max_dbs: u32,
    pub create_dir: bool,
}

impl Default for LmdbBackendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stratadb.mdb"),
            map_size: constants::DEFAULT_MAP_SIZE,
            max_dbs: constants::DEFAULT_MAX_DBS,
            create_dir: true,
        }
    }
}

pub struct LmdbBackend {
    env: Env,
    commits: CommitsDb,
    stream_index: StreamIndexDb,
}

impl LmdbBackend {
    /// Opens (or creates) the backend at `path` with default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(LmdbBackendConfig {
            path: path.as_ref().to_path_buf(),
            ..LmdbBackendConfig::default()
        })
    }

    pub fn with_config(config: LmdbBackendConfig) -> Result<Self> {
        if config.create_dir {
            std::fs::create_dir_all(&config.path)
                .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        }

        let env = unsafe {
            EnvOpenOptions::new()
                .read_txn_with_tls()
                .max_dbs(config.max_dbs)
                .map_size(config.map_size)
                .open(&config.path)
                .map_err(heed_err)?
        };

        let (commits, stream_index) = {
            let mut wtxn = env.write_txn().map_err(heed_err)?;
            let commits = env
                .create_database(&mut wtxn, Some(constants::COMMITS_DB_NAME))
                .map_err(heed_err)?;
            let stream_index = env
                .create_database(&mut wtxn, Some(constants::STREAM_INDEX_DB_NAME))
                .map_err(heed_err)?;
            wtxn.commit().map_err(heed_err)?;
            (commits, stream_index)
        };

        Ok(Self {
            env,
            commits,
            stream_index,
        })
    }
}

impl StorageBackend for LmdbBackend {
    fn ensure_index(&self, index: &IndexSpec) -> Result<()> {
        // This driver maintains exactly one composite index over the default
        // field pair; anything else has no backing layout here.
        if index != &IndexSpec::default() {
            return Err(Error::InvalidArgument(format!(
                "unsupported index spec: ({}, {})",
                index.aggregate_field, index.sequence_field
            )));
        }

        let mut wtxn = self.env.write_txn().map_err(heed_err)?;
        let _db: StreamIndexDb = self
            .env
            .create_database(&mut wtxn, Some(constants::STREAM_INDEX_DB_NAME))
            .map_err(heed_err)?;
        wtxn.commit().map_err(heed_err)?;
        Ok(())
    }

    fn upsert_commit(&self, record: &CommitRecord) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(heed_err)?;

        // Replacing an existing commit must not leave its old events
        // reachable through the index.
        let stale = match self
            .commits
            .get(&wtxn, &record.commit_id)
            .map_err(heed_err)?
        {
            Some(bytes) => Some(codec::deserialize::<CommitRecord>(bytes)?),
            None => None,
        };
        if let Some(old) = stale {
            for event in &old.events {
                let key =
                    StreamKey::new(event.aggregate_id, event.sequence, old.commit_id).to_be_bytes();
                self.stream_index
                    .delete(&mut wtxn, &key[..])
                    .map_err(heed_err)?;
            }
        }

        let bytes = codec::serialize(record)?;
        timed_dbg!(
            "put",
            self.commits.put(&mut wtxn, &record.commit_id, &bytes)
        )
        .map_err(heed_err)?;

        for event in &record.events {
            let key =
                StreamKey::new(event.aggregate_id, event.sequence, record.commit_id).to_be_bytes();
            self.stream_index
                .put(&mut wtxn, &key[..], &record.commit_id)
                .map_err(heed_err)?;
        }

        timed_dbg!("commit", wtxn.commit()).map_err(heed_err)?;
        Ok(())
    }

    fn commits_matching(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
        max_version: u64,
    ) -> Result<Vec<CommitRecord>> {
        let aggregate_id = aggregate_id.as_u128();
        let rtxn = self.env.read_txn().map_err(heed_err)?;

        let lower = StreamKey::new(aggregate_id, min_version, 0).to_be_bytes();
        let upper = StreamKey::new(aggregate_id, max_version, u128::MAX).to_be_bytes();
        let range = (Bound::Included(&lower[..]), Bound::Included(&upper[..]));

        // Distinct commit ids first: a commit with several in-range events
        // appears once in the result.
        let mut commit_ids = BTreeSet::new();
        for entry in self.stream_index.range(&rtxn, &range).map_err(heed_err)? {
            let (_key, commit_id) = entry.map_err(heed_err)?;
            commit_ids.insert(commit_id);
        }

        let mut records = Vec::with_capacity(commit_ids.len());
        for commit_id in commit_ids {
            let bytes = self
                .commits
                .get(&rtxn, &commit_id)
                .map_err(heed_err)?
                .ok_or_else(|| {
                    Error::BackendUnavailable(format!(
                        "index points at missing commit {commit_id:032x}"
                    ))
                })?;
            records.push(codec::deserialize::<CommitRecord>(bytes)?);
        }
        Ok(records)
    }
}

fn heed_err(e: heed::Error) -> Error {
    Error::BackendUnavailable(e.to_string())
}

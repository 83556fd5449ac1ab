// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory reference backend.
//!
//! Keeps whole commit documents in a `BTreeMap` keyed by commit id. Intended
//! for tests and as the smallest possible example of the port contract.

use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::backend::{IndexSpec, StorageBackend};
use crate::error::Result;
use crate::model::CommitRecord;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    commits: RwLock<std::collections::BTreeMap<u128, CommitRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored commits, mainly for test assertions.
    pub fn commit_count(&self) -> usize {
        self.commits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl StorageBackend for MemoryBackend {
    fn ensure_index(&self, _index: &IndexSpec) -> Result<()> {
        // Range queries scan the map directly; there is no index to build.
        Ok(())
    }

    fn upsert_commit(&self, record: &CommitRecord) -> Result<()> {
        let mut commits = self
            .commits
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        commits.insert(record.commit_id, record.clone());
        Ok(())
    }

    fn commits_matching(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
        max_version: u64,
    ) -> Result<Vec<CommitRecord>> {
        let aggregate_id = aggregate_id.as_u128();
        let commits = self
            .commits
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let matching = commits
            .values()
            .filter(|commit| {
                commit.events.iter().any(|event| {
                    event.aggregate_id == aggregate_id
                        && event.sequence >= min_version
                        && event.sequence <= max_version
                })
            })
            .cloned()
            .collect();
        Ok(matching)
    }
}

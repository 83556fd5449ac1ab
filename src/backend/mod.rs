// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Storage backend port: the minimal interface the core needs from an
//! underlying document store. Connection management, indexing machinery and
//! wire protocol all live behind this seam.

pub mod lmdb;
pub mod memory;

use uuid::Uuid;

use crate::constants;
use crate::error::Result;
use crate::model::CommitRecord;

pub use lmdb::{LmdbBackend, LmdbBackendConfig};
pub use memory::MemoryBackend;

/// The composite per-event index a backend must maintain for range queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub aggregate_field: &'static str,
    pub sequence_field: &'static str,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            aggregate_field: constants::AGGREGATE_ID_FIELD,
            sequence_field: constants::SEQUENCE_FIELD,
        }
    }
}

/// Abstract document-store driver consumed by the core.
///
/// Every call may block on backend I/O. Implementations translate their
/// native failures into the crate error taxonomy; the core never swallows
/// them.
pub trait StorageBackend: Send + Sync {
    /// Ensures the per-event range index exists. Idempotent; safe to call at
    /// every store startup.
    fn ensure_index(&self, index: &IndexSpec) -> Result<()>;

    /// Replace-or-insert a commit document by its commit id. Must be atomic
    /// from the point of view of any reader: no partial commit is ever
    /// visible.
    fn upsert_commit(&self, record: &CommitRecord) -> Result<()>;

    /// Returns every commit document containing at least one event for
    /// `aggregate_id` with sequence in `[min_version, max_version]`.
    ///
    /// Whole documents are returned; exact sub-range filtering happens in the
    /// core, because a commit can mix aggregates and ranges.
    fn commits_matching(
        &self,
        aggregate_id: Uuid,
        min_version: u64,
        max_version: u64,
    ) -> Result<Vec<CommitRecord>>;
}

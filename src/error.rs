// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::model::SchemaVersion;

/// Custom error type for StrataDB operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller bug: empty batch, nil aggregate identity, or inverted range.
    /// Never retried automatically.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No decoder registered for the payload's schema version.
    /// Fatal for the affected read, not for the store.
    #[error("Schema not registered: {0}")]
    SchemaNotRegistered(SchemaVersion),

    /// Backend transport/connectivity failure. Writes are safe to retry
    /// verbatim (upsert by commit id); reads are always safe to retry.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend-side rejection not caused by unavailability.
    /// Not retried with the same inputs.
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// Payload or commit document (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rkyv::rancor::Error> for Error {
    fn from(e: rkyv::rancor::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

pub const COMMITS_DB_NAME: &str = "commits";
pub const STREAM_INDEX_DB_NAME: &str = "stream_index";

pub const AGGREGATE_ID_FIELD: &str = "aggregate_id";
pub const SEQUENCE_FIELD: &str = "sequence";

pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024; // 10 MB
pub const DEFAULT_MAX_DBS: u32 = 2;

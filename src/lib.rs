pub mod backend;
pub mod codec;
pub mod constants;
pub mod error;
#[cfg(feature = "log")]
pub mod log;
pub mod model;
pub mod reader;
pub mod store;
pub mod utils;
pub mod writer;

pub use error::{Error, Result};
pub use model::{
    new_commit_id, CommittedEvent, CommittedEventStream, SchemaVersion, UncommittedEvent,
};
pub use store::{EventStore, EventStoreBuilder};

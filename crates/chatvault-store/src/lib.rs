// Embedded SQLite archive.
// Owns schema, indexes, FTS and transactions; callers hold only transient
// references while a call is in flight.

mod db;
mod error;
pub mod queries;
mod records;
mod schema;

pub use db::Archive;
pub use error::{Error, Result};
pub use queries::state::{
    LAST_EVENTS_SCAN_TIMESTAMP, LAST_SCAN_TIMESTAMP, LAST_SESSIONS_SCAN_TIMESTAMP,
};
pub use records::{
    BackfillEntry, BatchOutcome, EditRow, EventFilter, MessageFilter, ReactionRow,
    SessionFilter, SessionListEntry, SessionStats, StoredMessage,
};
pub use schema::SCHEMA_VERSION;

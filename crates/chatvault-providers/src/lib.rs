// Parsers: the append-only event log, plus third-party chat exports.
// Everything here is pure transformation; no storage access.

mod error;
pub mod eventlog;
pub mod imports;

pub use error::{Error, Result};
pub use imports::ImportedMessage;

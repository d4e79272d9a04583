pub mod export;
pub mod import;
pub mod messages;
pub mod scan;
pub mod sessions;
pub mod state;

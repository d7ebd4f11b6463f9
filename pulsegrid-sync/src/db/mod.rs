//! Database access layer
//!
//! Best-effort SQLite persistence of ingested pulse data and predictions.
//! Nothing here is required for engine correctness; callers wrap these
//! queries so storage failures are logged, never propagated to clients.

pub mod init;
pub mod predictions;
pub mod sources;

pub use init::{init_database, open_pool};

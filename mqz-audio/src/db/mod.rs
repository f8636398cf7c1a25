//! Database access layer
//!
//! Runtime settings and the durable narration store share one SQLite file.

pub mod init;
pub mod settings;
pub mod store;

pub use init::init_database;
pub use store::{DurableStore, SqliteAudioStore};

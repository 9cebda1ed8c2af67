//! The pre-database credential file and the one-way move into `users`.

mod migrate;
mod store;

pub use migrate::{migrate, MigrationReport};
pub use store::{LegacyEntries, LegacyFileStore};

// deferq Infrastructure - SQLite Adapter
// Implements: PersistentStore (key/value table)

mod connection;
mod migration;
mod store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use store::SqliteStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

//! # coolhub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`ControlLog`](coolhub_app::ports::ControlLog) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between control events and database rows
//!
//! ## Dependency rule
//! Depends on `coolhub-app` (for port traits) and `coolhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod control_log;
pub mod error;
pub mod pool;

pub use control_log::SqliteControlLog;
pub use pool::{Config, Database};

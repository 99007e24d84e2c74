//! Storage layer for the roster user service.
//!
//! Provides the pooled SQLite connection manager with bounded
//! retry-on-acquire, the embedded schema migration, and the queries behind
//! every HTTP handler: user CRUD, aggregate statistics and table
//! introspection.
//!
//! # Design decisions
//!
//! - **`r2d2` pool**: bounded, and only kept while the database answers.
//!   [`Database::acquire`] applies the retry policy, opening the file
//!   directly until a pool exists and dropping the pool when it gives up.
//! - **Scoped acquisition**: [`Database::acquire`] hands out a pooled guard
//!   that returns the connection on drop, on every exit path.
//! - **Uniqueness lives in the schema**: duplicate emails are detected from
//!   the constraint violation SQLite reports, never by a pre-check.

mod migrations;
mod pool;
mod schema;
mod stats;
mod users;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{AcquireError, ConnectError, Database, DbConn, DbRuntimeSettings, PoolError};
pub use schema::list_tables;
pub use stats::user_stats;
pub use users::{create_user, delete_user, get_user, list_users, update_user, UserError};

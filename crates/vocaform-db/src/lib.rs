//! Database layer for the Vocaform platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table used by forms and conversation
//! sessions is created through versioned migrations managed by this crate.
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer, which
//!   matches the access pattern of turn-by-turn conversation saves.
//! - **`r2d2` connection pool**: bounded connection reuse.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbConn, DbPool, DbRuntimeSettings, PoolError};

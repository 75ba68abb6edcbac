//! Database layer
//!
//! Bude Finder runs on SQLite (default, single-file deployment) or MySQL.
//! The driver is selected by configuration.
//!
//! ```ignore
//! use bude_finder::config::DatabaseConfig;
//! use bude_finder::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether a repository error was caused by a PRIMARY KEY or UNIQUE
/// constraint. Services use this to answer a lost insert race with a
/// conflict instead of an internal error.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

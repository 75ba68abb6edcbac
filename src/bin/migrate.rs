//! Database migration tool
//!
//! Usage:
//!   migrate            apply the embedded migrations
//!   migrate <dir>      apply the numbered `.sql` files in `<dir>`
//!
//! The two sets keep separate counters (`_version`, `_version_budefinder`).
//!
//! Connection settings come from `config.yml` and `BUDEFINDER_*` variables.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bude_finder::{config::Config, db, db::migrations::MigrationSource};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bude_finder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;

    let (applied, source) = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(dir) => {
            let migrations = db::migrations::load_migrations_dir(&dir)?;
            tracing::info!("Loaded {} migration(s) from {}", migrations.len(), dir.display());
            let applied =
                db::migrations::run_migration_set(&pool, MigrationSource::Directory, &migrations).await?;
            (applied, MigrationSource::Directory)
        }
        None => (db::migrations::run_migrations(&pool).await?, MigrationSource::Embedded),
    };

    let version = db::migrations::current_version(&pool, source).await?;
    tracing::info!(applied, version, "Migrations finished");

    pool.close().await;
    Ok(())
}

//! Database migrations
//!
//! Migrations are numbered and applied in ascending order, each exactly once.
//! Progress is tracked by a single counter row per source (`_version` for
//! the embedded schema, `_version_budefinder` for a directory): after a run,
//! `current` equals the number of migrations known to the runner, and a
//! later run only applies migrations past that index.
//!
//! The schema ships embedded in the binary ([`MIGRATIONS`]), with SQL for
//! both SQLite and MySQL. Operators may also point the runner at a directory
//! of numbered `.sql` files ([`load_migrations_dir`]).

use anyhow::{Context, Result};
use sqlx::{Executor, MySqlPool, SqlitePool};
use std::borrow::Cow;
use std::path::Path;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration number (1-based, ascending)
    pub version: i32,
    /// Human-readable migration name
    pub name: Cow<'static, str>,
    /// SQL statements for SQLite
    pub up_sqlite: Cow<'static, str>,
    /// SQL statements for MySQL
    pub up_mysql: Cow<'static, str>,
}

impl Migration {
    /// SQL for the given driver
    pub fn sql_for(&self, driver: DatabaseDriver) -> &str {
        match driver {
            DatabaseDriver::Sqlite => &self.up_sqlite,
            DatabaseDriver::Mysql => &self.up_mysql,
        }
    }
}

/// Embedded schema migrations.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: Cow::Borrowed("create_schema"),
        up_sqlite: Cow::Borrowed(r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(255) NOT NULL DEFAULT '',
                email VARCHAR(255) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS admins (
                id VARCHAR(36) PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                subject_id VARCHAR(36) NOT NULL,
                kind VARCHAR(10) NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject_id, kind);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
            CREATE TABLE IF NOT EXISTS budes (
                id VARCHAR(36) PRIMARY KEY,
                user_id VARCHAR(36) UNIQUE,
                name VARCHAR(64) NOT NULL,
                description TEXT NOT NULL,
                lat DOUBLE NOT NULL,
                lng DOUBLE NOT NULL,
                contact VARCHAR(100),
                active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_budes_active ON budes(active);
            CREATE TABLE IF NOT EXISTS links (
                id VARCHAR(36) PRIMARY KEY,
                bude_id VARCHAR(36) NOT NULL,
                value VARCHAR(256) NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_links_bude_id ON links(bude_id);
            CREATE TABLE IF NOT EXISTS evaluations (
                user_id VARCHAR(36) NOT NULL,
                bude_id VARCHAR(36) NOT NULL,
                liked BOOLEAN NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, bude_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_evaluations_bude_id ON evaluations(bude_id);
            CREATE TABLE IF NOT EXISTS report_types (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                requires_description BOOLEAN NOT NULL DEFAULT 0,
                requires_contact BOOLEAN NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS reports (
                user_id VARCHAR(36) NOT NULL,
                bude_id VARCHAR(36) NOT NULL,
                type_id VARCHAR(36) NOT NULL,
                description TEXT,
                contact VARCHAR(100),
                state VARCHAR(10) NOT NULL DEFAULT 'UNREAD',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, bude_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE,
                FOREIGN KEY (type_id) REFERENCES report_types(id)
            );
            CREATE INDEX IF NOT EXISTS idx_reports_state ON reports(state, created_at);
            CREATE TABLE IF NOT EXISTS bude_internals (
                bude_id VARCHAR(36) PRIMARY KEY,
                info TEXT NOT NULL,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
        "#),
        up_mysql: Cow::Borrowed(r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(255) NOT NULL DEFAULT '',
                email VARCHAR(255) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS admins (
                id VARCHAR(36) PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                subject_id VARCHAR(36) NOT NULL,
                kind VARCHAR(10) NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_sessions_subject (subject_id, kind),
                INDEX idx_sessions_expires_at (expires_at)
            );
            CREATE TABLE IF NOT EXISTS budes (
                id VARCHAR(36) PRIMARY KEY,
                user_id VARCHAR(36) UNIQUE,
                name VARCHAR(64) NOT NULL,
                description TEXT NOT NULL,
                lat DOUBLE NOT NULL,
                lng DOUBLE NOT NULL,
                contact VARCHAR(100),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                INDEX idx_budes_active (active),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS links (
                id VARCHAR(36) PRIMARY KEY,
                bude_id VARCHAR(36) NOT NULL,
                value VARCHAR(256) NOT NULL,
                position INT NOT NULL DEFAULT 0,
                INDEX idx_links_bude_id (bude_id),
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS evaluations (
                user_id VARCHAR(36) NOT NULL,
                bude_id VARCHAR(36) NOT NULL,
                liked BOOLEAN NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, bude_id),
                INDEX idx_evaluations_bude_id (bude_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS report_types (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                requires_description BOOLEAN NOT NULL DEFAULT FALSE,
                requires_contact BOOLEAN NOT NULL DEFAULT FALSE
            );
            CREATE TABLE IF NOT EXISTS reports (
                user_id VARCHAR(36) NOT NULL,
                bude_id VARCHAR(36) NOT NULL,
                type_id VARCHAR(36) NOT NULL,
                description TEXT,
                contact VARCHAR(100),
                state VARCHAR(10) NOT NULL DEFAULT 'UNREAD',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, bude_id),
                INDEX idx_reports_state (state, created_at),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE,
                FOREIGN KEY (type_id) REFERENCES report_types(id)
            );
            CREATE TABLE IF NOT EXISTS bude_internals (
                bude_id VARCHAR(36) PRIMARY KEY,
                info TEXT NOT NULL,
                FOREIGN KEY (bude_id) REFERENCES budes(id) ON DELETE CASCADE
            );
        "#),
    },
    Migration {
        version: 2,
        name: Cow::Borrowed("seed_report_types"),
        up_sqlite: Cow::Borrowed(r#"
            INSERT OR IGNORE INTO report_types (id, name, requires_description, requires_contact) VALUES
                ('4f1c2d3e-0001-4000-8000-000000000001', 'Existiert nicht mehr', 0, 0),
                ('4f1c2d3e-0002-4000-8000-000000000002', 'Falsche Informationen', 1, 0),
                ('4f1c2d3e-0003-4000-8000-000000000003', 'Unangemessener Inhalt', 1, 0),
                ('4f1c2d3e-0004-4000-8000-000000000004', 'Ich bin der Besitzer', 1, 1),
                ('4f1c2d3e-0005-4000-8000-000000000005', 'Sonstiges', 1, 0);
        "#),
        up_mysql: Cow::Borrowed(r#"
            INSERT IGNORE INTO report_types (id, name, requires_description, requires_contact) VALUES
                ('4f1c2d3e-0001-4000-8000-000000000001', 'Existiert nicht mehr', FALSE, FALSE),
                ('4f1c2d3e-0002-4000-8000-000000000002', 'Falsche Informationen', TRUE, FALSE),
                ('4f1c2d3e-0003-4000-8000-000000000003', 'Unangemessener Inhalt', TRUE, FALSE),
                ('4f1c2d3e-0004-4000-8000-000000000004', 'Ich bin der Besitzer', TRUE, TRUE),
                ('4f1c2d3e-0005-4000-8000-000000000005', 'Sonstiges', TRUE, FALSE);
        "#),
    },
];

/// Where a set of migrations comes from. Each source keeps its own counter
/// row, so the embedded schema and a directory never skip each other's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationSource {
    /// Schema compiled into the binary ([`MIGRATIONS`])
    Embedded,
    /// Numbered `.sql` files from [`load_migrations_dir`]
    Directory,
}

impl MigrationSource {
    /// Table holding this source's counter row
    pub fn version_table(self) -> &'static str {
        match self {
            MigrationSource::Embedded => "_version",
            MigrationSource::Directory => "_version_budefinder",
        }
    }
}

/// Apply all pending embedded migrations. Returns how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    run_migration_set(pool, MigrationSource::Embedded, MIGRATIONS).await
}

/// Apply the migrations in `migrations` whose index lies past the counter
/// of `source`, all inside one transaction, then advance that counter.
///
/// Embedded SQL is sent statement by statement. Directory files are sent
/// whole as one batch, so semicolons inside literals, comments or trigger
/// bodies are left alone.
pub async fn run_migration_set(
    pool: &DynDatabasePool,
    source: MigrationSource,
    migrations: &[Migration],
) -> Result<usize> {
    let table = source.version_table();
    let current = ensure_version_row(pool, table).await? as usize;

    if current >= migrations.len() {
        tracing::debug!("No pending migrations in {} (version {})", table, current);
        return Ok(0);
    }

    let pending = &migrations[current..];
    for migration in pending {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
    }

    let target = migrations.len() as i64;
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_sqlite(pool.sqlite()?, source, pending, target).await?,
        DatabaseDriver::Mysql => apply_mysql(pool.mysql()?, source, pending, target).await?,
    }

    tracing::info!("Applied {} migration(s), {} at version {}", pending.len(), table, target);
    Ok(pending.len())
}

/// Create the counter table and its single row when missing; return `current`
async fn ensure_version_row(pool: &DynDatabasePool, table: &str) -> Result<i64> {
    pool.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {} (current INTEGER NOT NULL DEFAULT 0)",
        table
    ))
    .await?;

    let current: Option<i64> = match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query_scalar(&format!("SELECT current FROM {} LIMIT 1", table))
                .fetch_optional(pool.sqlite()?)
                .await?
        }
        DatabaseDriver::Mysql => {
            sqlx::query_scalar(&format!("SELECT CAST(current AS SIGNED) FROM {} LIMIT 1", table))
                .fetch_optional(pool.mysql()?)
                .await?
        }
    };

    match current {
        Some(version) => Ok(version),
        None => {
            pool.execute(&format!("INSERT INTO {} (current) VALUES (0)", table)).await?;
            Ok(0)
        }
    }
}

async fn apply_sqlite(
    pool: &SqlitePool,
    source: MigrationSource,
    pending: &[Migration],
    target: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for migration in pending {
        let sql = migration.sql_for(DatabaseDriver::Sqlite);
        match source {
            MigrationSource::Embedded => {
                for statement in split_sql_statements(sql) {
                    sqlx::query(statement)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| {
                            format!("Migration {} failed at: {}", migration.name, truncate_sql(statement))
                        })?;
                }
            }
            MigrationSource::Directory => {
                (&mut *tx)
                    .execute(sql)
                    .await
                    .with_context(|| format!("Migration {} failed", migration.name))?;
            }
        }
    }
    sqlx::query(&format!("UPDATE {} SET current = ?", source.version_table()))
        .bind(target)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// MySQL commits DDL implicitly; the transaction still keeps data statements
// and the counter update together.
async fn apply_mysql(
    pool: &MySqlPool,
    source: MigrationSource,
    pending: &[Migration],
    target: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for migration in pending {
        let sql = migration.sql_for(DatabaseDriver::Mysql);
        match source {
            MigrationSource::Embedded => {
                for statement in split_sql_statements(sql) {
                    sqlx::query(statement)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| {
                            format!("Migration {} failed at: {}", migration.name, truncate_sql(statement))
                        })?;
                }
            }
            MigrationSource::Directory => {
                // Unprepared text query; the connection allows multi-statements
                (&mut *tx)
                    .execute(sql)
                    .await
                    .with_context(|| format!("Migration {} failed", migration.name))?;
            }
        }
    }
    sqlx::query(&format!("UPDATE {} SET current = ?", source.version_table()))
        .bind(target)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Load numbered `.sql` files from a directory.
///
/// Files whose stem is not an integer, or whose extension is not `.sql`, are
/// skipped. The result is ordered by number, not by file name, so `10.sql`
/// follows `9.sql`. The same SQL is used for both drivers.
pub fn load_migrations_dir(dir: &Path) -> Result<Vec<Migration>> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read migrations directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(number) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i32>().ok())
        else {
            continue;
        };
        numbered.push((number, path));
    }
    numbered.sort_by_key(|(number, _)| *number);

    numbered
        .into_iter()
        .map(|(number, path)| {
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read migration {}", path.display()))?;
            Ok(Migration {
                version: number,
                name: Cow::Owned(path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()),
                up_sqlite: Cow::Owned(sql.clone()),
                up_mysql: Cow::Owned(sql),
            })
        })
        .collect()
}

/// Current value of the migration counter of `source`
pub async fn current_version(pool: &DynDatabasePool, source: MigrationSource) -> Result<i64> {
    ensure_version_row(pool, source.version_table()).await
}

/// Check if the embedded migrations are all applied
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of embedded migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    let current = current_version(pool, MigrationSource::Embedded).await? as usize;
    Ok(MIGRATIONS.len().saturating_sub(current))
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use std::io::Write;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&pool, MigrationSource::Embedded).await.unwrap(), MIGRATIONS.len() as i64);
        assert!(is_up_to_date(&pool).await.unwrap());

        // Second run is a no-op
        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn test_pending_count_before_and_after() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());
        run_migrations(&pool).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_version_row() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _version")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_report_types_seeded() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM report_types")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_only_new_migrations_applied() {
        let pool = create_test_pool().await.unwrap();
        let first = vec![Migration {
            version: 1,
            name: Cow::Borrowed("one"),
            up_sqlite: Cow::Borrowed("CREATE TABLE a (id INTEGER)"),
            up_mysql: Cow::Borrowed("CREATE TABLE a (id INT)"),
        }];
        assert_eq!(run_migration_set(&pool, MigrationSource::Embedded, &first).await.unwrap(), 1);

        // Re-running migration 1 would fail because table `a` exists
        let mut both = first.clone();
        both.push(Migration {
            version: 2,
            name: Cow::Borrowed("two"),
            up_sqlite: Cow::Borrowed("INSERT INTO a (id) VALUES (7)"),
            up_mysql: Cow::Borrowed("INSERT INTO a (id) VALUES (7)"),
        });
        assert_eq!(run_migration_set(&pool, MigrationSource::Embedded, &both).await.unwrap(), 1);
        assert_eq!(current_version(&pool, MigrationSource::Embedded).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_migration_leaves_version_untouched() {
        let pool = create_test_pool().await.unwrap();
        let broken = vec![Migration {
            version: 1,
            name: Cow::Borrowed("broken"),
            up_sqlite: Cow::Borrowed("CREATE TABLE b (id INTEGER); NOT VALID SQL"),
            up_mysql: Cow::Borrowed("NOT VALID SQL"),
        }];
        assert!(run_migration_set(&pool, MigrationSource::Embedded, &broken).await.is_err());
        assert_eq!(current_version(&pool, MigrationSource::Embedded).await.unwrap(), 0);
    }

    fn write_migrations(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            write!(file, "{}", body).unwrap();
        }
        dir
    }

    async fn table_exists(pool: &DynDatabasePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        count == 1
    }

    #[tokio::test]
    async fn test_directory_counter_is_separate_from_embedded() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let dir = write_migrations(&[("1.sql", "CREATE TABLE extra (id INTEGER)")]);
        let migrations = load_migrations_dir(dir.path()).unwrap();
        let applied = run_migration_set(&pool, MigrationSource::Directory, &migrations).await.unwrap();

        assert_eq!(applied, 1);
        assert!(table_exists(&pool, "extra").await);
        assert_eq!(current_version(&pool, MigrationSource::Directory).await.unwrap(), 1);
        assert_eq!(
            current_version(&pool, MigrationSource::Embedded).await.unwrap(),
            MIGRATIONS.len() as i64
        );
    }

    #[tokio::test]
    async fn test_directory_run_does_not_hide_embedded_schema() {
        let pool = create_test_pool().await.unwrap();
        let dir = write_migrations(&[
            ("1.sql", "CREATE TABLE extra_one (id INTEGER)"),
            ("2.sql", "CREATE TABLE extra_two (id INTEGER)"),
            ("3.sql", "CREATE TABLE extra_three (id INTEGER)"),
        ]);
        let migrations = load_migrations_dir(dir.path()).unwrap();
        run_migration_set(&pool, MigrationSource::Directory, &migrations).await.unwrap();

        assert_eq!(run_migrations(&pool).await.unwrap(), MIGRATIONS.len());
        assert!(table_exists(&pool, "budes").await);
    }

    #[tokio::test]
    async fn test_directory_file_runs_as_one_batch() {
        let pool = create_test_pool().await.unwrap();
        let dir = write_migrations(&[(
            "1.sql",
            "-- values may contain ; too\nCREATE TABLE t (v TEXT);\nINSERT INTO t (v) VALUES ('a;b');\n",
        )]);
        let migrations = load_migrations_dir(dir.path()).unwrap();
        run_migration_set(&pool, MigrationSource::Directory, &migrations).await.unwrap();

        let value: String = sqlx::query_scalar("SELECT v FROM t")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(value, "a;b");
    }

    #[tokio::test]
    async fn test_failed_directory_file_rolls_back() {
        let pool = create_test_pool().await.unwrap();
        let dir = write_migrations(&[("1.sql", "CREATE TABLE half (id INTEGER); NOT VALID SQL;")]);
        let migrations = load_migrations_dir(dir.path()).unwrap();

        assert!(run_migration_set(&pool, MigrationSource::Directory, &migrations).await.is_err());
        assert_eq!(current_version(&pool, MigrationSource::Directory).await.unwrap(), 0);
        assert!(!table_exists(&pool, "half").await);
    }

    #[test]
    fn test_load_migrations_dir_orders_numerically() {
        let dir = write_migrations(&[
            ("10.sql", "SELECT 10"),
            ("2.sql", "SELECT 2"),
            ("1.sql", "SELECT 1"),
            ("notes.sql", "SELECT 0"),
            ("3.txt", "SELECT 3"),
        ]);

        let migrations = load_migrations_dir(dir.path()).unwrap();
        let versions: Vec<i32> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(migrations[2].sql_for(DatabaseDriver::Sqlite), "SELECT 10");
    }

    #[test]
    fn test_split_sql_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(statements.len(), 2);

        let statements = split_sql_statements("-- Comment\nCREATE TABLE a (id INT);\n-- trailing");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}

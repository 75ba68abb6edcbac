//! Bude repository
//!
//! A Bude row plus its ordered links. Owner-facing writes are keyed by
//! `user_id` (one Bude per user); admin writes are keyed by id and replace
//! the link list inside a transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Bude, Link};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Fields an owner may change on their Bude
#[derive(Debug, Clone)]
pub struct BudeChanges {
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub contact: String,
}

#[async_trait]
pub trait BudeRepository: Send + Sync {
    /// Active Budes with links, oldest first
    async fn list_active(&self) -> Result<Vec<Bude>>;

    /// Every Bude regardless of state
    async fn list_all(&self) -> Result<Vec<Bude>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Bude>>;

    async fn get_by_user(&self, user_id: &str) -> Result<Option<Bude>>;

    async fn create(&self, bude: &Bude) -> Result<Bude>;

    /// Apply owner changes and re-activate. `None` when the user owns no Bude.
    async fn update_by_user(&self, user_id: &str, changes: &BudeChanges) -> Result<Option<Bude>>;

    /// Soft delete. Returns `false` when the user owns no Bude.
    async fn deactivate_by_user(&self, user_id: &str) -> Result<bool>;

    /// Insert a Bude together with its links
    async fn create_with_links(&self, bude: &Bude) -> Result<Bude>;

    /// Overwrite name, description and coordinates of `bude.id` and replace
    /// its links. Returns `false` when the id is unknown.
    async fn update_with_links(&self, bude: &Bude) -> Result<bool>;

    /// Hard delete, cascading to links, evaluations, reports and notes
    async fn delete(&self, id: &str) -> Result<bool>;
}

pub struct SqlxBudeRepository {
    pool: DynDatabasePool,
}

impl SqlxBudeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BudeRepository> {
        Arc::new(Self::new(pool))
    }
}

const BUDE_COLUMNS: &str =
    "id, user_id, name, description, lat, lng, contact, active, created_at, updated_at";

#[async_trait]
impl BudeRepository for SqlxBudeRepository {
    async fn list_active(&self) -> Result<Vec<Bude>> {
        let sql = format!(
            "SELECT {} FROM budes WHERE active = ? ORDER BY created_at ASC, id ASC",
            BUDE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_budes_sqlite(self.pool.sqlite()?, &sql, Some(true)).await,
            DatabaseDriver::Mysql => list_budes_mysql(self.pool.mysql()?, &sql, Some(true)).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<Bude>> {
        let sql = format!("SELECT {} FROM budes ORDER BY created_at ASC, id ASC", BUDE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_budes_sqlite(self.pool.sqlite()?, &sql, None).await,
            DatabaseDriver::Mysql => list_budes_mysql(self.pool.mysql()?, &sql, None).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Bude>> {
        let sql = format!("SELECT {} FROM budes WHERE id = ?", BUDE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_bude_sqlite(self.pool.sqlite()?, &sql, id).await,
            DatabaseDriver::Mysql => get_bude_mysql(self.pool.mysql()?, &sql, id).await,
        }
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Option<Bude>> {
        let sql = format!("SELECT {} FROM budes WHERE user_id = ?", BUDE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_bude_sqlite(self.pool.sqlite()?, &sql, user_id).await,
            DatabaseDriver::Mysql => get_bude_mysql(self.pool.mysql()?, &sql, user_id).await,
        }
    }

    async fn create(&self, bude: &Bude) -> Result<Bude> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                insert_bude_sqlite(&mut tx, bude).await?;
                tx.commit().await.context("Failed to commit bude")?;
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                insert_bude_mysql(&mut tx, bude).await?;
                tx.commit().await.context("Failed to commit bude")?;
            }
        }
        Ok(bude.clone())
    }

    async fn update_by_user(&self, user_id: &str, changes: &BudeChanges) -> Result<Option<Bude>> {
        let sql = r#"
            UPDATE budes
            SET name = ?, description = ?, lat = ?, lng = ?, contact = ?, active = ?, updated_at = ?
            WHERE user_id = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&changes.name)
                .bind(&changes.description)
                .bind(changes.lat)
                .bind(changes.lng)
                .bind(&changes.contact)
                .bind(true)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&changes.name)
                .bind(&changes.description)
                .bind(changes.lat)
                .bind(changes.lng)
                .bind(&changes.contact)
                .bind(true)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to update bude")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_user(user_id).await
    }

    async fn deactivate_by_user(&self, user_id: &str) -> Result<bool> {
        let sql = "UPDATE budes SET active = ?, updated_at = ? WHERE user_id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to deactivate bude")?;
        Ok(affected > 0)
    }

    async fn create_with_links(&self, bude: &Bude) -> Result<Bude> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await.context("Failed to begin transaction")?;
                insert_bude_sqlite(&mut tx, bude).await?;
                replace_links_sqlite(&mut tx, &bude.id, &bude.links).await?;
                tx.commit().await.context("Failed to commit bude")?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await.context("Failed to begin transaction")?;
                insert_bude_mysql(&mut tx, bude).await?;
                replace_links_mysql(&mut tx, &bude.id, &bude.links).await?;
                tx.commit().await.context("Failed to commit bude")?;
            }
        }
        Ok(bude.clone())
    }

    async fn update_with_links(&self, bude: &Bude) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_with_links_sqlite(self.pool.sqlite()?, bude).await,
            DatabaseDriver::Mysql => update_with_links_mysql(self.pool.mysql()?, bude).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let sql = "DELETE FROM budes WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete bude")?;
        Ok(affected > 0)
    }
}

const UPDATE_ADMIN_FIELDS: &str =
    "UPDATE budes SET name = ?, description = ?, lat = ?, lng = ?, updated_at = ? WHERE id = ?";
const INSERT_BUDE: &str = r#"
    INSERT INTO budes (id, user_id, name, description, lat, lng, contact, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;
const INSERT_LINK: &str = "INSERT INTO links (id, bude_id, value, position) VALUES (?, ?, ?, ?)";

fn group_links(links: Vec<Link>) -> HashMap<String, Vec<Link>> {
    let mut grouped: HashMap<String, Vec<Link>> = HashMap::new();
    for link in links {
        grouped.entry(link.bude_id.clone()).or_default().push(link);
    }
    grouped
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_bude_sqlite(row: &SqliteRow) -> Bude {
    Bude {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        contact: row.get("contact"),
        active: row.get("active"),
        links: Vec::new(),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

async fn links_sqlite(pool: &SqlitePool, bude_id: Option<&str>) -> Result<Vec<Link>> {
    let rows = match bude_id {
        Some(id) => {
            sqlx::query("SELECT id, bude_id, value FROM links WHERE bude_id = ? ORDER BY position")
                .bind(id)
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query("SELECT id, bude_id, value FROM links ORDER BY bude_id, position")
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to load links")?;

    Ok(rows
        .iter()
        .map(|row| Link { id: row.get("id"), bude_id: row.get("bude_id"), value: row.get("value") })
        .collect())
}

async fn list_budes_sqlite(pool: &SqlitePool, sql: &str, active: Option<bool>) -> Result<Vec<Bude>> {
    let mut query = sqlx::query(sql);
    if let Some(active) = active {
        query = query.bind(active);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list budes")?;
    let mut links = group_links(links_sqlite(pool, None).await?);

    Ok(rows
        .iter()
        .map(|row| {
            let mut bude = row_to_bude_sqlite(row);
            bude.links = links.remove(&bude.id).unwrap_or_default();
            bude
        })
        .collect())
}

async fn get_bude_sqlite(pool: &SqlitePool, sql: &str, key: &str) -> Result<Option<Bude>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get bude")?;

    match row {
        Some(row) => {
            let mut bude = row_to_bude_sqlite(&row);
            bude.links = links_sqlite(pool, Some(&bude.id)).await?;
            Ok(Some(bude))
        }
        None => Ok(None),
    }
}

async fn insert_bude_sqlite(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, bude: &Bude) -> Result<()> {
    sqlx::query(INSERT_BUDE)
        .bind(&bude.id)
        .bind(&bude.user_id)
        .bind(&bude.name)
        .bind(&bude.description)
        .bind(bude.lat)
        .bind(bude.lng)
        .bind(&bude.contact)
        .bind(bude.active)
        .bind(bude.created_at)
        .bind(bude.updated_at)
        .execute(&mut **tx)
        .await
        .context("Failed to create bude")?;
    Ok(())
}

async fn replace_links_sqlite(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    bude_id: &str,
    links: &[Link],
) -> Result<()> {
    sqlx::query("DELETE FROM links WHERE bude_id = ?")
        .bind(bude_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear links")?;

    for (position, link) in links.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(&link.id)
            .bind(bude_id)
            .bind(&link.value)
            .bind(position as i64)
            .execute(&mut **tx)
            .await
            .context("Failed to insert link")?;
    }
    Ok(())
}

async fn update_with_links_sqlite(pool: &SqlitePool, bude: &Bude) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let affected = sqlx::query(UPDATE_ADMIN_FIELDS)
        .bind(&bude.name)
        .bind(&bude.description)
        .bind(bude.lat)
        .bind(bude.lng)
        .bind(bude.updated_at)
        .bind(&bude.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update bude")?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await.context("Failed to roll back")?;
        return Ok(false);
    }

    replace_links_sqlite(&mut tx, &bude.id, &bude.links).await?;
    tx.commit().await.context("Failed to commit bude")?;
    Ok(true)
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_bude_mysql(row: &MySqlRow) -> Bude {
    Bude {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        contact: row.get("contact"),
        active: row.get("active"),
        links: Vec::new(),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

async fn links_mysql(pool: &MySqlPool, bude_id: Option<&str>) -> Result<Vec<Link>> {
    let rows = match bude_id {
        Some(id) => {
            sqlx::query("SELECT id, bude_id, value FROM links WHERE bude_id = ? ORDER BY position")
                .bind(id)
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query("SELECT id, bude_id, value FROM links ORDER BY bude_id, position")
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to load links")?;

    Ok(rows
        .iter()
        .map(|row| Link { id: row.get("id"), bude_id: row.get("bude_id"), value: row.get("value") })
        .collect())
}

async fn list_budes_mysql(pool: &MySqlPool, sql: &str, active: Option<bool>) -> Result<Vec<Bude>> {
    let mut query = sqlx::query(sql);
    if let Some(active) = active {
        query = query.bind(active);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list budes")?;
    let mut links = group_links(links_mysql(pool, None).await?);

    Ok(rows
        .iter()
        .map(|row| {
            let mut bude = row_to_bude_mysql(row);
            bude.links = links.remove(&bude.id).unwrap_or_default();
            bude
        })
        .collect())
}

async fn get_bude_mysql(pool: &MySqlPool, sql: &str, key: &str) -> Result<Option<Bude>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get bude")?;

    match row {
        Some(row) => {
            let mut bude = row_to_bude_mysql(&row);
            bude.links = links_mysql(pool, Some(&bude.id)).await?;
            Ok(Some(bude))
        }
        None => Ok(None),
    }
}

async fn insert_bude_mysql(tx: &mut sqlx::Transaction<'_, sqlx::MySql>, bude: &Bude) -> Result<()> {
    sqlx::query(INSERT_BUDE)
        .bind(&bude.id)
        .bind(&bude.user_id)
        .bind(&bude.name)
        .bind(&bude.description)
        .bind(bude.lat)
        .bind(bude.lng)
        .bind(&bude.contact)
        .bind(bude.active)
        .bind(bude.created_at)
        .bind(bude.updated_at)
        .execute(&mut **tx)
        .await
        .context("Failed to create bude")?;
    Ok(())
}

async fn replace_links_mysql(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    bude_id: &str,
    links: &[Link],
) -> Result<()> {
    sqlx::query("DELETE FROM links WHERE bude_id = ?")
        .bind(bude_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear links")?;

    for (position, link) in links.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(&link.id)
            .bind(bude_id)
            .bind(&link.value)
            .bind(position as i64)
            .execute(&mut **tx)
            .await
            .context("Failed to insert link")?;
    }
    Ok(())
}

async fn update_with_links_mysql(pool: &MySqlPool, bude: &Bude) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM budes WHERE id = ? FOR UPDATE")
        .bind(&bude.id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock bude")?;
    if exists.is_none() {
        tx.rollback().await.context("Failed to roll back")?;
        return Ok(false);
    }

    // MySQL reports zero affected rows when nothing changed, so existence is
    // checked above instead of from this result.
    sqlx::query(UPDATE_ADMIN_FIELDS)
        .bind(&bude.name)
        .bind(&bude.description)
        .bind(bude.lat)
        .bind(bude.lng)
        .bind(bude.updated_at)
        .bind(&bude.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update bude")?;

    replace_links_mysql(&mut tx, &bude.id, &bude.links).await?;
    tx.commit().await.context("Failed to commit bude")?;
    Ok(true)
}

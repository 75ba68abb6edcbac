//! Admin repository
//!
//! Admin accounts and the admin-only notes kept per Bude.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Admin, BudeInternal};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Admin>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Admin>>;

    async fn create(&self, admin: &Admin) -> Result<Admin>;

    /// All internal notes
    async fn list_internals(&self) -> Result<Vec<BudeInternal>>;

    /// Insert or replace the note of a Bude
    async fn upsert_internal(&self, internal: &BudeInternal) -> Result<()>;

    /// Remove the note of a Bude; `false` when there was none
    async fn delete_internal(&self, bude_id: &str) -> Result<bool>;
}

pub struct SqlxAdminRepository {
    pool: DynDatabasePool,
}

impl SqlxAdminRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AdminRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AdminRepository for SqlxAdminRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<Admin>> {
        let sql = "SELECT id, email, created_at FROM admins WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_admin_sqlite(self.pool.sqlite()?, sql, id).await,
            DatabaseDriver::Mysql => fetch_admin_mysql(self.pool.mysql()?, sql, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Admin>> {
        let sql = "SELECT id, email, created_at FROM admins WHERE email = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_admin_sqlite(self.pool.sqlite()?, sql, email).await,
            DatabaseDriver::Mysql => fetch_admin_mysql(self.pool.mysql()?, sql, email).await,
        }
    }

    async fn create(&self, admin: &Admin) -> Result<Admin> {
        let sql = "INSERT INTO admins (id, email, created_at) VALUES (?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&admin.id)
                .bind(&admin.email)
                .bind(admin.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&admin.id)
                .bind(&admin.email)
                .bind(admin.created_at)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to create admin")?;
        Ok(admin.clone())
    }

    async fn list_internals(&self) -> Result<Vec<BudeInternal>> {
        let sql = "SELECT bude_id, info FROM bude_internals ORDER BY bude_id";
        let internals = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list internals")?
                .into_iter()
                .map(|row| BudeInternal { bude_id: row.get("bude_id"), info: row.get("info") })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list internals")?
                .into_iter()
                .map(|row| BudeInternal { bude_id: row.get("bude_id"), info: row.get("info") })
                .collect(),
        };
        Ok(internals)
    }

    async fn upsert_internal(&self, internal: &BudeInternal) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO bude_internals (bude_id, info) VALUES (?, ?)
                    ON CONFLICT(bude_id) DO UPDATE SET info = excluded.info
                    "#,
                )
                .bind(&internal.bude_id)
                .bind(&internal.info)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to save internal info")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO bude_internals (bude_id, info) VALUES (?, ?)
                    ON DUPLICATE KEY UPDATE info = VALUES(info)
                    "#,
                )
                .bind(&internal.bude_id)
                .bind(&internal.info)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to save internal info")?;
            }
        }
        Ok(())
    }

    async fn delete_internal(&self, bude_id: &str) -> Result<bool> {
        let sql = "DELETE FROM bude_internals WHERE bude_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(bude_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(bude_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete internal info")?;
        Ok(affected > 0)
    }
}

async fn fetch_admin_sqlite(pool: &SqlitePool, sql: &str, key: &str) -> Result<Option<Admin>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get admin")?;

    Ok(row.map(|row| Admin {
        id: row.get("id"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }))
}

async fn fetch_admin_mysql(pool: &MySqlPool, sql: &str, key: &str) -> Result<Option<Admin>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get admin")?;

    Ok(row.map(|row| Admin {
        id: row.get("id"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }))
}

//! User repository
//!
//! Users are created on first OAuth sign-in and looked up by e-mail
//! afterwards.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn create(&self, user: &User) -> Result<User>;

    /// Return the user with `email`, creating it when missing. An existing
    /// user's display name is refreshed.
    async fn upsert_by_email(&self, name: &str, email: &str) -> Result<User>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let sql = "SELECT id, name, email, created_at FROM users WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_user_sqlite(self.pool.sqlite()?, sql, id).await,
            DatabaseDriver::Mysql => fetch_user_mysql(self.pool.mysql()?, sql, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = "SELECT id, name, email, created_at FROM users WHERE email = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_user_sqlite(self.pool.sqlite()?, sql, email).await,
            DatabaseDriver::Mysql => fetch_user_mysql(self.pool.mysql()?, sql, email).await,
        }
    }

    async fn create(&self, user: &User) -> Result<User> {
        let sql = "INSERT INTO users (id, name, email, created_at) VALUES (?, ?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&user.id)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(user.created_at)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to create user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&user.id)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(user.created_at)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to create user")?;
            }
        }
        Ok(user.clone())
    }

    async fn upsert_by_email(&self, name: &str, email: &str) -> Result<User> {
        match self.get_by_email(email).await? {
            Some(mut user) => {
                if user.name != name && !name.is_empty() {
                    let sql = "UPDATE users SET name = ? WHERE id = ?";
                    match self.pool.driver() {
                        DatabaseDriver::Sqlite => sqlx::query(sql)
                            .bind(name)
                            .bind(&user.id)
                            .execute(self.pool.sqlite()?)
                            .await
                            .map(|_| ()),
                        DatabaseDriver::Mysql => sqlx::query(sql)
                            .bind(name)
                            .bind(&user.id)
                            .execute(self.pool.mysql()?)
                            .await
                            .map(|_| ()),
                    }
                    .context("Failed to update user name")?;
                    user.name = name.to_string();
                }
                Ok(user)
            }
            None => self.create(&User::new(name, email)).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn fetch_user_sqlite(pool: &SqlitePool, sql: &str, key: &str) -> Result<Option<User>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn fetch_user_mysql(pool: &MySqlPool, sql: &str, key: &str) -> Result<Option<User>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }))
}

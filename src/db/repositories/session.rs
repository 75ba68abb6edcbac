//! Session repository
//!
//! User and admin sessions share one table, told apart by `kind`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Session, SessionKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete every expired session. Returns the number removed.
    async fn delete_expired(&self) -> Result<u64>;

    /// Atomically drop the subject's expired sessions of the same kind and
    /// store `session`.
    async fn create_replacing_expired(&self, session: &Session) -> Result<Session>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SESSION: &str =
    "INSERT INTO sessions (id, subject_id, kind, expires_at, created_at) VALUES (?, ?, ?, ?, ?)";
const DELETE_EXPIRED_FOR_SUBJECT: &str =
    "DELETE FROM sessions WHERE subject_id = ? AND kind = ? AND expires_at <= ?";

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_session_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to delete session")
    }

    async fn delete_expired(&self) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at <= ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete expired sessions")?;
        Ok(affected)
    }

    async fn create_replacing_expired(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => replace_expired_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Mysql => replace_expired_mysql(self.pool.mysql()?, session).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;
    Ok(session.clone())
}

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, subject_id, kind, expires_at, created_at FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    row.map(|row| {
        let kind: String = row.get("kind");
        Ok(Session {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            kind: parse_kind(&kind)?,
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        })
    })
    .transpose()
}

async fn replace_expired_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(DELETE_EXPIRED_FOR_SUBJECT)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to delete expired sessions")?;

    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create session")?;

    tx.commit().await.context("Failed to commit session")?;
    Ok(session.clone())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;
    Ok(session.clone())
}

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, subject_id, kind, expires_at, created_at FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    row.map(|row| {
        let kind: String = row.get("kind");
        Ok(Session {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            kind: parse_kind(&kind)?,
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        })
    })
    .transpose()
}

async fn replace_expired_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(DELETE_EXPIRED_FOR_SUBJECT)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to delete expired sessions")?;

    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(&session.subject_id)
        .bind(session.kind.to_string())
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create session")?;

    tx.commit().await.context("Failed to commit session")?;
    Ok(session.clone())
}

fn parse_kind(kind: &str) -> Result<SessionKind> {
    kind.parse::<SessionKind>().map_err(anyhow::Error::msg)
}

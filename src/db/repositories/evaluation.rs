//! Evaluation repository
//!
//! One like/dislike per (user, Bude).

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait EvaluationRepository: Send + Sync {
    /// `(likes, dislikes)` for a Bude
    async fn tally(&self, bude_id: &str) -> Result<(i64, i64)>;

    /// The user's vote on a Bude, if any
    async fn get(&self, user_id: &str, bude_id: &str) -> Result<Option<bool>>;

    async fn create(&self, user_id: &str, bude_id: &str, like: bool) -> Result<()>;

    /// Returns `false` when the user has not voted on the Bude
    async fn update(&self, user_id: &str, bude_id: &str, like: bool) -> Result<bool>;

    /// Returns `false` when the user has not voted on the Bude
    async fn delete(&self, user_id: &str, bude_id: &str) -> Result<bool>;
}

pub struct SqlxEvaluationRepository {
    pool: DynDatabasePool,
}

impl SqlxEvaluationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EvaluationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EvaluationRepository for SqlxEvaluationRepository {
    async fn tally(&self, bude_id: &str) -> Result<(i64, i64)> {
        // COUNT keeps the result an integer on both drivers; SUM would be
        // DECIMAL on MySQL.
        let sql = r#"
            SELECT COUNT(CASE WHEN liked THEN 1 END) AS likes,
                   COUNT(CASE WHEN NOT liked THEN 1 END) AS dislikes
            FROM evaluations WHERE bude_id = ?
        "#;
        let counts: (i64, i64) = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_as(sql).bind(bude_id).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_as(sql).bind(bude_id).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count evaluations")?;
        Ok(counts)
    }

    async fn get(&self, user_id: &str, bude_id: &str) -> Result<Option<bool>> {
        let sql = "SELECT liked FROM evaluations WHERE user_id = ? AND bude_id = ?";
        let liked: Option<bool> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(user_id)
                    .bind(bude_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(user_id)
                    .bind(bude_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to get evaluation")?;
        Ok(liked)
    }

    async fn create(&self, user_id: &str, bude_id: &str, like: bool) -> Result<()> {
        let sql = "INSERT INTO evaluations (user_id, bude_id, liked, created_at) VALUES (?, ?, ?, ?)";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(bude_id)
                .bind(like)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(bude_id)
                .bind(like)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to create evaluation")
    }

    async fn update(&self, user_id: &str, bude_id: &str, like: bool) -> Result<bool> {
        // Existence is checked separately: MySQL counts unchanged rows as
        // unaffected.
        if self.get(user_id, bude_id).await?.is_none() {
            return Ok(false);
        }
        let sql = "UPDATE evaluations SET liked = ? WHERE user_id = ? AND bude_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(like)
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(like)
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update evaluation")?;
        Ok(true)
    }

    async fn delete(&self, user_id: &str, bude_id: &str) -> Result<bool> {
        let sql = "DELETE FROM evaluations WHERE user_id = ? AND bude_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete evaluation")?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxEvaluationRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let db = pool.sqlite().unwrap();
        for (id, email) in [("u1", "a@example.com"), ("u2", "b@example.com"), ("u3", "c@example.com")] {
            sqlx::query("INSERT INTO users (id, name, email) VALUES (?, 'T', ?)")
                .bind(id)
                .bind(email)
                .execute(db)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO budes (id, name, description, lat, lng) VALUES ('b1', 'B', 'D', 1.0, 2.0)")
            .execute(db)
            .await
            .unwrap();
        SqlxEvaluationRepository::new(pool)
    }

    #[tokio::test]
    async fn test_tally_counts_likes_and_dislikes() {
        let repo = setup().await;
        assert_eq!(repo.tally("b1").await.unwrap(), (0, 0));

        repo.create("u1", "b1", true).await.unwrap();
        repo.create("u2", "b1", true).await.unwrap();
        repo.create("u3", "b1", false).await.unwrap();

        assert_eq!(repo.tally("b1").await.unwrap(), (2, 1));
    }

    #[tokio::test]
    async fn test_duplicate_vote_rejected() {
        let repo = setup().await;
        repo.create("u1", "b1", true).await.unwrap();
        let duplicate = repo.create("u1", "b1", false).await.unwrap_err();
        assert!(crate::db::is_unique_violation(&duplicate));
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing_rows() {
        let repo = setup().await;
        assert!(!repo.update("u1", "b1", true).await.unwrap());
        assert!(!repo.delete("u1", "b1").await.unwrap());

        repo.create("u1", "b1", true).await.unwrap();
        assert!(repo.update("u1", "b1", false).await.unwrap());
        assert_eq!(repo.get("u1", "b1").await.unwrap(), Some(false));

        assert!(repo.delete("u1", "b1").await.unwrap());
        assert_eq!(repo.get("u1", "b1").await.unwrap(), None);
    }
}

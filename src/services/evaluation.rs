//! Evaluation service
//!
//! Likes and dislikes. Tallies are cached per Bude and dropped whenever a
//! vote on that Bude changes.

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::repositories::{BudeRepository, EvaluationRepository};
use crate::models::{EvaluationSummary, OwnEvaluation};
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_TALLY: &str = "tally:";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already evaluated")]
    Conflict,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct EvaluationService {
    repo: Arc<dyn EvaluationRepository>,
    bude_repo: Arc<dyn BudeRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl EvaluationService {
    pub fn new(
        repo: Arc<dyn EvaluationRepository>,
        bude_repo: Arc<dyn BudeRepository>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self { repo, bude_repo, cache, cache_ttl }
    }

    /// Vote counts plus, for a signed-in caller, their own vote.
    ///
    /// `own` is `None` for anonymous callers and `Some({like: None})` when a
    /// signed-in caller has not voted. Unknown Budes simply have no votes.
    pub async fn get(
        &self,
        bude_id: &str,
        user_id: Option<&str>,
    ) -> Result<EvaluationSummary, EvaluationServiceError> {
        let (likes, dislikes) = self.tally(bude_id).await?;

        let own = match user_id {
            Some(user_id) => Some(OwnEvaluation { like: self.repo.get(user_id, bude_id).await? }),
            None => None,
        };

        Ok(EvaluationSummary { likes, dislikes, own })
    }

    pub async fn set(&self, user_id: &str, bude_id: &str, like: bool) -> Result<(), EvaluationServiceError> {
        if self.bude_repo.get_by_id(bude_id).await?.is_none() {
            return Err(EvaluationServiceError::NotFound("Bude not found".to_string()));
        }
        if self.repo.get(user_id, bude_id).await?.is_some() {
            return Err(EvaluationServiceError::Conflict);
        }
        // A concurrent vote may have landed since the check above
        self.repo.create(user_id, bude_id, like).await.map_err(|e| {
            if is_unique_violation(&e) {
                EvaluationServiceError::Conflict
            } else {
                EvaluationServiceError::Internal(e)
            }
        })?;
        self.invalidate(bude_id).await;
        Ok(())
    }

    pub async fn update(&self, user_id: &str, bude_id: &str, like: bool) -> Result<(), EvaluationServiceError> {
        if !self.repo.update(user_id, bude_id, like).await? {
            return Err(EvaluationServiceError::NotFound("Evaluation not found".to_string()));
        }
        self.invalidate(bude_id).await;
        Ok(())
    }

    pub async fn delete(&self, user_id: &str, bude_id: &str) -> Result<(), EvaluationServiceError> {
        if !self.repo.delete(user_id, bude_id).await? {
            return Err(EvaluationServiceError::NotFound("Evaluation not found".to_string()));
        }
        self.invalidate(bude_id).await;
        Ok(())
    }

    async fn tally(&self, bude_id: &str) -> anyhow::Result<(i64, i64)> {
        let key = format!("{}{}", CACHE_KEY_TALLY, bude_id);
        if let Ok(Some(cached)) = self.cache.get::<(i64, i64)>(&key).await {
            return Ok(cached);
        }
        let tally = self.repo.tally(bude_id).await?;
        if let Err(e) = self.cache.set(&key, &tally, self.cache_ttl).await {
            tracing::warn!("Failed to cache tally for {}: {}", bude_id, e);
        }
        Ok(tally)
    }

    async fn invalidate(&self, bude_id: &str) {
        let key = format!("{}{}", CACHE_KEY_TALLY, bude_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!("Failed to invalidate tally for {}: {}", bude_id, e);
        }
    }
}

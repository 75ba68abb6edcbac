//! Admin-only notes per Bude

use crate::db::repositories::{AdminRepository, BudeRepository};
use crate::models::BudeInternal;
use crate::services::validation::caps;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InternalServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bude not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct InternalService {
    admin_repo: Arc<dyn AdminRepository>,
    bude_repo: Arc<dyn BudeRepository>,
}

impl InternalService {
    pub fn new(admin_repo: Arc<dyn AdminRepository>, bude_repo: Arc<dyn BudeRepository>) -> Self {
        Self { admin_repo, bude_repo }
    }

    pub async fn list(&self) -> Result<Vec<BudeInternal>, InternalServiceError> {
        Ok(self.admin_repo.list_internals().await?)
    }

    /// Store the note; blank text removes it. Returns the stored note, if any.
    pub async fn set(&self, bude_id: &str, info: &str) -> Result<Option<BudeInternal>, InternalServiceError> {
        if self.bude_repo.get_by_id(bude_id).await?.is_none() {
            return Err(InternalServiceError::NotFound);
        }

        let info = info.trim();
        if info.is_empty() {
            self.admin_repo.delete_internal(bude_id).await?;
            return Ok(None);
        }
        if info.chars().count() > caps::INTERNAL_INFO {
            return Err(InternalServiceError::Validation(format!(
                "info must be at most {} characters",
                caps::INTERNAL_INFO
            )));
        }

        let internal = BudeInternal { bude_id: bude_id.to_string(), info: info.to_string() };
        self.admin_repo.upsert_internal(&internal).await?;
        Ok(Some(internal))
    }
}

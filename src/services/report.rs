//! Report service
//!
//! Users flag a Bude once each; admins triage the reports through the
//! UNREAD / READ / MARKED states and maintain the list of report types.

use crate::db::is_unique_violation;
use crate::db::repositories::{BudeRepository, ReportRepository, ReportTypeRepository};
use crate::models::{
    CreateReportInput, CreateReportTypeInput, Report, ReportFilter, ReportState, ReportType,
    ReportWithMeta,
};
use crate::services::validation::{self, caps};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ReportServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bude already reported")]
    Conflict,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    type_repo: Arc<dyn ReportTypeRepository>,
    bude_repo: Arc<dyn BudeRepository>,
}

fn require_uuid(field: &str, value: &str) -> Result<(), ReportServiceError> {
    if validation::is_uuid(value) {
        Ok(())
    } else {
        Err(ReportServiceError::Validation(format!("{} must be a UUID", field)))
    }
}

/// Treat blank optional text as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ReportService {
    pub fn new(
        repo: Arc<dyn ReportRepository>,
        type_repo: Arc<dyn ReportTypeRepository>,
        bude_repo: Arc<dyn BudeRepository>,
    ) -> Self {
        Self { repo, type_repo, bude_repo }
    }

    /// Report types the caller may choose from, or `None` when they have
    /// already reported this Bude
    pub async fn types(
        &self,
        user_id: &str,
        bude_id: &str,
    ) -> Result<Option<Vec<ReportType>>, ReportServiceError> {
        require_uuid("bude_id", bude_id)?;
        if self.repo.exists(user_id, bude_id).await? {
            return Ok(None);
        }
        Ok(Some(self.type_repo.list().await?))
    }

    pub async fn add(&self, user_id: &str, input: CreateReportInput) -> Result<Report, ReportServiceError> {
        require_uuid("bude_id", &input.bude_id)?;
        require_uuid("type_id", &input.type_id)?;

        let report_type = self
            .type_repo
            .get_by_id(&input.type_id)
            .await?
            .ok_or_else(|| ReportServiceError::NotFound("Report type not found".to_string()))?;

        if self.bude_repo.get_by_id(&input.bude_id).await?.is_none() {
            return Err(ReportServiceError::NotFound("Bude not found".to_string()));
        }

        let description = if report_type.requires_description {
            let description = non_blank(input.description)
                .ok_or_else(|| ReportServiceError::Validation("description is required".to_string()))?;
            validation::require_text("description", &description, caps::REPORT_DESCRIPTION)
                .map_err(ReportServiceError::Validation)?;
            Some(description)
        } else {
            None
        };

        let contact = if report_type.requires_contact {
            let contact = non_blank(input.contact)
                .ok_or_else(|| ReportServiceError::Validation("contact is required".to_string()))?;
            if !validation::is_valid_contact(&contact) {
                return Err(ReportServiceError::Validation(
                    "contact must be an e-mail address or a mobile phone number".to_string(),
                ));
            }
            Some(contact)
        } else {
            None
        };

        if self.repo.exists(user_id, &input.bude_id).await? {
            return Err(ReportServiceError::Conflict);
        }

        let report = Report {
            user_id: user_id.to_string(),
            bude_id: input.bude_id,
            type_id: report_type.id,
            description,
            contact,
            state: ReportState::Unread,
            created_at: Utc::now(),
        };
        // A concurrent report may have landed since the check above
        let report = self.repo.create(&report).await.map_err(|e| {
            if is_unique_violation(&e) {
                ReportServiceError::Conflict
            } else {
                ReportServiceError::Internal(e)
            }
        })?;
        tracing::info!(bude_id = %report.bude_id, type_id = %report.type_id, "Report filed");
        Ok(report)
    }

    /// Withdraw the caller's report
    pub async fn delete(&self, user_id: &str, bude_id: &str) -> Result<(), ReportServiceError> {
        require_uuid("bude_id", bude_id)?;
        if !self.repo.delete(user_id, bude_id).await? {
            return Err(ReportServiceError::NotFound("Report not found".to_string()));
        }
        Ok(())
    }

    pub async fn all(&self, filter: &ReportFilter) -> Result<Vec<ReportWithMeta>, ReportServiceError> {
        if let Some(bude_id) = &filter.bude_id {
            require_uuid("bude_id", bude_id)?;
        }
        if let Some(user_id) = &filter.user_id {
            require_uuid("user_id", user_id)?;
        }
        Ok(self.repo.list(filter).await?)
    }

    pub async fn set_state(
        &self,
        user_id: &str,
        bude_id: &str,
        state: ReportState,
    ) -> Result<(), ReportServiceError> {
        require_uuid("user_id", user_id)?;
        require_uuid("bude_id", bude_id)?;
        if !self.repo.set_state(user_id, bude_id, state).await? {
            return Err(ReportServiceError::NotFound("Report not found".to_string()));
        }
        tracing::info!(user_id, bude_id, %state, "Report state changed");
        Ok(())
    }

    pub async fn list_types(&self) -> Result<Vec<ReportType>, ReportServiceError> {
        Ok(self.type_repo.list().await?)
    }

    pub async fn create_type(&self, input: CreateReportTypeInput) -> Result<ReportType, ReportServiceError> {
        let name = input.name.trim().to_string();
        validation::require_text("name", &name, caps::REPORT_TYPE_NAME).map_err(ReportServiceError::Validation)?;

        let report_type = ReportType {
            id: Uuid::new_v4().to_string(),
            name,
            requires_description: input.requires_description,
            requires_contact: input.requires_contact,
        };
        let report_type = self.type_repo.create(&report_type).await?;
        tracing::info!(type_id = %report_type.id, "Report type created");
        Ok(report_type)
    }
}

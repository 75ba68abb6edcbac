//! Report type repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ReportType;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ReportTypeRepository: Send + Sync {
    /// All report types ordered by name
    async fn list(&self) -> Result<Vec<ReportType>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<ReportType>>;

    async fn create(&self, report_type: &ReportType) -> Result<ReportType>;
}

pub struct SqlxReportTypeRepository {
    pool: DynDatabasePool,
}

impl SqlxReportTypeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReportTypeRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! row_to_report_type {
    ($row:expr) => {
        ReportType {
            id: $row.get("id"),
            name: $row.get("name"),
            requires_description: $row.get("requires_description"),
            requires_contact: $row.get("requires_contact"),
        }
    };
}

#[async_trait]
impl ReportTypeRepository for SqlxReportTypeRepository {
    async fn list(&self) -> Result<Vec<ReportType>> {
        let sql = "SELECT id, name, requires_description, requires_contact FROM report_types ORDER BY name";
        let types = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list report types")?
                .iter()
                .map(|row| row_to_report_type!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list report types")?
                .iter()
                .map(|row| row_to_report_type!(row))
                .collect(),
        };
        Ok(types)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ReportType>> {
        let sql = "SELECT id, name, requires_description, requires_contact FROM report_types WHERE id = ?";
        let found = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get report type")?
                .map(|row| row_to_report_type!(row)),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get report type")?
                .map(|row| row_to_report_type!(row)),
        };
        Ok(found)
    }

    async fn create(&self, report_type: &ReportType) -> Result<ReportType> {
        let sql = "INSERT INTO report_types (id, name, requires_description, requires_contact) VALUES (?, ?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&report_type.id)
                .bind(&report_type.name)
                .bind(report_type.requires_description)
                .bind(report_type.requires_contact)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&report_type.id)
                .bind(&report_type.name)
                .bind(report_type.requires_description)
                .bind(report_type.requires_contact)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to create report type")?;
        Ok(report_type.clone())
    }
}

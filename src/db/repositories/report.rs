//! Report repository
//!
//! One report per (user, Bude). Admin listings join the reported Bude, the
//! reporter's name and the report type.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Bude, Link, Report, ReportFilter, ReportState, ReportType, ReportWithMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn exists(&self, user_id: &str, bude_id: &str) -> Result<bool>;

    async fn create(&self, report: &Report) -> Result<Report>;

    /// Returns `false` when there was no such report
    async fn delete(&self, user_id: &str, bude_id: &str) -> Result<bool>;

    /// Reports in `filter.state`, oldest first
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<ReportWithMeta>>;

    /// Returns `false` when there was no such report
    async fn set_state(&self, user_id: &str, bude_id: &str, state: ReportState) -> Result<bool>;
}

pub struct SqlxReportRepository {
    pool: DynDatabasePool,
}

impl SqlxReportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SELECT: &str = r#"
    SELECT r.user_id, r.bude_id, r.type_id, r.description, r.contact, r.state, r.created_at,
           u.name AS user_name,
           t.name AS type_name, t.requires_description, t.requires_contact,
           b.user_id AS bude_user_id, b.name AS bude_name, b.description AS bude_description,
           b.lat, b.lng, b.contact AS bude_contact, b.active,
           b.created_at AS bude_created_at, b.updated_at AS bude_updated_at
    FROM reports r
    JOIN users u ON u.id = r.user_id
    JOIN report_types t ON t.id = r.type_id
    JOIN budes b ON b.id = r.bude_id
    WHERE r.state = ?
"#;

/// Build the listing query for a filter. Bind order: state, bude_id, user_id.
fn list_sql(filter: &ReportFilter) -> String {
    let mut sql = String::from(LIST_SELECT);
    if filter.bude_id.is_some() {
        sql.push_str(" AND r.bude_id = ?");
    }
    if filter.user_id.is_some() {
        sql.push_str(" AND r.user_id = ?");
    }
    sql.push_str(" ORDER BY r.created_at ASC");
    sql
}

fn parse_state(state: &str) -> Result<ReportState> {
    state.parse::<ReportState>().map_err(anyhow::Error::msg)
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn exists(&self, user_id: &str, bude_id: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM reports WHERE user_id = ? AND bude_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql).bind(user_id).bind(bude_id).fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql).bind(user_id).bind(bude_id).fetch_one(self.pool.mysql()?).await
            }
        }
        .context("Failed to check report")?;
        Ok(count > 0)
    }

    async fn create(&self, report: &Report) -> Result<Report> {
        let sql = r#"
            INSERT INTO reports (user_id, bude_id, type_id, description, contact, state, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&report.user_id)
                .bind(&report.bude_id)
                .bind(&report.type_id)
                .bind(&report.description)
                .bind(&report.contact)
                .bind(report.state.to_string())
                .bind(report.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&report.user_id)
                .bind(&report.bude_id)
                .bind(&report.type_id)
                .bind(&report.description)
                .bind(&report.contact)
                .bind(report.state.to_string())
                .bind(report.created_at)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to create report")?;
        Ok(report.clone())
    }

    async fn delete(&self, user_id: &str, bude_id: &str) -> Result<bool> {
        let sql = "DELETE FROM reports WHERE user_id = ? AND bude_id = ?";
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
        .context("Failed to delete report")?;
        Ok(affected > 0)
    }

    async fn list(&self, filter: &ReportFilter) -> Result<Vec<ReportWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_reports_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => list_reports_mysql(self.pool.mysql()?, filter).await,
        }
    }

    async fn set_state(&self, user_id: &str, bude_id: &str, state: ReportState) -> Result<bool> {
        if !self.exists(user_id, bude_id).await? {
            return Ok(false);
        }
        let sql = "UPDATE reports SET state = ? WHERE user_id = ? AND bude_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(state.to_string())
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(state.to_string())
                .bind(user_id)
                .bind(bude_id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update report state")?;
        Ok(true)
    }
}

fn group_links(rows: Vec<Link>) -> HashMap<String, Vec<Link>> {
    let mut grouped: HashMap<String, Vec<Link>> = HashMap::new();
    for link in rows {
        grouped.entry(link.bude_id.clone()).or_default().push(link);
    }
    grouped
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_report_sqlite(row: &SqliteRow) -> Result<ReportWithMeta> {
    let state: String = row.get("state");
    let report = Report {
        user_id: row.get("user_id"),
        bude_id: row.get("bude_id"),
        type_id: row.get("type_id"),
        description: row.get("description"),
        contact: row.get("contact"),
        state: parse_state(&state)?,
        created_at: row.get("created_at"),
    };
    let bude = Bude {
        id: report.bude_id.clone(),
        user_id: row.get("bude_user_id"),
        name: row.get("bude_name"),
        description: row.get("bude_description"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        contact: row.get("bude_contact"),
        active: row.get("active"),
        links: Vec::new(),
        created_at: row.get("bude_created_at"),
        updated_at: row.get("bude_updated_at"),
    };
    let report_type = ReportType {
        id: report.type_id.clone(),
        name: row.get("type_name"),
        requires_description: row.get("requires_description"),
        requires_contact: row.get("requires_contact"),
    };
    Ok(ReportWithMeta { report, bude, user_name: row.get("user_name"), report_type })
}

async fn list_reports_sqlite(pool: &SqlitePool, filter: &ReportFilter) -> Result<Vec<ReportWithMeta>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql).bind(filter.state.to_string());
    if let Some(bude_id) = &filter.bude_id {
        query = query.bind(bude_id);
    }
    if let Some(user_id) = &filter.user_id {
        query = query.bind(user_id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list reports")?;

    let links = sqlx::query("SELECT id, bude_id, value FROM links ORDER BY bude_id, position")
        .fetch_all(pool)
        .await
        .context("Failed to load links")?
        .iter()
        .map(|row| Link { id: row.get("id"), bude_id: row.get("bude_id"), value: row.get("value") })
        .collect();
    let links = group_links(links);

    rows.iter()
        .map(|row| {
            let mut meta = row_to_report_sqlite(row)?;
            meta.bude.links = links.get(&meta.bude.id).cloned().unwrap_or_default();
            Ok(meta)
        })
        .collect()
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_report_mysql(row: &MySqlRow) -> Result<ReportWithMeta> {
    let state: String = row.get("state");
    let report = Report {
        user_id: row.get("user_id"),
        bude_id: row.get("bude_id"),
        type_id: row.get("type_id"),
        description: row.get("description"),
        contact: row.get("contact"),
        state: parse_state(&state)?,
        created_at: row.get("created_at"),
    };
    let bude = Bude {
        id: report.bude_id.clone(),
        user_id: row.get("bude_user_id"),
        name: row.get("bude_name"),
        description: row.get("bude_description"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        contact: row.get("bude_contact"),
        active: row.get("active"),
        links: Vec::new(),
        created_at: row.get("bude_created_at"),
        updated_at: row.get("bude_updated_at"),
    };
    let report_type = ReportType {
        id: report.type_id.clone(),
        name: row.get("type_name"),
        requires_description: row.get("requires_description"),
        requires_contact: row.get("requires_contact"),
    };
    Ok(ReportWithMeta { report, bude, user_name: row.get("user_name"), report_type })
}

async fn list_reports_mysql(pool: &MySqlPool, filter: &ReportFilter) -> Result<Vec<ReportWithMeta>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql).bind(filter.state.to_string());
    if let Some(bude_id) = &filter.bude_id {
        query = query.bind(bude_id);
    }
    if let Some(user_id) = &filter.user_id {
        query = query.bind(user_id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list reports")?;

    let links = sqlx::query("SELECT id, bude_id, value FROM links ORDER BY bude_id, position")
        .fetch_all(pool)
        .await
        .context("Failed to load links")?
        .iter()
        .map(|row| Link { id: row.get("id"), bude_id: row.get("bude_id"), value: row.get("value") })
        .collect();
    let links = group_links(links);

    rows.iter()
        .map(|row| {
            let mut meta = row_to_report_mysql(row)?;
            meta.bude.links = links.get(&meta.bude.id).cloned().unwrap_or_default();
            Ok(meta)
        })
        .collect()
}

//! Report model
//!
//! A report flags a Bude for moderation. Each user may hold one report per
//! Bude; its type decides which extra fields are mandatory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Bude;

/// Moderation state of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportState {
    #[default]
    Unread,
    Read,
    Marked,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportState::Unread => write!(f, "UNREAD"),
            ReportState::Read => write!(f, "READ"),
            ReportState::Marked => write!(f, "MARKED"),
        }
    }
}

impl FromStr for ReportState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNREAD" => Ok(ReportState::Unread),
            "READ" => Ok(ReportState::Read),
            "MARKED" => Ok(ReportState::Marked),
            _ => Err(format!("Invalid report state: {}", s)),
        }
    }
}

/// Category of report; the flags mark fields the reporter must fill in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportType {
    pub id: String,
    pub name: String,
    pub requires_description: bool,
    pub requires_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub user_id: String,
    pub bude_id: String,
    pub type_id: String,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub state: ReportState,
    pub created_at: DateTime<Utc>,
}

/// Report joined with what the moderation view shows next to it
#[derive(Debug, Clone, Serialize)]
pub struct ReportWithMeta {
    #[serde(flatten)]
    pub report: Report,
    pub bude: Bude,
    pub user_name: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
}

/// Moderation list filter
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub state: ReportState,
    pub bude_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportInput {
    pub bude_id: String,
    pub type_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportTypeInput {
    pub name: String,
    #[serde(default)]
    pub requires_description: bool,
    #[serde(default)]
    pub requires_contact: bool,
}

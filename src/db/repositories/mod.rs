//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity on both drivers.

pub mod admin;
pub mod bude;
pub mod evaluation;
pub mod report;
pub mod report_type;
pub mod session;
pub mod user;

pub use admin::{AdminRepository, SqlxAdminRepository};
pub use bude::{BudeChanges, BudeRepository, SqlxBudeRepository};
pub use evaluation::{EvaluationRepository, SqlxEvaluationRepository};
pub use report::{ReportRepository, SqlxReportRepository};
pub use report_type::{ReportTypeRepository, SqlxReportTypeRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

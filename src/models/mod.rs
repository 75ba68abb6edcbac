//! Data models
//!
//! Database entities (User, Admin, Session, Bude, Link, Evaluation, Report,
//! ReportType) and the input types the services accept.

mod admin;
mod bude;
mod evaluation;
mod report;
mod session;
mod user;

pub use admin::{Admin, BudeInternal};
pub use bude::{AdminBudeInput, Bude, BudeInput, CoordinateInput, Link, PublicBude};
pub use evaluation::{EvaluationInput, EvaluationSummary, OwnEvaluation};
pub use report::{
    CreateReportInput, CreateReportTypeInput, Report, ReportFilter, ReportState, ReportType,
    ReportWithMeta,
};
pub use session::{Session, SessionKind};
pub use user::User;

//! Services layer - Business logic
//!
//! Services validate input, apply the rules of each feature and coordinate
//! repositories with the cache and the OAuth provider.

pub mod auth;
pub mod bude;
pub mod evaluation;
pub mod internal;
pub mod oauth;
pub mod report;
pub mod validation;

pub use auth::{AuthService, AuthServiceError};
pub use bude::{BudeService, BudeServiceError};
pub use evaluation::{EvaluationService, EvaluationServiceError};
pub use internal::{InternalService, InternalServiceError};
pub use oauth::{DynOAuthProvider, GoogleOAuth, OAuthProfile, OAuthProvider};
pub use report::{ReportService, ReportServiceError};
pub use validation::FormErrors;

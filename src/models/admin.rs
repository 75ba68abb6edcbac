//! Admin model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A moderator account. Admins are provisioned in the database; the OAuth
/// flow only proves control of the e-mail address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Admin-only note attached to a Bude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudeInternal {
    pub bude_id: String,
    pub info: String,
}

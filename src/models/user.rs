//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A map user, identified by the e-mail address the identity provider reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

//! Bude model
//!
//! A Bude is a venue marked on the map. Users own at most one; admins may
//! create unowned ones and attach links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Venue record with its links in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bude {
    pub id: String,
    /// Owning user, `None` for admin-created entries
    pub user_id: Option<String>,
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub contact: Option<String>,
    /// `false` once the owner removed it from the map
    pub active: bool,
    #[serde(default)]
    pub links: Vec<Link>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External link shown with a Bude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub bude_id: String,
    pub value: String,
}

/// What the public map sees: no owner, no contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicBude {
    pub id: String,
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub links: Vec<Link>,
}

impl From<Bude> for PublicBude {
    fn from(bude: Bude) -> Self {
        Self {
            id: bude.id,
            name: bude.name,
            description: bude.description,
            lat: bude.lat,
            lng: bude.lng,
            links: bude.links,
        }
    }
}

/// Owner-submitted fields for creating or updating their Bude
#[derive(Debug, Clone, Deserialize)]
pub struct BudeInput {
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub contact: String,
}

/// A coordinate as submitted by the admin form: either a JSON number or
/// the raw text of an input field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CoordinateInput {
    Number(f64),
    Text(String),
}

impl CoordinateInput {
    /// The coordinate as a finite number, if it is one
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            CoordinateInput::Number(n) => *n,
            CoordinateInput::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Admin upsert form; `bude_id` absent means create
#[derive(Debug, Clone, Deserialize)]
pub struct AdminBudeInput {
    #[serde(default)]
    pub bude_id: Option<String>,
    pub name: String,
    pub description: String,
    pub lat: CoordinateInput,
    pub lng: CoordinateInput,
    #[serde(default)]
    pub links: Vec<String>,
}

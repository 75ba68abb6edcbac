//! Input validation shared by the services
//!
//! Length caps are counted in characters (Unicode scalar values), not bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Field length caps
pub mod caps {
    pub const BUDE_NAME: usize = 64;
    pub const BUDE_DESCRIPTION: usize = 400;
    pub const LINK_VALUE: usize = 256;
    pub const CONTACT: usize = 100;
    pub const REPORT_DESCRIPTION: usize = 400;
    pub const REPORT_TYPE_NAME: usize = 100;
    pub const INTERNAL_INFO: usize = 2000;
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ()/-]*[0-9]$").expect("valid phone regex")
});

/// Per-field errors of the admin Bude form.
///
/// `messages` lists every problem; the flags mark which inputs to highlight.
/// `links[i]` is `true` when the i-th link is invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors {
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<bool>,
    pub links: Vec<Option<bool>>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Check the text fields of the admin form, collecting every error
pub fn check_admin_form(name: &str, description: &str, links: &[String]) -> FormErrors {
    let mut errors = FormErrors::default();
    let name_len = name.chars().count();
    let description_len = description.chars().count();

    if name_len == 0 {
        errors.messages.push("Name ist leer.".to_string());
        errors.name = Some(true);
    }
    if name_len > caps::BUDE_NAME {
        errors.messages.push("Name ist zu lang.".to_string());
        errors.name = Some(true);
    }
    if description_len == 0 {
        errors.messages.push("Beschreibung ist leer.".to_string());
        errors.description = Some(true);
    }
    if description_len > caps::BUDE_DESCRIPTION {
        errors.messages.push("Beschreibung ist zu lang.".to_string());
        errors.description = Some(true);
    }

    for (i, link) in links.iter().enumerate() {
        let len = link.chars().count();
        let mut bad = false;
        if len == 0 {
            errors.messages.push("Link ist leer.".to_string());
            bad = true;
        }
        if len > caps::LINK_VALUE {
            errors.messages.push("Link ist zu lang.".to_string());
            bad = true;
        }
        if bad {
            errors.links.resize(i + 1, None);
            errors.links[i] = Some(true);
        }
    }

    errors
}

/// A required text field: non-empty after trimming and within `cap`
pub fn require_text(field: &str, value: &str, cap: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if value.chars().count() > cap {
        return Err(format!("{} must be at most {} characters", field, cap));
    }
    Ok(())
}

/// Latitude in [-90, 90], longitude in [-180, 180], both finite
pub fn check_coordinates(lat: f64, lng: f64) -> Result<(), String> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err("lat must be between -90 and 90".to_string());
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err("lng must be between -180 and 180".to_string());
    }
    Ok(())
}

/// An e-mail address or a mobile phone number
pub fn is_valid_contact(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > caps::CONTACT {
        return false;
    }
    if EMAIL_RE.is_match(value) {
        return true;
    }
    if !PHONE_RE.is_match(value) {
        return false;
    }
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

pub fn is_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_admin_form_collects_all_errors() {
        let links = vec!["https://ok.example".to_string(), String::new(), "x".repeat(caps::LINK_VALUE + 1)];
        let errors = check_admin_form("", &"d".repeat(caps::BUDE_DESCRIPTION + 1), &links);

        assert_eq!(
            errors.messages,
            vec!["Name ist leer.", "Beschreibung ist zu lang.", "Link ist leer.", "Link ist zu lang."]
        );
        assert_eq!(errors.name, Some(true));
        assert_eq!(errors.description, Some(true));
        assert_eq!(errors.links, vec![None, Some(true), Some(true)]);
    }

    #[test]
    fn test_admin_form_valid() {
        let errors = check_admin_form("Bude", "Am See", &["https://a.example".to_string()]);
        assert!(errors.is_empty());
        assert!(errors.links.is_empty());
    }

    #[test]
    fn test_form_errors_serialization_skips_unset_flags() {
        let errors = check_admin_form("Bude", "", &[]);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "messages": ["Beschreibung ist leer."], "description": true, "links": [] })
        );
    }

    #[test]
    fn test_caps_count_characters() {
        let umlauts = "ä".repeat(caps::BUDE_NAME);
        assert!(require_text("name", &umlauts, caps::BUDE_NAME).is_ok());
        assert!(require_text("name", &format!("{}x", umlauts), caps::BUDE_NAME).is_err());
        assert!(require_text("name", "   ", caps::BUDE_NAME).is_err());
    }

    #[test]
    fn test_coordinates() {
        assert!(check_coordinates(48.1, 11.5).is_ok());
        assert!(check_coordinates(-90.0, 180.0).is_ok());
        assert!(check_coordinates(90.1, 0.0).is_err());
        assert!(check_coordinates(0.0, -180.5).is_err());
        assert!(check_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_contacts() {
        assert!(is_valid_contact("wirt@example.com"));
        assert!(is_valid_contact("+49 170 1234567"));
        assert!(is_valid_contact("0170/1234567"));
        assert!(is_valid_contact("(0170) 123-4567"));
        assert!(!is_valid_contact("123"));
        assert!(!is_valid_contact("call me"));
        assert!(!is_valid_contact("wirt@example"));
        assert!(!is_valid_contact("+49 170 1234567 8901 2345"));
        assert!(!is_valid_contact(""));
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("4f1c2d3e-0001-4000-8000-000000000001"));
        assert!(!is_uuid("b1"));
    }

    proptest! {
        #[test]
        fn phone_numbers_with_valid_digit_counts_accepted(digits in "[0-9]{7,15}") {
            prop_assert!(is_valid_contact(&digits));
            let plus = format!("+{}", digits);
            prop_assert!(is_valid_contact(&plus));
        }

        #[test]
        fn text_within_cap_accepted(s in "[a-zA-Z]{1,64}") {
            prop_assert!(require_text("name", &s, caps::BUDE_NAME).is_ok());
        }
    }
}

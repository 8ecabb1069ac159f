use crate::domain::value_objects::{GuestId, TableNumber};
use serde::{Deserialize, Serialize};

/// A guest as known to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub name: String,
    pub table: TableNumber,
    #[serde(default)]
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Guest {
    pub fn new(id: GuestId, name: impl Into<String>, table: TableNumber) -> Result<Self, String> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            table,
            present: false,
            phone: None,
            email: None,
        })
    }

    pub fn from_draft(id: GuestId, draft: GuestDraft) -> Self {
        Self {
            id,
            name: draft.name,
            table: draft.table,
            present: draft.present,
            phone: draft.phone,
            email: draft.email,
        }
    }

    pub fn to_draft(&self) -> GuestDraft {
        GuestDraft {
            name: self.name.clone(),
            table: self.table,
            present: self.present,
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }

    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    pub fn with_contact(mut self, phone: Option<String>, email: Option<String>) -> Self {
        self.phone = phone;
        self.email = email;
        self
    }

    /// Case-insensitive substring match on the name.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty() || self.name.to_lowercase().contains(&term)
    }
}

/// A guest that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDraft {
    pub name: String,
    pub table: TableNumber,
    #[serde(default)]
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl GuestDraft {
    pub fn new(name: impl Into<String>, table: TableNumber) -> Result<Self, String> {
        let name = validate_name(name.into())?;
        Ok(Self {
            name,
            table,
            present: false,
            phone: None,
            email: None,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Guest name cannot be empty".to_string());
        }
        Ok(())
    }
}

fn validate_name(name: String) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Guest name cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: u32) -> TableNumber {
        TableNumber::new(n).unwrap()
    }

    #[test]
    fn new_guest_is_absent_and_trimmed() {
        let guest = Guest::new(GuestId::parse("rec1").unwrap(), "  Alice ", table(3)).unwrap();
        assert_eq!(guest.name, "Alice");
        assert!(!guest.present);
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(Guest::new(GuestId::parse("rec1").unwrap(), "   ", table(1)).is_err());
        assert!(GuestDraft::new("", table(1)).is_err());
    }

    #[test]
    fn search_is_case_insensitive() {
        let guest = Guest::new(GuestId::parse("rec1").unwrap(), "Amélie Durand", table(2)).unwrap();
        assert!(guest.matches_search("durand"));
        assert!(guest.matches_search("AMÉLIE"));
        assert!(guest.matches_search(""));
        assert!(!guest.matches_search("martin"));
    }

    #[test]
    fn draft_round_trips_through_guest() {
        let draft = GuestDraft::new("Bob", table(4)).unwrap();
        let guest = Guest::from_draft(GuestId::local(), draft.clone());
        assert_eq!(guest.to_draft(), draft);
        assert!(guest.id.is_local());
    }

    #[test]
    fn contact_fields_are_optional_in_json() {
        let json = r#"{"id":"rec9","name":"Chloé","table":5}"#;
        let guest: Guest = serde_json::from_str(json).unwrap();
        assert!(!guest.present);
        assert!(guest.phone.is_none());
        let encoded = serde_json::to_string(&guest).unwrap();
        assert!(!encoded.contains("phone"));
    }
}

//! Lenient decoding helpers shared by both spreadsheet backends.
//!
//! Spreadsheet cells come back as numbers, strings or booleans depending on
//! how they were typed, so the wire types accept all of them.

use crate::domain::entities::Guest;
use crate::domain::value_objects::{GuestId, TableNumber};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    pub(crate) fn as_u32(&self) -> Option<u32> {
        match self {
            LooseNumber::Int(value) => u32::try_from(*value).ok(),
            LooseNumber::Float(value) if value.fract() == 0.0 && *value >= 0.0 => {
                u32::try_from(*value as u64).ok()
            }
            LooseNumber::Float(_) => None,
            LooseNumber::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseBool {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl LooseBool {
    pub(crate) fn as_bool(&self) -> bool {
        match self {
            LooseBool::Bool(value) => *value,
            LooseBool::Number(value) => *value != 0,
            LooseBool::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "oui" | "x"
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseText {
    Text(String),
    Int(i64),
    Float(f64),
}

impl LooseText {
    pub(crate) fn into_string(self) -> String {
        match self {
            LooseText::Text(text) => text,
            LooseText::Int(value) => value.to_string(),
            LooseText::Float(value) => value.to_string(),
        }
    }
}

/// Raw guest fields as decoded from either backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct GuestFields {
    pub name: Option<String>,
    pub table: Option<LooseNumber>,
    pub present: Option<LooseBool>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl GuestFields {
    /// Builds a guest, defaulting the table to 1 and `present` to false.
    /// Returns `None` for rows without a usable name or identifier.
    pub(crate) fn into_guest(self, id: &str) -> Option<Guest> {
        let id = GuestId::parse(id).ok()?;
        let table = match self.table.as_ref().and_then(LooseNumber::as_u32) {
            Some(value) => TableNumber::new(value).unwrap_or_default(),
            None => TableNumber::default(),
        };
        let present = self.present.as_ref().is_some_and(LooseBool::as_bool);

        let guest = Guest::new(id, self.name.unwrap_or_default(), table).ok()?;
        Some(
            guest
                .with_present(present)
                .with_contact(non_blank(self.phone), non_blank(self.email)),
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_decode_from_any_cell_type() {
        let values: Vec<LooseNumber> = serde_json::from_str(r#"[3, 4.0, " 5 ", 2.5, "x"]"#).unwrap();
        let decoded: Vec<Option<u32>> = values.iter().map(LooseNumber::as_u32).collect();
        assert_eq!(decoded, vec![Some(3), Some(4), Some(5), None, None]);
    }

    #[test]
    fn booleans_decode_from_any_cell_type() {
        let values: Vec<LooseBool> =
            serde_json::from_str(r#"[true, false, 1, 0, "TRUE", "non", "oui"]"#).unwrap();
        let decoded: Vec<bool> = values.iter().map(LooseBool::as_bool).collect();
        assert_eq!(decoded, vec![true, false, true, false, true, false, true]);
    }

    #[test]
    fn fields_default_table_and_presence() {
        let fields = GuestFields {
            name: Some("Alice".into()),
            table: Some(LooseNumber::Int(0)),
            ..GuestFields::default()
        };
        let guest = fields.into_guest("rec1").unwrap();
        assert_eq!(guest.table.value(), 1);
        assert!(!guest.present);
        assert!(guest.phone.is_none());
    }

    #[test]
    fn rows_without_name_are_rejected() {
        let fields = GuestFields {
            name: Some("  ".into()),
            ..GuestFields::default()
        };
        assert!(fields.into_guest("rec1").is_none());
        assert!(GuestFields::default().into_guest("").is_none());
    }
}

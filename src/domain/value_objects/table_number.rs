use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TableNumber(u32);

impl TableNumber {
    pub fn new(value: u32) -> Result<Self, String> {
        if value == 0 {
            return Err("Table number must be positive".to_string());
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for TableNumber {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for TableNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for TableNumber {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableNumber> for u32 {
    fn from(table: TableNumber) -> Self {
        table.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_table() {
        assert!(TableNumber::new(0).is_err());
        assert_eq!(TableNumber::new(7).unwrap().value(), 7);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<TableNumber>("0").is_err());
        assert_eq!(serde_json::from_str::<TableNumber>("3").unwrap().value(), 3);
    }
}

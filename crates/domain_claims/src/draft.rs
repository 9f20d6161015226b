//! Claim draft
//!
//! A draft is the open-ended field map the validator builds from caller input
//! and the formatter consumes. Keys are kept exactly as the caller wrote them;
//! every lookup goes through [`normalize_field_name`] so `MemberID`,
//! `member_id` and `Member ID` address the same field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical names for the fields the workflow knows about
pub mod fields {
    pub const NAME: &str = "Name";
    pub const MEMBER_ID: &str = "MemberID";
    pub const DATE_OF_BIRTH: &str = "DateOfBirth";
    pub const GENDER: &str = "Gender";
    pub const ADDRESS: &str = "Address";
    pub const CITY: &str = "City";
    pub const STATE: &str = "State";
    pub const ZIP: &str = "Zip";
    pub const PAYER_NAME: &str = "PayerName";
    pub const PAYER_ID: &str = "PayerID";
    pub const PROVIDER_NAME: &str = "ProviderName";
    pub const PROVIDER_NPI: &str = "ProviderNPI";
    pub const PROVIDER_TAX_ID: &str = "ProviderTaxID";
    pub const PROVIDER_ADDRESS: &str = "ProviderAddress";
    pub const PROVIDER_CITY: &str = "ProviderCity";
    pub const PROVIDER_STATE: &str = "ProviderState";
    pub const PROVIDER_ZIP: &str = "ProviderZip";
    pub const CLAIM_ID: &str = "ClaimID";
    pub const TOTAL_CHARGE: &str = "TotalCharge";
    pub const PLACE_OF_SERVICE: &str = "PlaceOfService";
    pub const DIAGNOSIS_CODES: &str = "DiagnosisCodes";
    pub const SERVICE_DATE: &str = "ServiceDate";
    pub const PROCEDURE_CODE: &str = "ProcedureCode";
    pub const SERVICE_LINES: &str = "ServiceLines";
    pub const CHARGE: &str = "Charge";
    pub const UNITS: &str = "Units";
}

/// Normalizes a field name for comparison
///
/// Drops everything but letters and digits and lowercases the rest.
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Returns true when a value counts as supplied
///
/// Null, blank strings and empty containers are treated as missing.
pub fn value_is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Structured claim fields produced by the validator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimDraft {
    fields: Map<String, Value>,
}

impl ClaimDraft {
    /// Creates an empty draft
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a draft from a JSON object, merging keys that normalize alike
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut draft = Self::new();
        for (key, value) in map {
            draft.insert(key, value);
        }
        draft
    }

    /// Inserts or overrides a field
    ///
    /// When a field with the same normalized name exists, its value is
    /// replaced and the original key spelling and position are kept.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.existing_key(&key) {
            Some(existing) => {
                if let Some(slot) = self.fields.get_mut(&existing) {
                    *slot = value;
                }
            }
            None => {
                self.fields.insert(key, value);
            }
        }
    }

    /// Merges another draft into this one, later values winning
    pub fn merge(&mut self, other: ClaimDraft) {
        for (key, value) in other.fields {
            self.insert(key, value);
        }
    }

    /// Looks up a field by any spelling of its name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.existing_key(name).and_then(|k| self.fields.get(&k))
    }

    /// Returns a field as trimmed text when it is a present scalar
    pub fn get_text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns true when the named field is present
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).map(value_is_present).unwrap_or(false)
    }

    /// Returns the required fields that are absent, in the order given
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| !self.is_present(r))
            .map(str::to_string)
            .collect()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no fields were supplied
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names as supplied
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Borrowed view of the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts the draft into a JSON object value
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    fn existing_key(&self, name: &str) -> Option<String> {
        let wanted = normalize_field_name(name);
        self.fields
            .keys()
            .find(|k| normalize_field_name(k) == wanted)
            .cloned()
    }
}

impl From<Map<String, Value>> for ClaimDraft {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> ClaimDraft {
        match value {
            Value::Object(map) => ClaimDraft::from_map(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("MemberID"), "memberid");
        assert_eq!(normalize_field_name("member_id"), "memberid");
        assert_eq!(normalize_field_name(" Member-ID "), "memberid");
    }

    #[test]
    fn test_lookup_ignores_spelling() {
        let d = draft(json!({"member_id": "MEM1"}));
        assert_eq!(d.get_text(fields::MEMBER_ID).as_deref(), Some("MEM1"));
    }

    #[test]
    fn test_insert_keeps_original_key() {
        let mut d = draft(json!({"Name": "Corey Maher", "member id": "OLD"}));
        d.insert("MemberID", json!("MEM1234553"));

        assert_eq!(d.len(), 2);
        assert_eq!(d.keys().nth(1).map(String::as_str), Some("member id"));
        assert_eq!(d.get_text("MemberID").as_deref(), Some("MEM1234553"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let d = draft(json!({"Name": "  ", "MemberID": null, "Zip": 12345}));
        assert_eq!(
            d.missing(&["Name", "MemberID", "Zip"]),
            vec!["Name".to_string(), "MemberID".to_string()]
        );
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut d = ClaimDraft::new();
        d.insert("Name", json!("Corey Maher"));
        d.insert("MemberID", json!("MEM1234553"));

        let text = serde_json::to_string(&d).unwrap();
        assert_eq!(text, r#"{"Name":"Corey Maher","MemberID":"MEM1234553"}"#);
    }
}

//! Field extraction from free-form caller input
//!
//! The grammar is deliberately small: one `Key: value` or `Key = value` pair
//! per line (or per `;`-separated chunk), an embedded JSON object, or a bare
//! answer to a single outstanding question. Nothing is inferred beyond that.

use serde_json::Value;
use tracing::debug;

use crate::draft::ClaimDraft;

const MAX_KEY_LEN: usize = 40;

/// Fields found in a piece of text plus whatever could not be read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: ClaimDraft,
    pub unparsed: Vec<String>,
}

impl Extraction {
    /// The whole input as a single answer, when nothing else was recognised
    ///
    /// Only single-chunk text qualifies.
    pub fn bare_answer(&self) -> Option<String> {
        if !self.fields.is_empty() || self.unparsed.len() != 1 {
            return None;
        }
        Some(strip_quotes(&self.unparsed[0]).to_string())
    }
}

/// Extracts claim fields from text or image-derived text
pub fn extract_fields(text: &str) -> Extraction {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            return Extraction {
                fields: ClaimDraft::from_map(map),
                unparsed: Vec::new(),
            };
        }
    }

    let mut extraction = Extraction::default();
    for chunk in trimmed.split(['\n', ';']) {
        let chunk = chunk.trim().trim_start_matches(['-', '*', '•']).trim();
        if chunk.is_empty() {
            continue;
        }
        match split_pair(chunk) {
            Some((key, value)) => {
                debug!(field = key, "Extracted claim field from text");
                extraction.fields.insert(key, Value::String(value.to_string()));
            }
            None => extraction.unparsed.push(chunk.to_string()),
        }
    }
    extraction
}

fn split_pair(chunk: &str) -> Option<(&str, &str)> {
    let idx = chunk.find([':', '='])?;
    // `10:30` is a time, not a pair
    let digit_before = chunk[..idx].chars().last().map(|c| c.is_ascii_digit()).unwrap_or(false);
    let digit_after = chunk[idx + 1..].chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);
    if digit_before && digit_after {
        return None;
    }
    let key = chunk[..idx].trim();
    let value = strip_quotes(chunk[idx + 1..].trim());

    let key_ok = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.chars().any(char::is_alphabetic)
        && key.chars().all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'));

    if key_ok && !value.is_empty() {
        Some((strip_quotes(key), value))
    } else {
        None
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_colon_and_equals_pairs() {
        let extraction = extract_fields("Name: Corey Maher\nMemberID = MEM1234553");
        assert_eq!(extraction.fields.get_text("Name").as_deref(), Some("Corey Maher"));
        assert_eq!(extraction.fields.get_text("MemberID").as_deref(), Some("MEM1234553"));
        assert!(extraction.unparsed.is_empty());
    }

    #[test]
    fn test_semicolon_chunks_and_bullets() {
        let extraction = extract_fields("- Name: Corey Maher; - Zip: 30301");
        assert_eq!(extraction.fields.len(), 2);
    }

    #[test]
    fn test_embedded_json_object() {
        let extraction = extract_fields(r#"{"Name":"Corey Maher"}"#);
        assert_eq!(extraction.fields.get_text("name").as_deref(), Some("Corey Maher"));
    }

    #[test]
    fn test_bare_answer() {
        let extraction = extract_fields("  \"MEM1234553\" ");
        assert!(extraction.fields.is_empty());
        assert_eq!(extraction.bare_answer().as_deref(), Some("MEM1234553"));
    }

    #[test]
    fn test_numeric_key_is_not_a_field() {
        let extraction = extract_fields("Appointment at 10:30");
        assert!(extraction.fields.is_empty());
        assert_eq!(extraction.unparsed, vec!["Appointment at 10:30".to_string()]);
    }

    #[test]
    fn test_multiline_prose_is_not_a_bare_answer() {
        let extraction = extract_fields("first line\nsecond line");
        assert!(extraction.bare_answer().is_none());
    }
}

//! Conversation DTOs

use domain_claims::{ClaimSession, DelegationReport, StorageTarget, Turn, WorkflowState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use super::StorageTargetDto;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OpenConversationRequest {
    #[serde(default)]
    #[validate(nested)]
    pub storage: Option<StorageTargetDto>,
}

/// Raw caller input: text, claim fields, or an adjudicated claim to review
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitMessageRequest {
    #[validate(custom(function = "validate_input"))]
    pub input: Value,
}

fn validate_input(input: &Value) -> Result<(), ValidationError> {
    match input {
        Value::Null => Err(ValidationError::new("empty_input")),
        Value::String(text) if text.trim().is_empty() => Err(ValidationError::new("empty_input")),
        Value::Object(map) if map.is_empty() => Err(ValidationError::new("empty_input")),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub state: WorkflowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageTarget>,
    pub turns: Vec<Turn>,
}

impl From<&ClaimSession> for ConversationResponse {
    fn from(session: &ClaimSession) -> Self {
        Self {
            conversation_id: session.id().to_string(),
            state: session.state(),
            storage: session.context().storage.clone(),
            turns: session.context().turns.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitMessageResponse {
    pub conversation_id: String,
    pub state: WorkflowState,
    pub report: DelegationReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_input_is_invalid() {
        let request = SubmitMessageRequest { input: json!("  ") };
        assert!(request.validate().is_err());

        let request = SubmitMessageRequest { input: json!({}) };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_text_and_fields_are_valid() {
        assert!(SubmitMessageRequest { input: json!("MEM1234553") }.validate().is_ok());
        assert!(SubmitMessageRequest { input: json!({"Name": "Corey Maher"}) }.validate().is_ok());
    }

    #[test]
    fn test_short_bucket_is_invalid() {
        let request = OpenConversationRequest {
            storage: Some(StorageTargetDto {
                bucket: "ab".to_string(),
                key: None,
            }),
        };
        assert!(request.validate().is_err());
    }
}

//! Agent DTOs

use domain_claims::{Agent, AgentMessage, ConversationContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::StorageTargetDto;

#[derive(Debug, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub instruction: String,
}

impl AgentInfo {
    pub fn of(agent: &dyn Agent) -> Self {
        Self {
            name: agent.name().to_string(),
            description: agent.description().to_string(),
            instruction: agent.instruction().to_string(),
        }
    }
}

/// Invokes one stage directly
///
/// `inputs` are appended as user turns to `context`, or to a fresh
/// conversation when no context is given.
#[derive(Debug, Deserialize, Validate)]
pub struct AgentRespondRequest {
    #[serde(default)]
    pub context: Option<ConversationContext>,
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default)]
    #[validate(nested)]
    pub storage: Option<StorageTargetDto>,
}

#[derive(Debug, Serialize)]
pub struct AgentRespondResponse {
    pub agent: String,
    pub conversation_id: String,
    pub message: AgentMessage,
}

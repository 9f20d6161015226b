//! Agent surface and conversation model
//!
//! Every stage (validator, formatter, checker) and the orchestrator expose
//! the same operation: `respond(conversation_context) -> message`. The
//! conversation is an ordered list of user inputs and agent messages; stages
//! read what they need from it and never mutate it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{ConversationId, TurnId};

use crate::adjudication::{AdjudicatedClaim, EvaluationRules};
use crate::draft::ClaimDraft;
use crate::edi::Edi837Document;
use crate::error::ClaimError;
use crate::outcome::OutcomeMessage;
use crate::persist::PersistOutcome;
use crate::workflow::DelegationReport;

pub const VALIDATOR_AGENT: &str = "claim_validator";
pub const FORMATTER_AGENT: &str = "formatter_agent";
pub const CHECKER_AGENT: &str = "post_adjudication_check_agent";
pub const ROOT_AGENT: &str = "root_agent";

/// Static description of an agent: name, routing description and contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub instruction: String,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instruction: instruction.into(),
        }
    }
}

/// Where the validator should persist its draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTarget {
    pub bucket: String,
    /// Object key; defaults to `claims/<conversation-id>.json`
    #[serde(default)]
    pub key: Option<String>,
}

impl StorageTarget {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Resolves the object key for a conversation
    pub fn resolve_key(&self, conversation_id: &ConversationId) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("claims/{}.json", conversation_id.as_uuid()))
    }
}

/// Something the caller said
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserInput {
    /// Free-form text
    Text { text: String },
    /// Text recognised from an image (scanned claim form, card photo)
    ImageText {
        text: String,
        #[serde(default)]
        source: Option<String>,
    },
    /// Already structured claim fields
    Fields { fields: ClaimDraft },
    /// An adjudicated claim to evaluate against plain-language rules
    Review {
        claim: AdjudicatedClaim,
        instructions: EvaluationRules,
    },
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        UserInput::Text { text: text.into() }
    }

    /// Interprets loosely shaped JSON from a caller
    ///
    /// Strings become text, objects with `claim` and `instructions` become a
    /// review, objects tagged with `type` are decoded as-is, and any other
    /// object is taken as claim fields.
    pub fn from_json(value: Value) -> Result<Self, ClaimError> {
        match value {
            Value::String(text) => Ok(UserInput::Text { text }),
            Value::Object(map) if map.contains_key("claim") && map.contains_key("instructions") => {
                let claim = serde_json::from_value(map["claim"].clone())?;
                let instructions = serde_json::from_value(map["instructions"].clone())?;
                Ok(UserInput::Review { claim, instructions })
            }
            Value::Object(map) if map.get("type").map(Value::is_string).unwrap_or(false) => {
                Ok(serde_json::from_value(Value::Object(map))?)
            }
            Value::Object(map) => Ok(UserInput::Fields {
                fields: ClaimDraft::from_map(map),
            }),
            other => Ok(UserInput::Text {
                text: other.to_string(),
            }),
        }
    }

    /// True for inputs that ask to check an already adjudicated claim
    pub fn is_review(&self) -> bool {
        matches!(self, UserInput::Review { .. })
    }
}

/// What an agent answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Validated claim fields, with the persistence report when storage was requested
    ClaimDraft {
        draft: ClaimDraft,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        persistence: Option<PersistOutcome>,
    },
    /// Required fields are missing; the caller must supply them
    NeedsInput {
        missing_fields: Vec<String>,
        prompt: String,
    },
    /// Formatted EDI 837 claim
    Edi837 { document: Edi837Document },
    /// The formatter refused an incomplete or malformed draft
    Rejected { reason: String, fields: Vec<String> },
    /// Post-adjudication result
    Outcome { outcome: OutcomeMessage },
    /// Orchestrator report listing the stages it delegated to
    Delegation { report: DelegationReport },
}

impl AgentMessage {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::ClaimDraft { .. } => "claim_draft",
            AgentMessage::NeedsInput { .. } => "needs_input",
            AgentMessage::Edi837 { .. } => "edi_837",
            AgentMessage::Rejected { .. } => "rejected",
            AgentMessage::Outcome { .. } => "outcome",
            AgentMessage::Delegation { .. } => "delegation",
        }
    }
}

/// Who produced a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TurnEntry {
    User { input: UserInput },
    Agent { agent: String, message: AgentMessage },
}

/// One entry in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: TurnEntry,
}

impl Turn {
    pub fn user(input: UserInput) -> Self {
        Self {
            id: TurnId::new_v7(),
            at: Utc::now(),
            entry: TurnEntry::User { input },
        }
    }

    pub fn agent(agent: impl Into<String>, message: AgentMessage) -> Self {
        Self {
            id: TurnId::new_v7(),
            at: Utc::now(),
            entry: TurnEntry::Agent {
                agent: agent.into(),
                message,
            },
        }
    }

    pub fn user_input(&self) -> Option<&UserInput> {
        match &self.entry {
            TurnEntry::User { input } => Some(input),
            TurnEntry::Agent { .. } => None,
        }
    }

    pub fn agent_message(&self) -> Option<(&str, &AgentMessage)> {
        match &self.entry {
            TurnEntry::Agent { agent, message } => Some((agent.as_str(), message)),
            TurnEntry::User { .. } => None,
        }
    }
}

/// The conversation an agent responds to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub storage: Option<StorageTarget>,
}

impl ConversationContext {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            turns: Vec::new(),
            storage: None,
        }
    }

    pub fn with_storage(mut self, target: StorageTarget) -> Self {
        self.storage = Some(target);
        self
    }

    /// Convenience constructor for a single user input
    pub fn from_input(input: UserInput) -> Self {
        let mut context = Self::new(ConversationId::new_v7());
        context.push_user(input);
        context
    }

    pub fn push_user(&mut self, input: UserInput) {
        self.turns.push(Turn::user(input));
    }

    pub fn push_agent(&mut self, agent: impl Into<String>, message: AgentMessage) {
        self.turns.push(Turn::agent(agent, message));
    }

    /// The most recent user input
    pub fn latest_user_input(&self) -> Option<&UserInput> {
        self.turns.iter().rev().find_map(Turn::user_input)
    }

    /// The most recent agent message, with the agent's name
    pub fn latest_agent_message(&self) -> Option<(&str, &AgentMessage)> {
        self.turns.iter().rev().find_map(Turn::agent_message)
    }

    /// Index and message of the most recent turn by the named agent
    pub fn last_message_from(&self, agent: &str) -> Option<(usize, &AgentMessage)> {
        self.turns
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, turn)| match turn.agent_message() {
                Some((name, message)) if name == agent => Some((idx, message)),
                _ => None,
            })
    }
}

/// A participant in the claims workflow
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name, description and instruction for this agent
    fn profile(&self) -> &AgentProfile;

    /// Produces this agent's reply to the conversation
    async fn respond(&self, context: &ConversationContext) -> Result<AgentMessage, ClaimError>;

    fn name(&self) -> &str {
        &self.profile().name
    }

    /// When a router should pick this agent
    fn description(&self) -> &str {
        &self.profile().description
    }

    /// The agent's behavioural contract
    fn instruction(&self) -> &str {
        &self.profile().instruction
    }
}

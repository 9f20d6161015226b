//! Claim validator agent
//!
//! Builds a [`ClaimDraft`] from everything the caller has said since the last
//! accepted draft. When required fields are missing it asks for them by name
//! instead of inventing values. When the conversation names a storage target
//! the accepted draft is persisted and the result reported alongside it.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::agent::{
    Agent, AgentMessage, AgentProfile, ConversationContext, UserInput, FORMATTER_AGENT,
    VALIDATOR_AGENT,
};
use crate::draft::{fields, ClaimDraft};
use crate::error::ClaimError;
use crate::extraction::extract_fields;
use crate::persist::{Persist, PersistOutcome};

/// Validator settings
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Fields that must be present before a draft is accepted, in prompt order
    pub required_fields: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            required_fields: vec![fields::NAME.to_string(), fields::MEMBER_ID.to_string()],
        }
    }
}

/// The claim validator
pub struct ClaimValidator {
    profile: AgentProfile,
    config: ValidatorConfig,
    persist: Option<Persist>,
}

impl ClaimValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            profile: AgentProfile::new(
                VALIDATOR_AGENT,
                "Validates claim data from text or images, extracts fields into JSON. \
                 Use this agent first to process raw claim information.",
                "Read text or image-derived text and extract claim fields into a JSON object. \
                 If required fields are missing, ask the caller to provide them. \
                 If a storage bucket is provided, save the JSON output there.",
            ),
            config,
            persist: None,
        }
    }

    /// Gives the validator the Persist capability
    pub fn with_persist(mut self, persist: Persist) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Merges the caller's inputs for the claim currently being validated
    ///
    /// Starts after the validator's last accepted draft, unless the formatter
    /// rejected that draft, in which case the draft is the starting point and
    /// later inputs correct it. A bare answer fills the one field the latest
    /// request asked for.
    pub fn collect_fields(&self, context: &ConversationContext) -> ClaimDraft {
        let mut draft = ClaimDraft::new();
        let mut start = 0;

        if let Some((idx, AgentMessage::ClaimDraft { draft: accepted, .. })) =
            last_draft(context)
        {
            start = idx + 1;
            let rejected_after = context.turns[start..].iter().any(|t| {
                matches!(
                    t.agent_message(),
                    Some((FORMATTER_AGENT, AgentMessage::Rejected { .. }))
                )
            });
            if rejected_after {
                draft = accepted.clone();
            }
        }

        let mut pending: Vec<String> = Vec::new();
        for turn in &context.turns[start..] {
            if let Some((agent, message)) = turn.agent_message() {
                match (agent, message) {
                    (VALIDATOR_AGENT, AgentMessage::NeedsInput { missing_fields, .. }) => {
                        pending = missing_fields.clone();
                    }
                    (FORMATTER_AGENT, AgentMessage::Rejected { fields, .. }) => {
                        pending = fields.clone();
                    }
                    _ => {}
                }
                continue;
            }

            let Some(input) = turn.user_input() else {
                continue;
            };
            match input {
                UserInput::Fields { fields } => draft.merge(fields.clone()),
                UserInput::Text { text } | UserInput::ImageText { text, .. } => {
                    let extraction = extract_fields(text);
                    match (extraction.bare_answer(), pending.as_slice()) {
                        (Some(answer), [field]) => {
                            debug!(field = %field, "Bare answer assigned to requested field");
                            draft.insert(field.clone(), serde_json::Value::String(answer));
                        }
                        _ => draft.merge(extraction.fields),
                    }
                }
                UserInput::Review { .. } => {}
            }
        }

        draft
    }
}

fn last_draft(context: &ConversationContext) -> Option<(usize, &AgentMessage)> {
    context
        .turns
        .iter()
        .enumerate()
        .rev()
        .find_map(|(idx, turn)| match turn.agent_message() {
            Some((VALIDATOR_AGENT, message @ AgentMessage::ClaimDraft { .. })) => {
                Some((idx, message))
            }
            _ => None,
        })
}

/// Builds the question asked when fields are missing
pub fn missing_fields_prompt(missing: &[String]) -> String {
    match missing {
        [only] => format!("Please provide the {} for this claim.", only),
        _ => format!(
            "Please provide the following required claim fields: {}.",
            missing.join(", ")
        ),
    }
}

#[async_trait]
impl Agent for ClaimValidator {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn respond(&self, context: &ConversationContext) -> Result<AgentMessage, ClaimError> {
        let draft = self.collect_fields(context);
        let missing = draft.missing(&self.config.required_fields);

        if !missing.is_empty() {
            info!(
                conversation = %context.conversation_id,
                missing = ?missing,
                "Claim is missing required fields"
            );
            return Ok(AgentMessage::NeedsInput {
                prompt: missing_fields_prompt(&missing),
                missing_fields: missing,
            });
        }

        let persistence = match (&context.storage, &self.persist) {
            (Some(target), Some(persist)) => {
                let key = target.resolve_key(&context.conversation_id);
                Some(persist.save(&target.bucket, &key, &draft).await)
            }
            (Some(_), None) => Some(PersistOutcome::error("No object store is configured")),
            (None, _) => None,
        };

        info!(
            conversation = %context.conversation_id,
            fields = draft.len(),
            persisted = persistence.as_ref().map(PersistOutcome::is_success),
            "Claim validated"
        );

        Ok(AgentMessage::ClaimDraft { draft, persistence })
    }
}

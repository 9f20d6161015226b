//! Orchestration of the claims workflow
//!
//! The orchestrator routes each caller input to exactly one entry stage and
//! forwards validator output to the formatter. It never validates, formats or
//! checks anything itself; every stage is an [`Agent`] behind an `Arc` and
//! can be swapped independently.
//!
//! # Workflow states
//!
//! ```text
//! Idle -> Validating -> NeedsInput
//!                    -> Validated -> Formatting -> Done
//!                                              -> NeedsInput
//! Idle -> Checking -> Done
//! ```
//!
//! The state is derived from the conversation, so the orchestrator itself
//! holds no per-conversation state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use core_kernel::{ConversationId, CoreError};

use crate::agent::{
    Agent, AgentMessage, AgentProfile, ConversationContext, StorageTarget, UserInput,
    CHECKER_AGENT, FORMATTER_AGENT, ROOT_AGENT, VALIDATOR_AGENT,
};
use crate::error::ClaimError;

/// Where a conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Validating,
    Validated,
    NeedsInput,
    Formatting,
    Checking,
    Done,
}

impl WorkflowState {
    /// Derives the state from the last stage message in a conversation
    pub fn derive(context: &ConversationContext) -> Self {
        let last_stage = context
            .turns
            .iter()
            .rev()
            .find_map(|turn| turn.agent_message().filter(|(agent, _)| *agent != ROOT_AGENT));

        match last_stage {
            None => WorkflowState::Idle,
            Some((VALIDATOR_AGENT, AgentMessage::NeedsInput { .. })) => WorkflowState::NeedsInput,
            Some((VALIDATOR_AGENT, AgentMessage::ClaimDraft { .. })) => WorkflowState::Validated,
            Some((FORMATTER_AGENT, AgentMessage::Rejected { .. })) => WorkflowState::NeedsInput,
            Some(_) => WorkflowState::Done,
        }
    }

    /// Checks if a transition is valid
    pub fn can_transition_to(self, target: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, target),
            (Idle | NeedsInput | Validated | Done, Validating)
                | (Idle | NeedsInput | Validated | Done, Checking)
                | (Validating, Validated)
                | (Validating, NeedsInput)
                | (Validating, Done)
                | (Validated, Formatting)
                | (Formatting, Done)
                | (Formatting, NeedsInput)
                | (Checking, Done)
        )
    }

    /// States a turn can end in
    pub fn is_resting(self) -> bool {
        matches!(
            self,
            WorkflowState::Idle
                | WorkflowState::NeedsInput
                | WorkflowState::Validated
                | WorkflowState::Done
        )
    }

    /// The target state, if the move is allowed
    pub fn transition_to(self, target: WorkflowState) -> Result<WorkflowState, CoreError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(CoreError::invalid_transition(format!("{:?}", self), format!("{:?}", target)))
        }
    }

    fn advance(&mut self, next: WorkflowState) {
        if let Err(err) = self.transition_to(next) {
            debug_assert!(false, "{}", err);
            warn!(error = %err, "Unexpected workflow transition");
        }
        debug!(from = ?self, to = ?next, "Workflow transition");
        *self = next;
    }
}

/// What the caller wants from a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Process a new claim
    NewClaim,
    /// Answer an earlier request for missing or rejected fields
    Resupply,
    /// Check an already adjudicated claim
    CheckClaim,
}

impl Intent {
    pub fn classify(input: &UserInput, state: WorkflowState) -> Self {
        if input.is_review() {
            Intent::CheckClaim
        } else if state == WorkflowState::NeedsInput {
            Intent::Resupply
        } else {
            Intent::NewClaim
        }
    }
}

/// One stage invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReply {
    pub agent: String,
    pub message: AgentMessage,
}

/// What the orchestrator did for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    pub final_state: WorkflowState,
    pub trail: Vec<StageReply>,
}

impl DelegationReport {
    /// The last stage's message
    pub fn final_message(&self) -> Option<&AgentMessage> {
        self.trail.last().map(|reply| &reply.message)
    }

    /// Names of the stages invoked, in order
    pub fn agents(&self) -> Vec<&str> {
        self.trail.iter().map(|r| r.agent.as_str()).collect()
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single stage invocation
    pub stage_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(30),
        }
    }
}

/// Routes requests to the validator, formatter and checker
pub struct Orchestrator {
    profile: AgentProfile,
    validator: Arc<dyn Agent>,
    formatter: Arc<dyn Agent>,
    checker: Arc<dyn Agent>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        validator: Arc<dyn Agent>,
        formatter: Arc<dyn Agent>,
        checker: Arc<dyn Agent>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            profile: AgentProfile::new(
                ROOT_AGENT,
                "Routes claim requests to the claim validator, formatter, or \
                 post-adjudication checker.",
                "For a new claim, send the input to the claim validator and forward a complete \
                 claim to the formatter. For a check on an adjudicated claim, send it to the \
                 post-adjudication checker. Never do a stage's work yourself.",
            ),
            validator,
            formatter,
            checker,
            config,
        }
    }

    pub fn validator(&self) -> &Arc<dyn Agent> {
        &self.validator
    }

    pub fn formatter(&self) -> &Arc<dyn Agent> {
        &self.formatter
    }

    pub fn checker(&self) -> &Arc<dyn Agent> {
        &self.checker
    }

    /// The stage agents, in workflow order
    pub fn stages(&self) -> [&Arc<dyn Agent>; 3] {
        [&self.validator, &self.formatter, &self.checker]
    }

    /// Looks up a stage by name
    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.stages().into_iter().find(|agent| agent.name() == name)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs the stages the latest user input calls for
    pub async fn delegate(&self, context: &ConversationContext) -> Result<DelegationReport, ClaimError> {
        let mut state = WorkflowState::derive(context);
        let Some(input) = context.latest_user_input() else {
            return Ok(DelegationReport {
                intent: None,
                final_state: state,
                trail: Vec::new(),
            });
        };

        let intent = Intent::classify(input, state);
        info!(
            conversation = %context.conversation_id,
            intent = ?intent,
            state = ?state,
            "Delegating request"
        );

        let mut trail = Vec::new();
        let mut working = context.clone();

        if intent == Intent::CheckClaim {
            state.advance(WorkflowState::Checking);
            let message = self.invoke(&self.checker, &working).await?;
            trail.push(StageReply {
                agent: CHECKER_AGENT.to_string(),
                message,
            });
            state.advance(WorkflowState::Done);
        } else {
            state.advance(WorkflowState::Validating);
            let message = self.invoke(&self.validator, &working).await?;
            working.push_agent(VALIDATOR_AGENT, message.clone());
            let validated = matches!(message, AgentMessage::ClaimDraft { .. });
            let needs_input = matches!(message, AgentMessage::NeedsInput { .. });
            trail.push(StageReply {
                agent: VALIDATOR_AGENT.to_string(),
                message,
            });

            if validated {
                state.advance(WorkflowState::Validated);
                state.advance(WorkflowState::Formatting);
                let message = self.invoke(&self.formatter, &working).await?;
                let rejected = matches!(message, AgentMessage::Rejected { .. });
                trail.push(StageReply {
                    agent: FORMATTER_AGENT.to_string(),
                    message,
                });
                if rejected {
                    state.advance(WorkflowState::NeedsInput);
                } else {
                    state.advance(WorkflowState::Done);
                }
            } else if needs_input {
                state.advance(WorkflowState::NeedsInput);
            } else {
                warn!(conversation = %context.conversation_id, "Validator returned an unexpected message");
                state.advance(WorkflowState::Done);
            }
        }

        info!(
            conversation = %context.conversation_id,
            final_state = ?state,
            stages = trail.len(),
            "Delegation complete"
        );

        Ok(DelegationReport {
            intent: Some(intent),
            final_state: state,
            trail,
        })
    }

    async fn invoke(
        &self,
        agent: &Arc<dyn Agent>,
        context: &ConversationContext,
    ) -> Result<AgentMessage, ClaimError> {
        let timeout = self.config.stage_timeout;
        match tokio::time::timeout(timeout, agent.respond(context)).await {
            Ok(result) => {
                let message = result?;
                debug!(agent = agent.name(), kind = message.kind(), "Stage replied");
                Ok(message)
            }
            Err(_) => {
                warn!(agent = agent.name(), timeout_ms = timeout.as_millis() as u64, "Stage timed out");
                Err(ClaimError::StageTimeout {
                    agent: agent.name().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl Agent for Orchestrator {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn respond(&self, context: &ConversationContext) -> Result<AgentMessage, ClaimError> {
        let report = self.delegate(context).await?;
        Ok(AgentMessage::Delegation { report })
    }
}

/// One claim conversation
///
/// Submitting input appends the user turn, runs the orchestrator and records
/// each stage reply as an agent turn. A failed submission leaves the
/// conversation as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSession {
    context: ConversationContext,
}

impl ClaimSession {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            context: ConversationContext::new(conversation_id),
        }
    }

    pub fn with_storage(mut self, target: StorageTarget) -> Self {
        self.context.storage = Some(target);
        self
    }

    pub fn from_context(context: ConversationContext) -> Self {
        Self { context }
    }

    pub fn id(&self) -> ConversationId {
        self.context.conversation_id
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::derive(&self.context)
    }

    pub async fn submit(
        &mut self,
        orchestrator: &Orchestrator,
        input: UserInput,
    ) -> Result<DelegationReport, ClaimError> {
        let checkpoint = self.context.turns.len();
        self.context.push_user(input);

        match orchestrator.delegate(&self.context).await {
            Ok(report) => {
                for reply in &report.trail {
                    self.context.push_agent(reply.agent.clone(), reply.message.clone());
                }
                Ok(report)
            }
            Err(err) => {
                self.context.turns.truncate(checkpoint);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Replies with a fixed message
    struct Scripted {
        profile: AgentProfile,
        reply: AgentMessage,
        delay: Duration,
    }

    impl Scripted {
        fn new(name: &str, reply: AgentMessage) -> Arc<dyn Agent> {
            Arc::new(Self {
                profile: AgentProfile::new(name, "scripted", "scripted"),
                reply,
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &str, reply: AgentMessage, delay: Duration) -> Arc<dyn Agent> {
            Arc::new(Self {
                profile: AgentProfile::new(name, "scripted", "scripted"),
                reply,
                delay,
            })
        }
    }

    #[async_trait]
    impl Agent for Scripted {
        fn profile(&self) -> &AgentProfile {
            &self.profile
        }

        async fn respond(&self, _context: &ConversationContext) -> Result<AgentMessage, ClaimError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.reply.clone())
        }
    }

    fn needs_member_id() -> AgentMessage {
        AgentMessage::NeedsInput {
            missing_fields: vec!["MemberID".to_string()],
            prompt: "Please provide the MemberID for this claim.".to_string(),
        }
    }

    fn rejected() -> AgentMessage {
        AgentMessage::Rejected {
            reason: "bad".to_string(),
            fields: vec!["DateOfBirth".to_string()],
        }
    }

    fn draft() -> AgentMessage {
        AgentMessage::ClaimDraft {
            draft: serde_json::from_value(json!({"Name": "A B", "MemberID": "M1"})).unwrap(),
            persistence: None,
        }
    }

    fn orchestrator(validator: AgentMessage, formatter: AgentMessage) -> Orchestrator {
        Orchestrator::new(
            Scripted::new(VALIDATOR_AGENT, validator),
            Scripted::new(FORMATTER_AGENT, formatter),
            Scripted::new(CHECKER_AGENT, needs_member_id()),
            OrchestratorConfig::default(),
        )
    }

    #[test]
    fn test_transitions() {
        use WorkflowState::*;
        assert!(Idle.can_transition_to(Validating));
        assert!(NeedsInput.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Validated));
        assert!(Formatting.can_transition_to(NeedsInput));
        assert!(!Idle.can_transition_to(Formatting));
        assert!(!Checking.can_transition_to(Validating));
        assert!(!Validating.can_transition_to(Checking));

        assert_eq!(Validated.transition_to(Formatting).unwrap(), Formatting);
        let err = Done.transition_to(Formatting).unwrap_err();
        assert!(err.to_string().contains("Done -> Formatting"));
    }

    #[test]
    fn test_derive_state() {
        let mut context = ConversationContext::from_input(UserInput::text("hi"));
        assert_eq!(WorkflowState::derive(&context), WorkflowState::Idle);

        context.push_agent(VALIDATOR_AGENT, needs_member_id());
        assert_eq!(WorkflowState::derive(&context), WorkflowState::NeedsInput);

        context.push_agent(VALIDATOR_AGENT, draft());
        assert_eq!(WorkflowState::derive(&context), WorkflowState::Validated);

        context.push_agent(FORMATTER_AGENT, rejected());
        assert_eq!(WorkflowState::derive(&context), WorkflowState::NeedsInput);
    }

    #[test]
    fn test_intent() {
        let text = UserInput::text("hi");
        assert_eq!(Intent::classify(&text, WorkflowState::Idle), Intent::NewClaim);
        assert_eq!(Intent::classify(&text, WorkflowState::NeedsInput), Intent::Resupply);
        assert_eq!(Intent::classify(&text, WorkflowState::Done), Intent::NewClaim);
    }

    #[tokio::test]
    async fn test_needs_input_stops_after_validator() {
        let orch = orchestrator(needs_member_id(), rejected());
        let context = ConversationContext::from_input(UserInput::text("Name: A B"));
        let report = orch.delegate(&context).await.unwrap();
        assert_eq!(report.final_state, WorkflowState::NeedsInput);
        assert_eq!(report.agents(), vec![VALIDATOR_AGENT]);
    }

    #[tokio::test]
    async fn test_draft_is_forwarded_to_formatter() {
        let orch = orchestrator(draft(), rejected());
        let context = ConversationContext::from_input(UserInput::text("Name: A B"));
        let report = orch.delegate(&context).await.unwrap();
        assert_eq!(report.agents(), vec![VALIDATOR_AGENT, FORMATTER_AGENT]);
        assert_eq!(report.final_state, WorkflowState::NeedsInput);
        assert_eq!(report.intent, Some(Intent::NewClaim));
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let orch = Orchestrator::new(
            Scripted::slow(VALIDATOR_AGENT, draft(), Duration::from_secs(5)),
            Scripted::new(FORMATTER_AGENT, rejected()),
            Scripted::new(CHECKER_AGENT, needs_member_id()),
            OrchestratorConfig {
                stage_timeout: Duration::from_millis(20),
            },
        );
        let mut session = ClaimSession::new(ConversationId::new_v7());
        let err = session.submit(&orch, UserInput::text("x")).await.unwrap_err();
        match err {
            ClaimError::StageTimeout { agent, timeout_ms } => {
                assert_eq!(agent, VALIDATOR_AGENT);
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(session.context().turns.is_empty());
    }

    #[tokio::test]
    async fn test_empty_context_delegates_nothing() {
        let orch = orchestrator(draft(), rejected());
        let context = ConversationContext::new(ConversationId::new_v7());
        let report = orch.delegate(&context).await.unwrap();
        assert!(report.trail.is_empty());
        assert_eq!(report.intent, None);
    }

    #[tokio::test]
    async fn test_stage_lookup() {
        let orch = orchestrator(draft(), rejected());
        assert!(orch.stage(FORMATTER_AGENT).is_some());
        assert!(orch.stage(ROOT_AGENT).is_none());
        assert_eq!(orch.name(), ROOT_AGENT);
    }
}

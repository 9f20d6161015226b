//! Claims Delegation Domain
//!
//! This crate implements the agents that take a healthcare claim from raw
//! caller input to an EDI 837 document, and the check that follows payer
//! adjudication.
//!
//! # Workflow
//!
//! ```text
//! caller input -> claim_validator -> formatter_agent -> EDI 837
//!                     | missing fields
//!                     v
//!                 needs input (caller resupplies)
//!
//! adjudicated claim + rules -> post_adjudication_check_agent
//!                           -> member notice | operations summary
//! ```
//!
//! The [`Orchestrator`] routes each input to one entry stage and never does a
//! stage's work itself.

pub mod adjudication;
pub mod agent;
pub mod checker;
pub mod classification;
pub mod draft;
pub mod edi;
pub mod error;
pub mod extraction;
pub mod formatter;
pub mod outcome;
pub mod persist;
pub mod ports;
pub mod rules_engine;
pub mod validator;
pub mod workflow;

pub use adjudication::{AdjudicatedClaim, EvaluationRules, MemberInfo, ProviderInfo};
pub use agent::{
    Agent, AgentMessage, AgentProfile, ConversationContext, StorageTarget, Turn, TurnEntry,
    UserInput, CHECKER_AGENT, FORMATTER_AGENT, ROOT_AGENT, VALIDATOR_AGENT,
};
pub use checker::PostAdjudicationChecker;
pub use classification::{
    Classification, ClassificationPolicy, InstructionPolicy, IssueCatalogPolicy, PolicyChain,
    Resolution,
};
pub use draft::ClaimDraft;
pub use edi::{Edi837Document, EnvelopeHeader, Segment, StructureReport};
pub use error::{ClaimError, FieldProblem};
pub use formatter::{EdiFormatter, FormatterAgent, FormatterConfig};
pub use outcome::OutcomeMessage;
pub use persist::{Persist, PersistConfig, PersistOutcome, PersistStatus};
pub use ports::ObjectStorePort;
pub use rules_engine::{DecisionTable, DecisionTablePolicy, RulesError};
pub use validator::{ClaimValidator, ValidatorConfig};
pub use workflow::{
    ClaimSession, DelegationReport, Intent, Orchestrator, OrchestratorConfig, StageReply,
    WorkflowState,
};

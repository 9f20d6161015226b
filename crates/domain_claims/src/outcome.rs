//! Post-adjudication outcomes

use serde::{Deserialize, Serialize};

/// The single result of a post-adjudication check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeMessage {
    /// The member can fix the problem; addressed to them
    MemberNotice {
        claim_id: String,
        recipient: String,
        subject: String,
        body: String,
        remediation_steps: Vec<String>,
    },
    /// Claims operations staff must act
    OperationsSummary {
        claim_id: String,
        member_id: String,
        status_code: String,
        issue: String,
        summary: String,
        recommended_action: String,
        /// Set when no rule classified the claim and it was routed here by default
        ambiguous: bool,
    },
}

impl OutcomeMessage {
    pub fn claim_id(&self) -> &str {
        match self {
            OutcomeMessage::MemberNotice { claim_id, .. } => claim_id,
            OutcomeMessage::OperationsSummary { claim_id, .. } => claim_id,
        }
    }

    pub fn is_member_notice(&self) -> bool {
        matches!(self, OutcomeMessage::MemberNotice { .. })
    }

    pub fn is_operations_summary(&self) -> bool {
        matches!(self, OutcomeMessage::OperationsSummary { .. })
    }
}

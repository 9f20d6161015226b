//! Post-adjudication checker agent
//!
//! Reads the most recent adjudication review in the conversation and turns
//! it into exactly one [`OutcomeMessage`]: a notice the member can act on, or
//! a summary for claims operations. Claims no policy can classify go to
//! operations flagged as ambiguous.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adjudication::{AdjudicatedClaim, EvaluationRules};
use crate::agent::{Agent, AgentMessage, AgentProfile, ConversationContext, UserInput, CHECKER_AGENT};
use crate::classification::{Classification, ClassificationPolicy, PolicyChain, Resolution};
use crate::error::ClaimError;
use crate::outcome::OutcomeMessage;

const DEFAULT_MEMBER_STEP: &str = "Contact member services so we can help resolve this issue";
const DEFAULT_OPS_ACTION: &str = "Review the claim and correct the adjudication issue";
const AMBIGUOUS_OPS_ACTION: &str = "Review the claim manually and classify the issue";

/// The post-adjudication checker
pub struct PostAdjudicationChecker {
    profile: AgentProfile,
    policy: Box<dyn ClassificationPolicy>,
}

impl Default for PostAdjudicationChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl PostAdjudicationChecker {
    /// Checker with the standard policy chain
    pub fn new() -> Self {
        Self::with_policy(PolicyChain::standard())
    }

    pub fn with_policy(policy: impl ClassificationPolicy + 'static) -> Self {
        Self {
            profile: AgentProfile::new(
                CHECKER_AGENT,
                "Evaluates adjudicated claims against plain-language rules and produces \
                 a member notice or an internal operations summary.",
                "Read the adjudicated claim and the evaluation instructions. If the issue is \
                 something the member can fix, write a member-facing message with remediation \
                 steps. Otherwise write an internal summary for claims operations.",
            ),
            policy: Box::new(policy),
        }
    }

    /// Produces the outcome for one claim
    pub fn evaluate(&self, claim: &AdjudicatedClaim, rules: &EvaluationRules) -> OutcomeMessage {
        match self.policy.classify(claim, rules) {
            Some(c) if c.resolution == Resolution::MemberResolvable => member_notice(claim, c),
            Some(c) => operations_summary(claim, c),
            None => {
                warn!(
                    claim_id = %claim.claim_id,
                    status_code = %claim.status_code,
                    "No rule classified the claim; routing to operations"
                );
                ambiguous_summary(claim)
            }
        }
    }
}

/// The most recent review input in a conversation
pub fn latest_review(context: &ConversationContext) -> Option<(&AdjudicatedClaim, &EvaluationRules)> {
    context.turns.iter().rev().find_map(|turn| match turn.user_input() {
        Some(UserInput::Review { claim, instructions }) => Some((claim, instructions)),
        _ => None,
    })
}

fn member_notice(claim: &AdjudicatedClaim, classification: Classification) -> OutcomeMessage {
    let member = &claim.member;
    let mut steps = classification.remediation_steps;
    if steps.is_empty() {
        steps.push(DEFAULT_MEMBER_STEP.to_string());
    }

    let numbered = steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n");

    OutcomeMessage::MemberNotice {
        claim_id: claim.claim_id.clone(),
        recipient: member.email.clone().unwrap_or_else(|| member.name.clone()),
        subject: format!("Action needed on your claim {}", claim.claim_id),
        body: format!(
            "Dear {},\n\nWe reviewed claim {} and found an issue you can help resolve: {}.\n\n\
             Please complete the following steps so we can finish processing your claim:\n{}",
            member.name,
            claim.claim_id,
            classification.issue.trim_end_matches('.'),
            numbered
        ),
        remediation_steps: steps,
    }
}

fn operations_summary(claim: &AdjudicatedClaim, classification: Classification) -> OutcomeMessage {
    let recommended_action = if classification.remediation_steps.is_empty() {
        DEFAULT_OPS_ACTION.to_string()
    } else {
        classification.remediation_steps.join("; ")
    };
    OutcomeMessage::OperationsSummary {
        claim_id: claim.claim_id.clone(),
        member_id: claim.member.member_id.clone(),
        status_code: claim.status_code.clone(),
        summary: format!(
            "Claim {} for member {} ended with status {}: {}. Matched {}.",
            claim.claim_id,
            claim.member.member_id,
            claim.status_code,
            classification.issue.trim_end_matches('.'),
            classification.matched_rule
        ),
        issue: classification.issue,
        recommended_action,
        ambiguous: false,
    }
}

fn ambiguous_summary(claim: &AdjudicatedClaim) -> OutcomeMessage {
    let issue = claim.issue_summary();
    OutcomeMessage::OperationsSummary {
        claim_id: claim.claim_id.clone(),
        member_id: claim.member.member_id.clone(),
        status_code: claim.status_code.clone(),
        summary: format!(
            "Claim {} for member {} ended with status {}: {}. No evaluation rule or known \
             issue matched.",
            claim.claim_id,
            claim.member.member_id,
            claim.status_code,
            issue.trim_end_matches('.')
        ),
        issue,
        recommended_action: AMBIGUOUS_OPS_ACTION.to_string(),
        ambiguous: true,
    }
}

#[async_trait]
impl Agent for PostAdjudicationChecker {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn respond(&self, context: &ConversationContext) -> Result<AgentMessage, ClaimError> {
        let (claim, rules) = latest_review(context).ok_or(ClaimError::NoReview)?;
        let outcome = self.evaluate(claim, rules);
        info!(
            conversation = %context.conversation_id,
            claim_id = %claim.claim_id,
            member_notice = outcome.is_member_notice(),
            "Post-adjudication check complete"
        );
        Ok(AgentMessage::Outcome { outcome })
    }
}

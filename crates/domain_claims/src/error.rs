//! Claims domain errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules_engine::RulesError;

/// Errors that can occur in the claims domain
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Required claim fields are absent. The validator recovers from this by
    /// asking the caller; the formatter reports it as a rejection.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid claim fields: {}", describe_problems(.0))]
    InvalidFields(Vec<FieldProblem>),

    #[error("No claim draft found in the conversation")]
    NoDraft,

    #[error("No adjudicated claim found in the conversation")]
    NoReview,

    #[error("Invalid EDI 837 document: {0}")]
    InvalidEdi(String),

    #[error("Stage {agent} timed out after {timeout_ms}ms")]
    StageTimeout { agent: String, timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),
}

impl ClaimError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ClaimError::InvalidFields(vec![FieldProblem::new(field, reason)])
    }

    /// Field names the caller has to supply or correct, if any
    pub fn offending_fields(&self) -> Vec<String> {
        match self {
            ClaimError::MissingFields(fields) => fields.clone(),
            ClaimError::InvalidFields(problems) => {
                let mut fields: Vec<String> = Vec::new();
                for problem in problems {
                    if !fields.contains(&problem.field) {
                        fields.push(problem.field.clone());
                    }
                }
                fields
            }
            _ => Vec::new(),
        }
    }
}

/// A claim field whose value could not be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProblem {
    pub field: String,
    pub reason: String,
}

impl FieldProblem {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.reason)
    }
}

fn describe_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

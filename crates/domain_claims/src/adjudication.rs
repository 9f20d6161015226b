//! Adjudicated claims supplied for post-adjudication checks
//!
//! These records come from the payer's adjudication system; this crate only
//! reads them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The member the claim was filed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    pub member_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// The rendering or billing provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub npi: Option<String>,
    #[serde(default)]
    pub taxonomy_code: Option<String>,
}

/// A claim that has already been through adjudication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicatedClaim {
    pub claim_id: String,
    pub member: MemberInfo,
    #[serde(default)]
    pub provider: Option<ProviderInfo>,
    /// Payer status or result code
    pub status_code: String,
    #[serde(default)]
    pub status_description: Option<String>,
    /// Free-text description of what went wrong, if anything
    #[serde(default)]
    pub issue: Option<String>,
    /// Claim adjustment reason codes
    #[serde(default)]
    pub reason_codes: Vec<String>,
    #[serde(default)]
    pub billed_amount: Option<Decimal>,
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
    #[serde(default)]
    pub adjudicated_on: Option<NaiveDate>,
    /// Any other attributes the payer sent along
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdjudicatedClaim {
    /// Lowercased text the classifiers match conditions against
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.status_code.as_str()];
        if let Some(ref description) = self.status_description {
            parts.push(description);
        }
        if let Some(ref issue) = self.issue {
            parts.push(issue);
        }
        parts.extend(self.reason_codes.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }

    /// Best available description of the problem
    pub fn issue_summary(&self) -> String {
        self.issue
            .clone()
            .or_else(|| self.status_description.clone())
            .unwrap_or_else(|| format!("status code {}", self.status_code))
    }
}

/// Plain-language evaluation rules, one rule per line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationRules(String);

impl EvaluationRules {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, trimmed rule lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim())
            .filter(|l| !l.is_empty())
    }
}

impl From<&str> for EvaluationRules {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

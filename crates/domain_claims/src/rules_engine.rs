//! Decision tables for claim classification
//!
//! A decision table lists input fields (dotted paths into the adjudicated
//! claim's JSON) and rules whose cells hold conditions. The first rule whose
//! conditions all hold supplies the outputs.
//!
//! # Example
//!
//! ```json
//! {
//!   "hitPolicy": "first",
//!   "inputs":  [{ "id": "status", "field": "status_code" },
//!               { "id": "billed", "field": "billed_amount" }],
//!   "outputs": [{ "id": "resolution", "field": "resolution" },
//!               { "id": "remediation", "field": "remediation" }],
//!   "rules": [
//!     { "inputs":  [{ "id": "status", "value": "\"A7\"" }, { "id": "billed", "value": "> 1000" }],
//!       "outputs": [{ "id": "resolution", "value": "\"operations\"" },
//!                   { "id": "remediation", "value": "\"Send to high dollar review\"" }] }
//!   ]
//! }
//! ```
//!
//! Conditions: `-` matches anything, `< n`, `<= n`, `> n`, `>= n`, ranges
//! such as `[18..65)`, and equality with a quoted string, number or boolean.
//! Array values (reason codes) match when any element matches.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::adjudication::{AdjudicatedClaim, EvaluationRules};
use crate::classification::{Classification, ClassificationPolicy, Resolution};

/// Errors that can occur while loading a decision table
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Failed to parse rules: {0}")]
    ParseError(String),

    #[error("Rules file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid rule format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRule {
    #[serde(default)]
    pub id: Option<String>,
    pub inputs: Vec<Cell>,
    pub outputs: Vec<Cell>,
}

fn default_hit_policy() -> String {
    "first".to_string()
}

/// A first-hit decision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTable {
    #[serde(default = "default_hit_policy")]
    pub hit_policy: String,
    pub inputs: Vec<Column>,
    pub outputs: Vec<Column>,
    pub rules: Vec<TableRule>,
}

/// Outputs of the rule that fired
#[derive(Debug, Clone, PartialEq)]
pub struct TableHit {
    pub rule: String,
    pub outputs: Map<String, Value>,
}

impl DecisionTable {
    pub fn from_value(value: Value) -> Result<Self, RulesError> {
        let table: DecisionTable =
            serde_json::from_value(value).map_err(|e| RulesError::ParseError(e.to_string()))?;
        table.check()?;
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RulesError::ParseError(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| RulesError::FileNotFound(path.display().to_string()))?;
        Self::from_json(&content)
    }

    fn check(&self) -> Result<(), RulesError> {
        if self.hit_policy != "first" {
            return Err(RulesError::InvalidFormat(format!(
                "unsupported hit policy '{}'",
                self.hit_policy
            )));
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            if let Some(cell) = rule
                .inputs
                .iter()
                .find(|c| !self.inputs.iter().any(|col| col.id == c.id))
            {
                return Err(RulesError::InvalidFormat(format!(
                    "rule {} references unknown input '{}'",
                    idx + 1,
                    cell.id
                )));
            }
        }
        Ok(())
    }

    /// Evaluates the table against a JSON context
    pub fn evaluate(&self, context: &Value) -> Option<TableHit> {
        let (idx, rule) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| self.rule_matches(rule, context))?;

        let outputs = self
            .outputs
            .iter()
            .filter_map(|col| {
                rule.outputs
                    .iter()
                    .find(|cell| cell.id == col.id)
                    .map(|cell| (col.field.clone(), parse_output_value(&cell.value)))
            })
            .collect();

        Some(TableHit {
            rule: rule.id.clone().unwrap_or_else(|| format!("rule {}", idx + 1)),
            outputs,
        })
    }

    fn rule_matches(&self, rule: &TableRule, context: &Value) -> bool {
        rule.inputs.iter().all(|cell| {
            let condition = cell.value.trim();
            if condition == "-" || condition.is_empty() {
                return true;
            }
            self.inputs
                .iter()
                .find(|col| col.id == cell.id)
                .and_then(|col| field_value(context, &col.field))
                .map_or(false, |value| matches_condition(value, condition))
        })
    }
}

/// Looks up a dotted path such as `member.member_id`
pub fn field_value<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(context, |current, part| match current {
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(part),
        })
        .filter(|v| !v.is_null())
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_threshold(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim()).ok()
}

/// Checks a single value against a condition cell
pub fn matches_condition(value: &Value, condition: &str) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| matches_condition(item, condition));
    }

    let compare = |threshold: &str, test: fn(Decimal, Decimal) -> bool| {
        match (as_decimal(value), parse_threshold(threshold)) {
            (Some(v), Some(t)) => test(v, t),
            _ => false,
        }
    };

    if let Some(rest) = condition.strip_prefix("<=") {
        return compare(rest, |v, t| v <= t);
    }
    if let Some(rest) = condition.strip_prefix(">=") {
        return compare(rest, |v, t| v >= t);
    }
    if let Some(rest) = condition.strip_prefix('<') {
        return compare(rest, |v, t| v < t);
    }
    if let Some(rest) = condition.strip_prefix('>') {
        return compare(rest, |v, t| v > t);
    }
    if condition.starts_with('[') || condition.starts_with('(') {
        return matches_range(value, condition);
    }

    match value {
        Value::String(s) => s.eq_ignore_ascii_case(condition.trim_matches('"')),
        Value::Bool(b) => b.to_string() == condition,
        Value::Number(_) => match (as_decimal(value), parse_threshold(condition)) {
            (Some(v), Some(c)) => v == c,
            _ => false,
        },
        _ => false,
    }
}

/// Ranges like `[18..25)` or `(0..100]`
fn matches_range(value: &Value, range: &str) -> bool {
    let Some(n) = as_decimal(value) else {
        return false;
    };
    let left_inclusive = range.starts_with('[');
    let right_inclusive = range.ends_with(']');
    let inner = range
        .trim_start_matches(['[', '('])
        .trim_end_matches([')', ']']);
    let Some((low, high)) = inner.split_once("..") else {
        return false;
    };
    let (Some(low), Some(high)) = (parse_threshold(low), parse_threshold(high)) else {
        return false;
    };

    let low_ok = if left_inclusive { n >= low } else { n > low };
    let high_ok = if right_inclusive { n <= high } else { n < high };
    low_ok && high_ok
}

fn parse_output_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2 {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => serde_json::from_str::<serde_json::Number>(raw)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

/// Classifies claims with a decision table
///
/// The table must output `resolution` (`member` or `operations`). Optional
/// outputs `issue` and `remediation` (steps separated by `;`) fill in the
/// classification.
#[derive(Debug, Clone)]
pub struct DecisionTablePolicy {
    table: DecisionTable,
}

impl DecisionTablePolicy {
    pub fn new(table: DecisionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &DecisionTable {
        &self.table
    }
}

impl ClassificationPolicy for DecisionTablePolicy {
    fn name(&self) -> &str {
        "decision_table"
    }

    fn classify(&self, claim: &AdjudicatedClaim, _rules: &EvaluationRules) -> Option<Classification> {
        let context = match serde_json::to_value(claim) {
            Ok(value) => value,
            Err(e) => {
                warn!(claim_id = %claim.claim_id, error = %e, "Claim could not be converted for table lookup");
                return None;
            }
        };
        let hit = self.table.evaluate(&context)?;

        let resolution = match hit.outputs.get("resolution").and_then(Value::as_str) {
            Some(label) => Resolution::from_label(label),
            None => None,
        };
        let Some(resolution) = resolution else {
            warn!(rule = %hit.rule, "Decision table rule has no usable resolution output");
            return None;
        };

        let issue = hit
            .outputs
            .get("issue")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| claim.issue_summary());
        let remediation_steps = hit
            .outputs
            .get("remediation")
            .and_then(Value::as_str)
            .map(|s| {
                s.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Classification {
            resolution,
            issue,
            remediation_steps,
            matched_rule: hit.rule,
        })
    }
}

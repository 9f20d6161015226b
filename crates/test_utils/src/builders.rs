//! Test Data Builders
//!
//! Builders that let tests name only the fields they care about.

use chrono::NaiveDate;
use domain_claims::{AdjudicatedClaim, ClaimDraft, MemberInfo, ProviderInfo, UserInput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};

use crate::fixtures::{MemberFixtures, RuleFixtures};

/// Builder for caller-supplied claim fields
pub struct ClaimDraftBuilder {
    fields: Map<String, Value>,
}

impl Default for ClaimDraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimDraftBuilder {
    /// Starts with the default required fields
    pub fn new() -> Self {
        Self::empty()
            .with("Name", MemberFixtures::name())
            .with("MemberID", MemberFixtures::member_id())
    }

    pub fn empty() -> Self {
        Self { fields: Map::new() }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.fields.remove(name);
        self
    }

    pub fn with_service_line(mut self, procedure_code: &str, charge: Decimal) -> Self {
        let line = json!({"ProcedureCode": procedure_code, "Charge": charge.to_string()});
        match self.fields.get_mut("ServiceLines") {
            Some(Value::Array(lines)) => lines.push(line),
            _ => {
                self.fields.insert("ServiceLines".to_string(), json!([line]));
            }
        }
        self
    }

    pub fn build(self) -> ClaimDraft {
        ClaimDraft::from_map(self.fields)
    }

    pub fn build_json(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn build_input(self) -> UserInput {
        UserInput::Fields { fields: self.build() }
    }
}

/// Builder for adjudicated claims
pub struct AdjudicatedClaimBuilder {
    claim_id: String,
    member: MemberInfo,
    provider: Option<ProviderInfo>,
    status_code: String,
    status_description: Option<String>,
    issue: Option<String>,
    reason_codes: Vec<String>,
    billed_amount: Option<Decimal>,
    paid_amount: Option<Decimal>,
    adjudicated_on: Option<NaiveDate>,
}

impl Default for AdjudicatedClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdjudicatedClaimBuilder {
    /// A denied claim for the fixture member
    pub fn new() -> Self {
        Self {
            claim_id: "CLM-204".to_string(),
            member: MemberInfo {
                name: MemberFixtures::name().to_string(),
                member_id: MemberFixtures::member_id().to_string(),
                email: Some(MemberFixtures::email().to_string()),
                address: None,
            },
            provider: None,
            status_code: "DENIED".to_string(),
            status_description: None,
            issue: None,
            reason_codes: Vec::new(),
            billed_amount: Some(dec!(160.50)),
            paid_amount: Some(Decimal::ZERO),
            adjudicated_on: NaiveDate::from_ymd_opt(2024, 5, 20),
        }
    }

    pub fn with_claim_id(mut self, id: impl Into<String>) -> Self {
        self.claim_id = id.into();
        self
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issue = Some(issue.into());
        self
    }

    pub fn with_status(mut self, code: impl Into<String>, description: Option<&str>) -> Self {
        self.status_code = code.into();
        self.status_description = description.map(str::to_string);
        self
    }

    pub fn with_reason_code(mut self, code: impl Into<String>) -> Self {
        self.reason_codes.push(code.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderInfo) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Drops the member email so notices fall back to the member name
    pub fn without_email(mut self) -> Self {
        self.member.email = None;
        self
    }

    pub fn build(self) -> AdjudicatedClaim {
        AdjudicatedClaim {
            claim_id: self.claim_id,
            member: self.member,
            provider: self.provider,
            status_code: self.status_code,
            status_description: self.status_description,
            issue: self.issue,
            reason_codes: self.reason_codes,
            billed_amount: self.billed_amount,
            paid_amount: self.paid_amount,
            adjudicated_on: self.adjudicated_on,
            extra: Map::new(),
        }
    }

    /// Review input with the address rule
    pub fn build_review(self) -> UserInput {
        UserInput::Review {
            claim: self.build(),
            instructions: RuleFixtures::address_rule(),
        }
    }
}

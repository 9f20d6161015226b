//! Pre-built Test Fixtures
//!
//! Consistent, predictable claim data for unit and integration tests.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use domain_claims::{
    ClaimDraft, ClaimValidator, EnvelopeHeader, EvaluationRules, FormatterAgent, FormatterConfig,
    ObjectStorePort, Orchestrator, OrchestratorConfig, Persist, PersistConfig,
    PostAdjudicationChecker, UserInput, ValidatorConfig,
};
use infra_storage::MemoryObjectStore;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Bucket the memory fixtures create
pub const INTAKE_BUCKET: &str = "claims-intake";

/// Fixture for the member used throughout the intake walkthrough
pub struct MemberFixtures;

impl MemberFixtures {
    pub fn name() -> &'static str {
        "Corey Maher"
    }

    pub fn member_id() -> &'static str {
        "MEM1234553"
    }

    pub fn email() -> &'static str {
        "corey@example.com"
    }

    pub fn date_of_birth() -> NaiveDate {
        NaiveDate::from_ymd_opt(1984, 3, 12).unwrap_or_default()
    }
}

/// Fixture for caller inputs
pub struct InputFixtures;

impl InputFixtures {
    /// Name only, so the validator must ask for the member id
    pub fn name_only() -> Value {
        json!({"Name": MemberFixtures::name()})
    }

    /// The two default required fields
    pub fn minimal_claim() -> Value {
        json!({"Name": MemberFixtures::name(), "MemberID": MemberFixtures::member_id()})
    }

    /// A professional claim with service lines and diagnoses
    pub fn full_claim() -> Value {
        json!({
            "Name": MemberFixtures::name(),
            "MemberID": MemberFixtures::member_id(),
            "DateOfBirth": "1984-03-12",
            "Gender": "M",
            "Address": "12 Elm Street",
            "City": "Springfield",
            "State": "IL",
            "Zip": "62701",
            "ServiceDate": "2024-05-02",
            "DiagnosisCodes": ["J06.9", "R05"],
            "ServiceLines": [
                {"ProcedureCode": "99213", "Charge": "125.00"},
                {"ProcedureCode": "87880", "Charge": "35.50", "Units": 1}
            ],
            "TotalCharge": "160.50"
        })
    }

    pub fn fields(value: Value) -> UserInput {
        match value {
            Value::Object(map) => UserInput::Fields {
                fields: ClaimDraft::from_map(map),
            },
            other => UserInput::text(other.to_string()),
        }
    }

    /// The bare member id a caller sends when asked for it
    pub fn member_id_answer() -> UserInput {
        UserInput::text(MemberFixtures::member_id())
    }
}

/// Fixture for plain-language evaluation rules
pub struct RuleFixtures;

impl RuleFixtures {
    pub fn address_rule() -> EvaluationRules {
        EvaluationRules::new(
            "If the member address does not match, notify the member: Update your address with the plan",
        )
    }

    pub fn provider_rule() -> EvaluationRules {
        EvaluationRules::new("NPI mismatch => operations: Correct the rendering provider NPI")
    }

    pub fn none() -> EvaluationRules {
        EvaluationRules::default()
    }
}

/// Envelope header with a fixed timestamp, for byte-stable EDI output
pub fn fixed_header(control_number: u32) -> EnvelopeHeader {
    static TIMESTAMP: Lazy<NaiveDateTime> = Lazy::new(|| {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap_or_default()
    });
    EnvelopeHeader::new(control_number, *TIMESTAMP)
}

/// Memory store with the intake bucket already created
pub fn memory_store() -> Arc<MemoryObjectStore> {
    Arc::new(MemoryObjectStore::with_buckets([INTAKE_BUCKET]))
}

/// Orchestrator with default stage configuration
///
/// With a store, the validator persists drafts through it.
pub fn default_orchestrator(store: Option<Arc<dyn ObjectStorePort>>) -> Orchestrator {
    let mut validator = ClaimValidator::new(ValidatorConfig::default());
    if let Some(store) = store {
        validator = validator.with_persist(Persist::new(store, PersistConfig::default()));
    }
    Orchestrator::new(
        Arc::new(validator),
        Arc::new(FormatterAgent::new(FormatterConfig::default())),
        Arc::new(PostAdjudicationChecker::new()),
        OrchestratorConfig::default(),
    )
}

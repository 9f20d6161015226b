//! End-to-end tests for the claims delegation workflow

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use core_kernel::ConversationId;
use domain_claims::edi::validate_structure;
use domain_claims::{
    AdjudicatedClaim, AgentMessage, ClaimDraft, ClaimSession, ClaimValidator, EvaluationRules,
    FormatterAgent, FormatterConfig, ObjectStorePort, Orchestrator, OrchestratorConfig,
    OutcomeMessage, Persist, PersistConfig, PostAdjudicationChecker, StorageTarget, UserInput,
    ValidatorConfig, WorkflowState, FORMATTER_AGENT, VALIDATOR_AGENT,
};
use infra_storage::MemoryObjectStore;

fn orchestrator(store: Option<Arc<dyn ObjectStorePort>>) -> Orchestrator {
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

fn fields(value: Value) -> UserInput {
    UserInput::from_json(value).unwrap()
}

fn edi_text(message: Option<&AgentMessage>) -> String {
    match message {
        Some(AgentMessage::Edi837 { document }) => document.as_str().to_string(),
        other => panic!("expected EDI 837, got {:?}", other),
    }
}

// ============================================================================
// Claim intake
// ============================================================================

mod intake_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_member_id_then_bare_answer() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());

        let first = session
            .submit(&orch, fields(json!({"Name": "Corey Maher"})))
            .await
            .unwrap();
        assert_eq!(first.final_state, WorkflowState::NeedsInput);
        match first.final_message() {
            Some(AgentMessage::NeedsInput { missing_fields, .. }) => {
                assert_eq!(missing_fields, &vec!["MemberID".to_string()]);
            }
            other => panic!("expected a request for input, got {:?}", other),
        }

        let second = session
            .submit(&orch, UserInput::text("MEM1234553"))
            .await
            .unwrap();
        assert_eq!(second.final_state, WorkflowState::Done);
        assert_eq!(second.agents(), vec![VALIDATOR_AGENT, FORMATTER_AGENT]);

        match &second.trail[0].message {
            AgentMessage::ClaimDraft { draft, persistence } => {
                assert_eq!(
                    draft.to_value(),
                    json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})
                );
                assert!(persistence.is_none());
            }
            other => panic!("expected a draft, got {:?}", other),
        }

        let text = edi_text(second.final_message());
        let report = validate_structure(&text).unwrap();
        assert_eq!(report.member_id.as_deref(), Some("MEM1234553"));
        assert_eq!(session.state(), WorkflowState::Done);
    }

    #[tokio::test]
    async fn test_complete_input_is_not_prompted() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());
        let report = session
            .submit(
                &orch,
                UserInput::text("Name: Corey Maher\nMember ID: MEM1234553\nDiagnosis Codes: J06.9"),
            )
            .await
            .unwrap();

        assert_eq!(report.final_state, WorkflowState::Done);
        assert!(!report
            .trail
            .iter()
            .any(|r| matches!(r.message, AgentMessage::NeedsInput { .. })));
        assert!(edi_text(report.final_message()).contains("HI*ABK:J069~"));
    }

    #[tokio::test]
    async fn test_all_missing_fields_are_named() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());
        let report = session
            .submit(&orch, UserInput::text("my tooth hurts"))
            .await
            .unwrap();
        match report.final_message() {
            Some(AgentMessage::NeedsInput { missing_fields, prompt }) => {
                assert_eq!(missing_fields, &vec!["Name".to_string(), "MemberID".to_string()]);
                assert!(prompt.contains("Name, MemberID"));
            }
            other => panic!("expected a request for input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_formatter_rejection_is_corrected() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());

        let report = session
            .submit(
                &orch,
                fields(json!({
                    "Name": "Corey Maher",
                    "MemberID": "MEM1234553",
                    "DateOfBirth": "sometime in July"
                })),
            )
            .await
            .unwrap();
        assert_eq!(report.final_state, WorkflowState::NeedsInput);
        match report.final_message() {
            Some(AgentMessage::Rejected { fields, .. }) => {
                assert_eq!(fields, &vec!["DateOfBirth".to_string()]);
            }
            other => panic!("expected a rejection, got {:?}", other),
        }

        let report = session
            .submit(&orch, UserInput::text("1985-07-14"))
            .await
            .unwrap();
        assert_eq!(report.final_state, WorkflowState::Done);
        assert!(edi_text(report.final_message()).contains("DMG*D8*19850714*U~"));
    }
}

// ============================================================================
// Persistence
// ============================================================================

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_draft_is_persisted_under_conversation_key() {
        let store = Arc::new(MemoryObjectStore::with_buckets(["claims-intake"]));
        let orch = orchestrator(Some(store.clone()));
        let id = ConversationId::new_v7();
        let mut session = ClaimSession::new(id).with_storage(StorageTarget::new("claims-intake"));

        let report = session
            .submit(&orch, fields(json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})))
            .await
            .unwrap();

        let key = format!("claims/{}.json", id.as_uuid());
        match &report.trail[0].message {
            AgentMessage::ClaimDraft { persistence: Some(outcome), .. } => {
                assert!(outcome.is_success(), "{}", outcome.message);
                assert_eq!(
                    outcome.message,
                    format!("Successfully saved to memory://claims-intake/{}", key)
                );
            }
            other => panic!("expected a persisted draft, got {:?}", other),
        }

        let bytes = store.get_object("claims-intake", &key, None).await.unwrap();
        let saved: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(saved, json!({"Name": "Corey Maher", "MemberID": "MEM1234553"}));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_the_turn() {
        let store = Arc::new(MemoryObjectStore::with_buckets(["claims-intake"]));
        let orch = orchestrator(Some(store.clone()));
        let mut session = ClaimSession::new(ConversationId::new_v7())
            .with_storage(StorageTarget::new("no-such-bucket").with_key("a.json"));

        let report = session
            .submit(&orch, fields(json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})))
            .await
            .unwrap();

        assert_eq!(report.final_state, WorkflowState::Done);
        match &report.trail[0].message {
            AgentMessage::ClaimDraft { persistence: Some(outcome), .. } => {
                assert!(!outcome.is_success());
                assert!(outcome.message.contains("no-such-bucket"));
            }
            other => panic!("expected a draft with an error report, got {:?}", other),
        }
        assert!(store.get_object("claims-intake", "a.json", None).await.is_err());
    }
}

// ============================================================================
// Post-adjudication checks
// ============================================================================

mod check_tests {
    use super::*;

    fn review(issue: &str, rules: &str) -> UserInput {
        fields(json!({
            "claim": {
                "claim_id": "CLM-204",
                "member": {"name": "Corey Maher", "member_id": "MEM1234553", "email": "corey@example.com"},
                "status_code": "DENIED",
                "issue": issue,
                "reason_codes": ["CO-16"]
            },
            "instructions": rules
        }))
    }

    #[tokio::test]
    async fn test_member_resolvable_issue() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());
        let report = session
            .submit(
                &orch,
                review(
                    "Member address does not match our records",
                    "If the address does not match, notify the member: Update your address",
                ),
            )
            .await
            .unwrap();

        assert_eq!(report.final_state, WorkflowState::Done);
        match report.final_message() {
            Some(AgentMessage::Outcome {
                outcome: OutcomeMessage::MemberNotice { recipient, remediation_steps, .. },
            }) => {
                assert_eq!(recipient, "corey@example.com");
                assert_eq!(remediation_steps, &vec!["Update your address".to_string()]);
            }
            other => panic!("expected a member notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ops_resolvable_issue() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());
        let report = session
            .submit(&orch, review("Rendering provider NPI mismatch", ""))
            .await
            .unwrap();
        match report.final_message() {
            Some(AgentMessage::Outcome {
                outcome: OutcomeMessage::OperationsSummary { ambiguous, member_id, .. },
            }) => {
                assert!(!ambiguous);
                assert_eq!(member_id, "MEM1234553");
            }
            other => panic!("expected an operations summary, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_after_intake_does_not_touch_validator() {
        let orch = orchestrator(None);
        let mut session = ClaimSession::new(ConversationId::new_v7());
        session
            .submit(&orch, fields(json!({"Name": "Corey Maher"})))
            .await
            .unwrap();
        let report = session
            .submit(&orch, review("Duplicate claim", ""))
            .await
            .unwrap();
        assert_eq!(report.agents(), vec!["post_adjudication_check_agent"]);
    }
}

// ============================================================================
// Properties
// ============================================================================

fn claim_with_issue(issue: &str, codes: Vec<String>) -> AdjudicatedClaim {
    serde_json::from_value(json!({
        "claim_id": "CLM-1",
        "member": {"name": "Corey Maher", "member_id": "MEM1234553"},
        "status_code": "DENIED",
        "issue": issue,
        "reason_codes": codes
    }))
    .unwrap()
}

proptest! {
    #[test]
    fn prop_checker_yields_one_outcome(
        issue in "[a-zA-Z ]{0,60}",
        codes in proptest::collection::vec("[A-Z]{2}-[0-9]{1,3}", 0..3),
        rules in "[a-zA-Z ,:=>]{0,80}",
    ) {
        let checker = PostAdjudicationChecker::new();
        let outcome = checker.evaluate(&claim_with_issue(&issue, codes), &EvaluationRules::new(rules));
        prop_assert_eq!(outcome.claim_id(), "CLM-1");
        prop_assert!(outcome.is_member_notice() != outcome.is_operations_summary());
        if let OutcomeMessage::MemberNotice { remediation_steps, .. } = outcome {
            prop_assert!(!remediation_steps.is_empty());
        }
    }

    #[test]
    fn prop_formatted_documents_are_well_formed(
        first in "[A-Z][a-z]{1,10}",
        last in "[A-Z][a-z]{1,12}",
        member_id in "[A-Z0-9]{4,12}",
        charge in 0u32..100_000,
    ) {
        let mut draft = ClaimDraft::new();
        draft.insert("Name", json!(format!("{} {}", first, last)));
        draft.insert("MemberID", json!(member_id.clone()));
        draft.insert("TotalCharge", json!(charge));

        let formatter = domain_claims::EdiFormatter::new(FormatterConfig::default());
        let header = domain_claims::EnvelopeHeader::new(
            17,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 0).unwrap(),
        );
        let doc = formatter.format(&draft, &header).unwrap();
        let report = doc.validate().unwrap();
        prop_assert_eq!(report.member_id, Some(member_id));
        prop_assert_eq!(report.service_lines, 1);
    }
}

//! Custom Test Assertions
//!
//! Assertion helpers for agent replies that give more meaningful failure
//! messages than matching by hand.

use domain_claims::{AgentMessage, ClaimDraft, Edi837Document, OutcomeMessage, StructureReport};

/// Asserts the document passes the structural checks and names `member_id`
pub fn assert_edi_well_formed(document: &Edi837Document, member_id: &str) -> StructureReport {
    let report = match document.validate() {
        Ok(report) => report,
        Err(err) => panic!("EDI document is malformed: {}\n{}", err, document),
    };
    assert_eq!(
        report.member_id.as_deref(),
        Some(member_id),
        "EDI document references the wrong member:\n{}",
        document
    );
    report
}

/// Unwraps a validator draft
pub fn expect_draft(message: Option<&AgentMessage>) -> &ClaimDraft {
    match message {
        Some(AgentMessage::ClaimDraft { draft, .. }) => draft,
        other => panic!("Expected a claim draft, got {:?}", other),
    }
}

/// Unwraps a formatter document
pub fn expect_edi(message: Option<&AgentMessage>) -> &Edi837Document {
    match message {
        Some(AgentMessage::Edi837 { document }) => document,
        other => panic!("Expected an EDI 837 document, got {:?}", other),
    }
}

/// Asserts the validator asked for exactly `fields`, in order
pub fn assert_needs_input(message: Option<&AgentMessage>, fields: &[&str]) {
    match message {
        Some(AgentMessage::NeedsInput { missing_fields, prompt }) => {
            assert_eq!(missing_fields, fields, "Wrong missing fields");
            for field in fields {
                assert!(
                    prompt.contains(field),
                    "Prompt {:?} does not name {}",
                    prompt,
                    field
                );
            }
        }
        other => panic!("Expected a request for {:?}, got {:?}", fields, other),
    }
}

/// Unwraps a checker outcome
pub fn expect_outcome(message: Option<&AgentMessage>) -> &OutcomeMessage {
    match message {
        Some(AgentMessage::Outcome { outcome }) => outcome,
        other => panic!("Expected a post-adjudication outcome, got {:?}", other),
    }
}

/// Asserts the outcome is a member notice and returns its recipient
pub fn assert_member_notice(outcome: &OutcomeMessage) -> &str {
    match outcome {
        OutcomeMessage::MemberNotice { recipient, .. } => recipient,
        other => panic!("Expected a member notice, got {:?}", other),
    }
}

/// Asserts the outcome is an operations summary with the given ambiguity flag
pub fn assert_operations_summary(outcome: &OutcomeMessage, ambiguous: bool) {
    match outcome {
        OutcomeMessage::OperationsSummary { ambiguous: actual, .. } => assert_eq!(
            *actual, ambiguous,
            "Operations summary ambiguity flag mismatch"
        ),
        other => panic!("Expected an operations summary, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::ClaimDraftBuilder;
    use crate::fixtures::fixed_header;
    use domain_claims::{EdiFormatter, FormatterConfig};

    #[test]
    fn test_formatted_claim_is_well_formed() {
        let formatter = EdiFormatter::new(FormatterConfig::default());
        let document = formatter
            .format(&ClaimDraftBuilder::new().build(), &fixed_header(7))
            .unwrap();
        let report = assert_edi_well_formed(&document, "MEM1234553");
        assert_eq!(report.service_lines, 1);
    }

    #[test]
    #[should_panic(expected = "Expected a claim draft")]
    fn test_expect_draft_panics_on_other_messages() {
        let message = AgentMessage::Rejected {
            reason: "missing".to_string(),
            fields: vec![],
        };
        expect_draft(Some(&message));
    }
}

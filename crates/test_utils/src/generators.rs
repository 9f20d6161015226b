//! Property-Based Test Generators
//!
//! Proptest strategies for claim inputs that keep the formatter's field
//! rules satisfied.

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Strategy for member names of the form "First Last"
pub fn member_name_strategy() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{1,11}", "[A-Z][a-z]{1,13}").prop_map(|(first, last)| format!("{} {}", first, last))
}

/// Strategy for member ids
pub fn member_id_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3}[0-9]{4,9}"
}

/// Strategy for non-negative charges with cents
pub fn charge_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for CPT-style procedure codes
pub fn procedure_code_strategy() -> impl Strategy<Value = String> {
    "[0-9]{5}"
}

/// Strategy for complete claim field objects with one to four service lines
pub fn complete_claim_strategy() -> impl Strategy<Value = Value> {
    (
        member_name_strategy(),
        member_id_strategy(),
        prop::collection::vec((procedure_code_strategy(), charge_strategy()), 1..=4),
    )
        .prop_map(|(name, member_id, lines)| {
            let total: Decimal = lines.iter().map(|(_, charge)| *charge).sum();
            let lines: Vec<Value> = lines
                .into_iter()
                .map(|(code, charge)| json!({"ProcedureCode": code, "Charge": charge.to_string()}))
                .collect();
            json!({
                "Name": name,
                "MemberID": member_id,
                "ServiceLines": lines,
                "TotalCharge": total.to_string()
            })
        })
}

/// Strategy for free-text adjudication issues
pub fn issue_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Member address does not match our records".to_string()),
        Just("Rendering provider NPI mismatch".to_string()),
        Just("Duplicate claim".to_string()),
        Just("Coordination of benefits information required".to_string()),
        "[a-z ]{0,40}",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::assert_edi_well_formed;
    use crate::fixtures::fixed_header;
    use domain_claims::{ClaimDraft, EdiFormatter, FormatterConfig};

    proptest! {
        #[test]
        fn prop_complete_claims_format(claim in complete_claim_strategy(), control in 1u32..999_999_999u32) {
            let member_id = claim["MemberID"].as_str().unwrap_or_default().to_string();
            let draft = match claim {
                Value::Object(map) => ClaimDraft::from_map(map),
                _ => unreachable!(),
            };
            let formatter = EdiFormatter::new(FormatterConfig::default());
            let document = formatter.format(&draft, &fixed_header(control)).unwrap();
            assert_edi_well_formed(&document, &member_id);
        }
    }
}

//! EDI 837 professional claim formatter
//!
//! [`EdiFormatter`] is a pure transformation from a [`ClaimDraft`] plus an
//! [`EnvelopeHeader`] to an [`Edi837Document`]. It has no storage and no
//! clock; [`FormatterAgent`] supplies the control number and timestamp.
//!
//! The formatter never guesses claim values. Envelope parties the caller did
//! not supply (submitter, receiver, billing provider, payer) come from
//! [`FormatterConfig`]; anything else that is missing or unreadable is
//! reported back as a field problem.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::{
    Agent, AgentMessage, AgentProfile, ConversationContext, UserInput, FORMATTER_AGENT,
    VALIDATOR_AGENT,
};
use crate::draft::{fields, ClaimDraft};
use crate::edi::{
    clean_element, Edi837Document, EnvelopeHeader, Segment, IMPLEMENTATION_REFERENCE,
    INTERCHANGE_VERSION, TRANSACTION_SET_ID,
};
use crate::error::{ClaimError, FieldProblem};

const MAX_CONTROL_NUMBER: u32 = 999_999_999;
const MAX_DIAGNOSIS_CODES: usize = 12;
const TRANSACTION_CONTROL: &str = "0001";

/// Envelope parties and defaults used when the draft does not name them
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// ISA06 / GS02
    pub sender_id: String,
    /// ISA08 / GS03
    pub receiver_id: String,
    pub submitter_name: String,
    pub submitter_contact: String,
    pub submitter_phone: String,
    pub receiver_name: String,
    pub billing_provider_name: String,
    pub billing_provider_npi: String,
    pub billing_provider_tax_id: String,
    pub billing_provider_address: String,
    pub billing_provider_city: String,
    pub billing_provider_state: String,
    pub billing_provider_zip: String,
    pub payer_name: String,
    pub payer_id: String,
    /// ISA15: `P` production, `T` test
    pub usage_indicator: String,
    pub default_procedure_code: String,
    pub default_place_of_service: String,
    pub first_control_number: u32,
    /// Fields a draft must carry to be formatted
    pub required_fields: Vec<String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            sender_id: "CLAIMSDELEGATE".to_string(),
            receiver_id: "PAYERCLEARING".to_string(),
            submitter_name: "Claims Delegation".to_string(),
            submitter_contact: "Claims Desk".to_string(),
            submitter_phone: "8005550100".to_string(),
            receiver_name: "Payer Clearinghouse".to_string(),
            billing_provider_name: "Default Billing Provider".to_string(),
            billing_provider_npi: "1999999984".to_string(),
            billing_provider_tax_id: "000000000".to_string(),
            billing_provider_address: "100 Main Street".to_string(),
            billing_provider_city: "Springfield".to_string(),
            billing_provider_state: "IL".to_string(),
            billing_provider_zip: "62701".to_string(),
            payer_name: "Default Payer".to_string(),
            payer_id: "00000".to_string(),
            usage_indicator: "T".to_string(),
            default_procedure_code: "99213".to_string(),
            default_place_of_service: "11".to_string(),
            first_control_number: 1,
            required_fields: vec![fields::NAME.to_string(), fields::MEMBER_ID.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PartyAddress {
    street: String,
    city: String,
    state: String,
    zip: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Subscriber {
    last_name: String,
    first_name: String,
    member_id: String,
    date_of_birth: Option<NaiveDate>,
    gender: Option<char>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct BillingProvider {
    name: String,
    npi: String,
    tax_id: String,
    address: PartyAddress,
}

#[derive(Debug, Clone, PartialEq)]
struct ServiceLine {
    procedure_code: String,
    charge: Decimal,
    units: Decimal,
    service_date: Option<NaiveDate>,
}

/// A draft that passed every field check
#[derive(Debug, Clone, PartialEq)]
struct ProfessionalClaim {
    subscriber: Subscriber,
    provider: BillingProvider,
    payer_name: String,
    payer_id: String,
    claim_id: Option<String>,
    total_charge: Decimal,
    place_of_service: String,
    diagnosis_codes: Vec<String>,
    lines: Vec<ServiceLine>,
}

/// Collects field problems while reading a draft
struct FieldReader<'a> {
    draft: &'a ClaimDraft,
    problems: Vec<FieldProblem>,
}

impl<'a> FieldReader<'a> {
    fn new(draft: &'a ClaimDraft) -> Self {
        Self {
            draft,
            problems: Vec::new(),
        }
    }

    fn problem(&mut self, field: &str, reason: impl Into<String>) {
        self.problems.push(FieldProblem::new(field, reason));
    }

    fn text(&self, field: &str) -> Option<String> {
        self.draft
            .get_text(field)
            .map(|t| clean_element(&t))
            .filter(|t| !t.is_empty())
    }

    fn parsed<T>(&mut self, field: &str, parse: impl Fn(&Value) -> Result<T, String>) -> Option<T> {
        let value = self.draft.get(field)?;
        if !crate::draft::value_is_present(value) {
            return None;
        }
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                self.problem(field, reason);
                None
            }
        }
    }

    fn digits(&mut self, field: &str, lengths: &[usize]) -> Option<String> {
        self.parsed(field, |v| parse_digits(v, lengths))
    }
}

/// Formats claim drafts as EDI 837P interchanges
#[derive(Debug, Clone, Default)]
pub struct EdiFormatter {
    config: FormatterConfig,
}

impl EdiFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Checks that a draft can be formatted without producing a document
    pub fn check(&self, draft: &ClaimDraft) -> Result<(), ClaimError> {
        self.read_claim(draft).map(|_| ())
    }

    /// Formats a draft; the same draft and header always give the same text
    pub fn format(
        &self,
        draft: &ClaimDraft,
        header: &EnvelopeHeader,
    ) -> Result<Edi837Document, ClaimError> {
        let claim = self.read_claim(draft)?;
        let segments = self.segments(&claim, header);
        Ok(Edi837Document::from_segments(
            &segments,
            header.control_number,
            claim.subscriber.member_id.clone(),
        ))
    }

    fn read_claim(&self, draft: &ClaimDraft) -> Result<ProfessionalClaim, ClaimError> {
        let missing = draft.missing(&self.config.required_fields);
        if !missing.is_empty() {
            return Err(ClaimError::MissingFields(missing));
        }

        let cfg = &self.config;
        let mut reader = FieldReader::new(draft);

        let (last_name, first_name) = reader
            .text(fields::NAME)
            .map(|name| split_name(&name))
            .unwrap_or_default();
        if last_name.is_empty() && draft.is_present(fields::NAME) {
            reader.problem(fields::NAME, "no usable name characters");
        }
        let member_id = reader.text(fields::MEMBER_ID).unwrap_or_default();
        if member_id.is_empty() && draft.is_present(fields::MEMBER_ID) {
            reader.problem(fields::MEMBER_ID, "no usable identifier characters");
        }

        let subscriber = Subscriber {
            last_name,
            first_name,
            member_id,
            date_of_birth: reader.parsed(fields::DATE_OF_BIRTH, parse_date),
            gender: reader.parsed(fields::GENDER, parse_gender),
            address: reader.text(fields::ADDRESS),
            city: reader.text(fields::CITY),
            state: reader.parsed(fields::STATE, parse_state),
            zip: reader.digits(fields::ZIP, &[5, 9]),
        };

        let provider = BillingProvider {
            name: reader
                .text(fields::PROVIDER_NAME)
                .unwrap_or_else(|| cfg.billing_provider_name.clone()),
            npi: reader
                .digits(fields::PROVIDER_NPI, &[10])
                .unwrap_or_else(|| cfg.billing_provider_npi.clone()),
            tax_id: reader
                .digits(fields::PROVIDER_TAX_ID, &[9])
                .unwrap_or_else(|| cfg.billing_provider_tax_id.clone()),
            address: PartyAddress {
                street: reader
                    .text(fields::PROVIDER_ADDRESS)
                    .unwrap_or_else(|| cfg.billing_provider_address.clone()),
                city: reader
                    .text(fields::PROVIDER_CITY)
                    .unwrap_or_else(|| cfg.billing_provider_city.clone()),
                state: reader
                    .parsed(fields::PROVIDER_STATE, parse_state)
                    .unwrap_or_else(|| cfg.billing_provider_state.clone()),
                zip: reader
                    .digits(fields::PROVIDER_ZIP, &[5, 9])
                    .unwrap_or_else(|| cfg.billing_provider_zip.clone()),
            },
        };

        let payer_name = reader
            .text(fields::PAYER_NAME)
            .unwrap_or_else(|| cfg.payer_name.clone());
        let payer_id = reader
            .text(fields::PAYER_ID)
            .unwrap_or_else(|| cfg.payer_id.clone());
        let claim_id = reader.text(fields::CLAIM_ID).map(|id| id.chars().take(38).collect());
        let place_of_service = reader
            .digits(fields::PLACE_OF_SERVICE, &[2])
            .unwrap_or_else(|| cfg.default_place_of_service.clone());
        let diagnosis_codes = reader
            .parsed(fields::DIAGNOSIS_CODES, parse_diagnosis_codes)
            .unwrap_or_default();

        let service_date = reader.parsed(fields::SERVICE_DATE, parse_date);
        let procedure_code = reader
            .parsed(fields::PROCEDURE_CODE, parse_procedure_code)
            .unwrap_or_else(|| cfg.default_procedure_code.clone());
        let total = reader.parsed(fields::TOTAL_CHARGE, parse_amount);
        let listed = reader
            .parsed(fields::SERVICE_LINES, |v| parse_service_lines(v, service_date))
            .unwrap_or_default();

        let (lines, total_charge) = if listed.is_empty() {
            let charge = total.unwrap_or(Decimal::ZERO);
            let line = ServiceLine {
                procedure_code,
                charge,
                units: Decimal::ONE,
                service_date,
            };
            (vec![line], charge)
        } else {
            let sum: Decimal = listed.iter().map(|l| l.charge).sum();
            if let Some(total) = total {
                if total != sum {
                    reader.problem(
                        fields::TOTAL_CHARGE,
                        format!("total {} does not equal the service line sum {}", total, sum),
                    );
                }
            }
            (listed, sum)
        };

        if !reader.problems.is_empty() {
            return Err(ClaimError::InvalidFields(reader.problems));
        }

        Ok(ProfessionalClaim {
            subscriber,
            provider,
            payer_name,
            payer_id,
            claim_id,
            total_charge,
            place_of_service,
            diagnosis_codes,
            lines,
        })
    }

    fn segments(&self, claim: &ProfessionalClaim, header: &EnvelopeHeader) -> Vec<Segment> {
        let cfg = &self.config;
        let control = header.interchange_control();
        let group_control = header.control_number.to_string();
        let sender = clean_element(&cfg.sender_id);
        let receiver = clean_element(&cfg.receiver_id);

        let mut segments = vec![
            Segment::new(
                "ISA",
                [
                    "00".to_string(),
                    " ".repeat(10),
                    "00".to_string(),
                    " ".repeat(10),
                    "ZZ".to_string(),
                    fixed_width(&sender, 15),
                    "ZZ".to_string(),
                    fixed_width(&receiver, 15),
                    header.date_yymmdd(),
                    header.time_hhmm(),
                    "^".to_string(),
                    INTERCHANGE_VERSION.to_string(),
                    control.clone(),
                    "0".to_string(),
                    clean_element(&cfg.usage_indicator),
                    ":".to_string(),
                ],
            ),
            Segment::new(
                "GS",
                [
                    "HC".to_string(),
                    sender.clone(),
                    receiver.clone(),
                    header.date_ccyymmdd(),
                    header.time_hhmm(),
                    group_control.clone(),
                    "X".to_string(),
                    IMPLEMENTATION_REFERENCE.to_string(),
                ],
            ),
        ];

        let mut tx = vec![
            Segment::new(
                "ST",
                [TRANSACTION_SET_ID, TRANSACTION_CONTROL, IMPLEMENTATION_REFERENCE],
            ),
            Segment::new(
                "BHT",
                [
                    "0019".to_string(),
                    "00".to_string(),
                    control.clone(),
                    header.date_ccyymmdd(),
                    header.time_hhmm(),
                    "CH".to_string(),
                ],
            ),
            organization("41", &cfg.submitter_name, "46", &sender),
            Segment::new(
                "PER",
                [
                    "IC".to_string(),
                    clean_element(&cfg.submitter_contact),
                    "TE".to_string(),
                    clean_element(&cfg.submitter_phone),
                ],
            ),
            organization("40", &cfg.receiver_name, "46", &receiver),
            Segment::new("HL", ["1", "", "20", "1"]),
            organization("85", &claim.provider.name, "XX", &claim.provider.npi),
            Segment::new("N3", [clean_element(&claim.provider.address.street)]),
            Segment::new(
                "N4",
                [
                    claim.provider.address.city.clone(),
                    claim.provider.address.state.clone(),
                    claim.provider.address.zip.clone(),
                ],
            ),
            Segment::new("REF", ["EI".to_string(), claim.provider.tax_id.clone()]),
            Segment::new("HL", ["2", "1", "22", "0"]),
            Segment::new("SBR", ["P", "18", "", "", "", "", "", "", "CI"]),
        ];

        let sub = &claim.subscriber;
        tx.push(Segment::new(
            "NM1",
            [
                "IL".to_string(),
                "1".to_string(),
                sub.last_name.clone(),
                sub.first_name.clone(),
                String::new(),
                String::new(),
                String::new(),
                "MI".to_string(),
                sub.member_id.clone(),
            ],
        ));
        if let Some(street) = &sub.address {
            tx.push(Segment::new("N3", [street.clone()]));
        }
        if sub.city.is_some() || sub.state.is_some() || sub.zip.is_some() {
            tx.push(Segment::new(
                "N4",
                [
                    sub.city.clone().unwrap_or_default(),
                    sub.state.clone().unwrap_or_default(),
                    sub.zip.clone().unwrap_or_default(),
                ],
            ));
        }
        if let Some(dob) = sub.date_of_birth {
            tx.push(Segment::new(
                "DMG",
                [
                    "D8".to_string(),
                    dob.format("%Y%m%d").to_string(),
                    sub.gender.unwrap_or('U').to_string(),
                ],
            ));
        }

        tx.push(organization("PR", &claim.payer_name, "PI", &claim.payer_id));

        let claim_id = claim
            .claim_id
            .clone()
            .unwrap_or_else(|| format!("CLM{}", control));
        tx.push(Segment::new(
            "CLM",
            [
                claim_id,
                amount(claim.total_charge),
                String::new(),
                String::new(),
                format!("{}:B:1", claim.place_of_service),
                "Y".to_string(),
                "A".to_string(),
                "Y".to_string(),
                "Y".to_string(),
            ],
        ));

        if !claim.diagnosis_codes.is_empty() {
            let codes = claim.diagnosis_codes.iter().enumerate().map(|(i, code)| {
                let qualifier = if i == 0 { "ABK" } else { "ABF" };
                format!("{}:{}", qualifier, code)
            });
            tx.push(Segment::new("HI", codes));
        }
        let pointer = (1..=claim.diagnosis_codes.len().min(4))
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(":");

        for (idx, line) in claim.lines.iter().enumerate() {
            tx.push(Segment::new("LX", [(idx + 1).to_string()]));
            tx.push(Segment::new(
                "SV1",
                [
                    format!("HC:{}", line.procedure_code),
                    amount(line.charge),
                    "UN".to_string(),
                    amount(line.units),
                    String::new(),
                    String::new(),
                    pointer.clone(),
                ],
            ));
            if let Some(date) = line.service_date {
                tx.push(Segment::new(
                    "DTP",
                    ["472".to_string(), "D8".to_string(), date.format("%Y%m%d").to_string()],
                ));
            }
        }

        let count = tx.len() + 1;
        tx.push(Segment::new("SE", [count.to_string(), TRANSACTION_CONTROL.to_string()]));

        segments.extend(tx);
        segments.push(Segment::new("GE", ["1".to_string(), group_control]));
        segments.push(Segment::new("IEA", ["1".to_string(), control]));
        segments
    }
}

fn organization(entity: &str, name: &str, qualifier: &str, id: &str) -> Segment {
    Segment::new(
        "NM1",
        [
            entity.to_string(),
            "2".to_string(),
            clean_element(name),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            qualifier.to_string(),
            clean_element(id),
        ],
    )
}

fn fixed_width(value: &str, width: usize) -> String {
    let truncated: String = value.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Splits `Last, First` or `First Middle Last` into (last, first)
fn split_name(name: &str) -> (String, String) {
    if let Some((last, first)) = name.split_once(',') {
        return (last.trim().to_string(), first.trim().to_string());
    }
    match name.trim().rsplit_once(' ') {
        Some((first, last)) => (last.trim().to_string(), first.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err("expected a text value".to_string()),
    }
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD` or `MM/DD/YYYY`
pub fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    let text = scalar_text(value)?;
    ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", text))
}

/// Accepts plain decimals with an optional `$` and thousands separators
pub fn parse_amount(value: &Value) -> Result<Decimal, String> {
    let text = scalar_text(value)?;
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    let amount = Decimal::from_str(cleaned.trim())
        .map_err(|_| format!("'{}' is not an amount", text))?;
    if amount.is_sign_negative() {
        return Err(format!("'{}' is negative", text));
    }
    Ok(amount)
}

fn parse_gender(value: &Value) -> Result<char, String> {
    let text = scalar_text(value)?;
    match text.to_ascii_lowercase().as_str() {
        "m" | "male" => Ok('M'),
        "f" | "female" => Ok('F'),
        "u" | "unknown" => Ok('U'),
        _ => Err(format!("'{}' is not M, F or U", text)),
    }
}

fn parse_state(value: &Value) -> Result<String, String> {
    let text = scalar_text(value)?;
    if text.len() == 2 && text.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(text.to_ascii_uppercase())
    } else {
        Err(format!("'{}' is not a two-letter state code", text))
    }
}

fn parse_digits(value: &Value, lengths: &[usize]) -> Result<String, String> {
    let text = scalar_text(value)?;
    let digits: String = text.chars().filter(|c| *c != '-' && *c != ' ').collect();
    if digits.chars().all(|c| c.is_ascii_digit()) && lengths.contains(&digits.len()) {
        Ok(digits)
    } else {
        let expected = lengths
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(format!("'{}' must be {} digits", text, expected))
    }
}

fn parse_procedure_code(value: &Value) -> Result<String, String> {
    let text = scalar_text(value)?.to_ascii_uppercase();
    if text.len() == 5 && text.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(text)
    } else {
        Err(format!("'{}' is not a five-character procedure code", text))
    }
}

fn parse_diagnosis_code(raw: &str) -> Result<String, String> {
    let code: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .collect::<String>()
        .to_ascii_uppercase();
    let valid = (3..=7).contains(&code.len())
        && code.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(code)
    } else {
        Err(format!("'{}' is not an ICD-10 code", raw.trim()))
    }
}

fn parse_diagnosis_codes(value: &Value) -> Result<Vec<String>, String> {
    let raw: Vec<String> = match value {
        Value::String(s) => s
            .split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err("expected a list of codes".to_string()),
    };
    if raw.len() > MAX_DIAGNOSIS_CODES {
        return Err(format!("at most {} codes are allowed", MAX_DIAGNOSIS_CODES));
    }
    raw.iter().map(|c| parse_diagnosis_code(c)).collect()
}

fn parse_service_lines(
    value: &Value,
    default_date: Option<NaiveDate>,
) -> Result<Vec<ServiceLine>, String> {
    let Value::Array(items) = value else {
        return Err("expected a list of service lines".to_string());
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let Value::Object(map) = item else {
                return Err(format!("line {} is not an object", idx + 1));
            };
            let line = ClaimDraft::from_map(map.clone());
            let at = |reason: String| format!("line {}: {}", idx + 1, reason);

            let procedure_code = line
                .get(fields::PROCEDURE_CODE)
                .ok_or_else(|| at("procedure code is missing".to_string()))
                .and_then(|v| parse_procedure_code(v).map_err(at))?;
            let charge = line
                .get(fields::CHARGE)
                .ok_or_else(|| at("charge is missing".to_string()))
                .and_then(|v| parse_amount(v).map_err(at))?;
            let units = match line.get(fields::UNITS) {
                Some(v) => parse_amount(v).map_err(at)?,
                None => Decimal::ONE,
            };
            if units.is_zero() {
                return Err(at("units must be positive".to_string()));
            }
            let service_date = match line.get(fields::SERVICE_DATE) {
                Some(v) => Some(parse_date(v).map_err(at)?),
                None => default_date,
            };
            Ok(ServiceLine {
                procedure_code,
                charge,
                units,
                service_date,
            })
        })
        .collect()
}

/// Finds the most recent claim draft in a conversation
///
/// Either the validator's accepted draft or fields the caller supplied
/// directly, whichever came last.
pub fn latest_draft(context: &ConversationContext) -> Option<&ClaimDraft> {
    context.turns.iter().rev().find_map(|turn| {
        match (turn.agent_message(), turn.user_input()) {
            (Some((VALIDATOR_AGENT, AgentMessage::ClaimDraft { draft, .. })), _) => Some(draft),
            (_, Some(UserInput::Fields { fields })) => Some(fields),
            _ => None,
        }
    })
}

/// The formatter agent
pub struct FormatterAgent {
    profile: AgentProfile,
    formatter: EdiFormatter,
    next_control: AtomicU32,
}

impl FormatterAgent {
    pub fn new(config: FormatterConfig) -> Self {
        let first = config.first_control_number.clamp(1, MAX_CONTROL_NUMBER);
        Self {
            profile: AgentProfile::new(
                FORMATTER_AGENT,
                "Converts validated claim JSON to EDI 837 format. \
                 Use this agent after the claim validator has produced a complete claim.",
                "Take the claim JSON and produce a valid EDI 837 professional claim document. \
                 If the claim is incomplete or a field cannot be read, say which fields must be fixed.",
            ),
            formatter: EdiFormatter::new(config),
            next_control: AtomicU32::new(first),
        }
    }

    pub fn formatter(&self) -> &EdiFormatter {
        &self.formatter
    }

    /// Allocates the next interchange control number, wrapping after 999999999
    fn allocate_control_number(&self) -> u32 {
        let previous = self
            .next_control
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n >= MAX_CONTROL_NUMBER { 1 } else { n + 1 })
            });
        match previous {
            Ok(n) | Err(n) => n,
        }
    }
}

#[async_trait]
impl Agent for FormatterAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn respond(&self, context: &ConversationContext) -> Result<AgentMessage, ClaimError> {
        let draft = latest_draft(context).ok_or(ClaimError::NoDraft)?;

        if let Err(err) = self.formatter.check(draft) {
            let fields = err.offending_fields();
            if fields.is_empty() {
                return Err(err);
            }
            warn!(
                conversation = %context.conversation_id,
                fields = ?fields,
                "Formatter rejected claim draft"
            );
            return Ok(AgentMessage::Rejected {
                reason: err.to_string(),
                fields,
            });
        }

        let header = EnvelopeHeader::new(self.allocate_control_number(), Utc::now().naive_utc());
        let document = self.formatter.format(draft, &header)?;
        info!(
            conversation = %context.conversation_id,
            control_number = header.control_number,
            member_id = %document.member_id(),
            "EDI 837 produced"
        );
        Ok(AgentMessage::Edi837 { document })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;

    fn header() -> EnvelopeHeader {
        let ts = NaiveDateTime::parse_from_str("2024-03-05 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        EnvelopeHeader::new(42, ts)
    }

    fn draft(value: Value) -> ClaimDraft {
        match value {
            Value::Object(map) => ClaimDraft::from_map(map),
            _ => panic!("draft must be an object"),
        }
    }

    #[test]
    fn test_minimal_draft_formats_valid_document() {
        let formatter = EdiFormatter::default();
        let doc = formatter
            .format(&draft(json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})), &header())
            .unwrap();

        let report = doc.validate().unwrap();
        assert_eq!(report.member_id.as_deref(), Some("MEM1234553"));
        assert_eq!(report.control_number, "000000042");
        assert_eq!(report.service_lines, 1);
        assert!(doc.as_str().contains("NM1*IL*1*Maher*Corey****MI*MEM1234553~"));
        assert!(doc.as_str().contains("SV1*HC:99213*0*UN*1~"));
    }

    #[test]
    fn test_isa_is_fixed_width() {
        let doc = EdiFormatter::default()
            .format(&draft(json!({"Name": "A B", "MemberID": "1"})), &header())
            .unwrap();
        let isa = doc.as_str().lines().next().unwrap();
        assert_eq!(isa.len(), 106);
        assert!(isa.starts_with("ISA*00*          *00*          *ZZ*CLAIMSDELEGATE *"));
    }

    #[test]
    fn test_same_header_is_byte_identical() {
        let formatter = EdiFormatter::default();
        let input = draft(json!({
            "Name": "Corey Maher",
            "MemberID": "MEM1234553",
            "DiagnosisCodes": "J06.9, R05",
            "ServiceLines": [
                {"ProcedureCode": "99213", "Charge": "125.00", "ServiceDate": "2024-02-01"},
                {"ProcedureCode": "87880", "Charge": 40, "Units": 2}
            ]
        }));
        let first = formatter.format(&input, &header()).unwrap();
        let second = formatter.format(&input, &header()).unwrap();
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn test_service_lines_and_diagnoses() {
        let doc = EdiFormatter::default()
            .format(
                &draft(json!({
                    "Name": "Maher, Corey",
                    "MemberID": "MEM1",
                    "DiagnosisCodes": ["J06.9", "R05"],
                    "ServiceLines": [
                        {"ProcedureCode": "99213", "Charge": "$125.00", "ServiceDate": "20240201"},
                        {"ProcedureCode": "87880", "Charge": 40, "Units": 2}
                    ]
                })),
                &header(),
            )
            .unwrap();
        let text = doc.as_str();
        assert!(text.contains("NM1*IL*1*Maher*Corey****MI*MEM1~"));
        assert!(text.contains("CLM*CLM000000042*165***11:B:1*Y*A*Y*Y~"));
        assert!(text.contains("HI*ABK:J069*ABF:R05~"));
        assert!(text.contains("SV1*HC:99213*125*UN*1***1:2~"));
        assert!(text.contains("DTP*472*D8*20240201~"));
        assert!(text.contains("LX*2~"));
        assert_eq!(doc.validate().unwrap().service_lines, 2);
    }

    #[test]
    fn test_missing_required_fields() {
        let err = EdiFormatter::default()
            .format(&draft(json!({"Name": "Corey Maher"})), &header())
            .unwrap_err();
        assert_eq!(err.offending_fields(), vec!["MemberID".to_string()]);
    }

    #[test]
    fn test_unreadable_optional_fields_are_reported() {
        let err = EdiFormatter::default()
            .format(
                &draft(json!({
                    "Name": "Corey Maher",
                    "MemberID": "MEM1",
                    "DateOfBirth": "last spring",
                    "Gender": "x",
                    "ProviderNPI": "123"
                })),
                &header(),
            )
            .unwrap_err();
        assert!(matches!(err, ClaimError::InvalidFields(_)));
        assert_eq!(
            err.offending_fields(),
            vec!["DateOfBirth".to_string(), "Gender".to_string(), "ProviderNPI".to_string()]
        );
    }

    #[test]
    fn test_total_must_match_lines() {
        let err = EdiFormatter::default()
            .format(
                &draft(json!({
                    "Name": "Corey Maher",
                    "MemberID": "MEM1",
                    "TotalCharge": "100",
                    "ServiceLines": [{"ProcedureCode": "99213", "Charge": "90"}]
                })),
                &header(),
            )
            .unwrap_err();
        assert_eq!(err.offending_fields(), vec!["TotalCharge".to_string()]);
    }

    #[test]
    fn test_subscriber_demographics() {
        let doc = EdiFormatter::default()
            .format(
                &draft(json!({
                    "Name": "Corey Maher",
                    "MemberID": "MEM1",
                    "DateOfBirth": "1985-07-14",
                    "Gender": "male",
                    "Address": "12 Oak*Lane",
                    "City": "Austin",
                    "State": "tx",
                    "Zip": "78701"
                })),
                &header(),
            )
            .unwrap();
        let text = doc.as_str();
        assert!(text.contains("N3*12 OakLane~"));
        assert!(text.contains("N4*Austin*TX*78701~"));
        assert!(text.contains("DMG*D8*19850714*M~"));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_control_numbers_increase() {
        let agent = FormatterAgent::new(FormatterConfig {
            first_control_number: 7,
            ..FormatterConfig::default()
        });
        assert_eq!(agent.allocate_control_number(), 7);
        assert_eq!(agent.allocate_control_number(), 8);
    }

    #[test]
    fn test_control_numbers_wrap() {
        let agent = FormatterAgent::new(FormatterConfig {
            first_control_number: MAX_CONTROL_NUMBER,
            ..FormatterConfig::default()
        });
        assert_eq!(agent.allocate_control_number(), MAX_CONTROL_NUMBER);
        assert_eq!(agent.allocate_control_number(), 1);
    }

    #[tokio::test]
    async fn test_agent_rejects_incomplete_draft() {
        let agent = FormatterAgent::new(FormatterConfig::default());
        let context = ConversationContext::from_input(UserInput::Fields {
            fields: draft(json!({"Name": "Corey Maher"})),
        });
        match agent.respond(&context).await.unwrap() {
            AgentMessage::Rejected { fields, .. } => assert_eq!(fields, vec!["MemberID".to_string()]),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_agent_without_draft() {
        let agent = FormatterAgent::new(FormatterConfig::default());
        let context = ConversationContext::from_input(UserInput::text("hello"));
        assert!(matches!(agent.respond(&context).await, Err(ClaimError::NoDraft)));
    }
}

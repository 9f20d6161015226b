//! EDI 837 professional claim documents
//!
//! An X12 interchange is a flat list of segments. Each segment is an id and
//! `*`-separated elements, terminated by `~`. This module owns the segment
//! model, rendering, parsing, and the structural checks an emitted document
//! must pass:
//!
//! ```text
//! ISA                      interchange header (fixed width)
//!   GS                     functional group (HC)
//!     ST ... SE            837 transaction set
//!   GE
//! IEA
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ClaimError;

pub const ELEMENT_SEPARATOR: char = '*';
pub const COMPONENT_SEPARATOR: char = ':';
pub const REPETITION_SEPARATOR: char = '^';
pub const SEGMENT_TERMINATOR: char = '~';

/// 837 Professional implementation guide
pub const IMPLEMENTATION_REFERENCE: &str = "005010X222A1";
pub const TRANSACTION_SET_ID: &str = "837";
pub const INTERCHANGE_VERSION: &str = "00501";

/// Segments every transaction set must carry, in this order
const REQUIRED_SEQUENCE: &[(&str, Option<&str>)] = &[
    ("BHT", None),
    ("NM1", Some("41")),
    ("NM1", Some("40")),
    ("HL", None),
    ("NM1", Some("85")),
    ("HL", None),
    ("SBR", None),
    ("NM1", Some("IL")),
    ("NM1", Some("PR")),
    ("CLM", None),
    ("LX", None),
    ("SV1", None),
];

/// One X12 segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub elements: Vec<String>,
}

impl Segment {
    pub fn new<I, S>(id: &str, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Element by X12 position (1-based, so `NM109` is `element(9)`)
    pub fn element(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.elements.get(i))
            .map(String::as_str)
    }

    /// Renders without the terminator; trailing empty elements are dropped
    pub fn render(&self) -> String {
        let used = self
            .elements
            .iter()
            .rposition(|e| !e.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);
        let mut out = self.id.clone();
        for element in &self.elements[..used] {
            out.push(ELEMENT_SEPARATOR);
            out.push_str(element);
        }
        out
    }

    fn is(&self, id: &str, qualifier: Option<&str>) -> bool {
        self.id == id && qualifier.map_or(true, |q| self.element(1) == Some(q))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.render(), SEGMENT_TERMINATOR)
    }
}

/// Removes delimiter and control characters and collapses whitespace
pub fn clean_element(value: &str) -> String {
    value
        .chars()
        .filter(|c| {
            !matches!(
                *c,
                ELEMENT_SEPARATOR | COMPONENT_SEPARATOR | REPETITION_SEPARATOR | SEGMENT_TERMINATOR
            ) && !c.is_control()
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Envelope values that vary per interchange
///
/// Formatting the same draft with the same header yields identical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Interchange and group control number (1..=999_999_999)
    pub control_number: u32,
    pub timestamp: NaiveDateTime,
}

impl EnvelopeHeader {
    pub fn new(control_number: u32, timestamp: NaiveDateTime) -> Self {
        Self {
            control_number,
            timestamp,
        }
    }

    /// ISA13 / IEA02 form
    pub fn interchange_control(&self) -> String {
        format!("{:09}", self.control_number)
    }

    pub fn date_ccyymmdd(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }

    pub fn date_yymmdd(&self) -> String {
        self.timestamp.format("%y%m%d").to_string()
    }

    pub fn time_hhmm(&self) -> String {
        self.timestamp.format("%H%M").to_string()
    }
}

/// Summary of a structurally valid interchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub control_number: String,
    pub transaction_count: usize,
    /// Segments from ST to SE inclusive
    pub transaction_segment_count: usize,
    pub service_lines: usize,
    pub member_id: Option<String>,
}

/// A formatted EDI 837 claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edi837Document {
    text: String,
    control_number: u32,
    member_id: String,
}

impl Edi837Document {
    /// Renders segments into a document
    pub(crate) fn from_segments(segments: &[Segment], control_number: u32, member_id: String) -> Self {
        let text = segments
            .iter()
            .map(|s| format!("{}\n", s))
            .collect::<String>();
        Self {
            text,
            control_number,
            member_id,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn control_number(&self) -> u32 {
        self.control_number
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Parses the document back into segments
    pub fn segments(&self) -> Result<Vec<Segment>, ClaimError> {
        parse_segments(&self.text)
    }

    /// Runs the structural checks on this document
    pub fn validate(&self) -> Result<StructureReport, ClaimError> {
        validate_structure(&self.text)
    }
}

impl fmt::Display for Edi837Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits X12 text into segments
pub fn parse_segments(text: &str) -> Result<Vec<Segment>, ClaimError> {
    let segments: Vec<Segment> = text
        .split(SEGMENT_TERMINATOR)
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            let mut parts = raw.split(ELEMENT_SEPARATOR);
            let id = parts.next().unwrap_or_default().to_string();
            Segment {
                id,
                elements: parts.map(str::to_string).collect(),
            }
        })
        .collect();

    if segments.is_empty() {
        return Err(ClaimError::InvalidEdi("document has no segments".to_string()));
    }
    if let Some(bad) = segments
        .iter()
        .find(|s| s.id.is_empty() || s.id.len() > 3 || !s.id.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return Err(ClaimError::InvalidEdi(format!("bad segment id {:?}", bad.id)));
    }
    Ok(segments)
}

/// Checks envelope pairing, control numbers, counts and segment order
pub fn validate_structure(text: &str) -> Result<StructureReport, ClaimError> {
    let segments = parse_segments(text)?;
    let invalid = |msg: String| ClaimError::InvalidEdi(msg);

    let isa = &segments[0];
    if isa.id != "ISA" || isa.elements.len() != 16 {
        return Err(invalid("document must start with a 16-element ISA".to_string()));
    }
    let iea = &segments[segments.len() - 1];
    if iea.id != "IEA" {
        return Err(invalid("document must end with IEA".to_string()));
    }
    let control = isa.element(13).unwrap_or_default().to_string();
    if iea.element(2) != Some(control.as_str()) {
        return Err(invalid(format!("IEA02 does not match ISA13 {}", control)));
    }

    let groups: Vec<usize> = positions(&segments, "GS");
    if iea.element(1) != Some(groups.len().to_string().as_str()) {
        return Err(invalid("IEA01 does not match the number of groups".to_string()));
    }

    let mut transaction_count = 0;
    let mut transaction_segment_count = 0;
    let mut service_lines = 0;
    let mut member_id = None;

    for &gs_idx in &groups {
        let gs = &segments[gs_idx];
        let ge_idx = segments[gs_idx..]
            .iter()
            .position(|s| s.id == "GE")
            .map(|p| p + gs_idx)
            .ok_or_else(|| invalid("GS without GE".to_string()))?;
        let ge = &segments[ge_idx];
        if gs.element(6) != ge.element(2) {
            return Err(invalid("GE02 does not match GS06".to_string()));
        }
        if gs.element(8) != Some(IMPLEMENTATION_REFERENCE) {
            return Err(invalid(format!("GS08 must be {}", IMPLEMENTATION_REFERENCE)));
        }

        let group = &segments[gs_idx + 1..ge_idx];
        let starts = positions(group, "ST");
        if ge.element(1) != Some(starts.len().to_string().as_str()) {
            return Err(invalid("GE01 does not match the number of transactions".to_string()));
        }

        for &st_idx in &starts {
            let st = &group[st_idx];
            let se_idx = group[st_idx..]
                .iter()
                .position(|s| s.id == "SE")
                .map(|p| p + st_idx)
                .ok_or_else(|| invalid("ST without SE".to_string()))?;
            let se = &group[se_idx];
            let count = se_idx - st_idx + 1;

            if st.element(1) != Some(TRANSACTION_SET_ID) {
                return Err(invalid("ST01 must be 837".to_string()));
            }
            if st.element(2) != se.element(2) {
                return Err(invalid("SE02 does not match ST02".to_string()));
            }
            if se.element(1) != Some(count.to_string().as_str()) {
                return Err(invalid(format!(
                    "SE01 is {:?} but the transaction has {} segments",
                    se.element(1),
                    count
                )));
            }

            let body = &group[st_idx + 1..se_idx];
            check_sequence(body)?;

            let lines = body.iter().filter(|s| s.id == "LX").count();
            let priced = body.iter().filter(|s| s.id == "SV1").count();
            if lines != priced {
                return Err(invalid("every LX must be followed by an SV1".to_string()));
            }

            if member_id.is_none() {
                member_id = body
                    .iter()
                    .find(|s| s.is("NM1", Some("IL")))
                    .and_then(|s| s.element(9))
                    .map(str::to_string);
            }

            transaction_count += 1;
            transaction_segment_count += count;
            service_lines += lines;
        }
    }

    if transaction_count == 0 {
        return Err(invalid("interchange carries no transaction sets".to_string()));
    }

    Ok(StructureReport {
        control_number: control,
        transaction_count,
        transaction_segment_count,
        service_lines,
        member_id,
    })
}

fn positions(segments: &[Segment], id: &str) -> Vec<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.id == id)
        .map(|(i, _)| i)
        .collect()
}

fn check_sequence(body: &[Segment]) -> Result<(), ClaimError> {
    let mut cursor = 0;
    for (id, qualifier) in REQUIRED_SEQUENCE {
        let found = body[cursor..]
            .iter()
            .position(|s| s.is(id, *qualifier))
            .ok_or_else(|| {
                ClaimError::InvalidEdi(format!(
                    "missing or out-of-order segment {}{}",
                    id,
                    qualifier.map(|q| format!("*{}", q)).unwrap_or_default()
                ))
            })?;
        cursor += found + 1;
    }
    Ok(())
}

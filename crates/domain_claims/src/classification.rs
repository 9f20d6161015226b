//! Post-adjudication issue classification
//!
//! A [`ClassificationPolicy`] decides whether the problem on an adjudicated
//! claim is one the member can fix or one claims operations must handle.
//! Policies return `None` when they cannot tell; the checker decides what to
//! do with an unclassified claim.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adjudication::{AdjudicatedClaim, EvaluationRules};

/// Who has to act on an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    MemberResolvable,
    OpsResolvable,
}

impl Resolution {
    /// Reads `member` / `operations` style labels
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "member" | "memberresolvable" | "patient" | "subscriber" => {
                Some(Resolution::MemberResolvable)
            }
            "operations" | "ops" | "opsresolvable" | "operationsresolvable" | "internal"
            | "staff" | "claimsteam" => Some(Resolution::OpsResolvable),
            _ => None,
        }
    }
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Result of classifying one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub resolution: Resolution,
    pub issue: String,
    pub remediation_steps: Vec<String>,
    /// The rule or catalog entry that decided the outcome
    pub matched_rule: String,
}

/// Pluggable classification boundary
pub trait ClassificationPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, claim: &AdjudicatedClaim, rules: &EvaluationRules) -> Option<Classification>;
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "claim", "claims", "due", "for", "has",
    "have", "if", "in", "is", "it", "its", "of", "on", "or", "the", "there", "this", "to",
    "was", "when", "with",
];

const MEMBER_KEYWORDS: &[&str] = &["member", "patient", "subscriber", "insured", "enrollee"];
const OPS_KEYWORDS: &[&str] = &[
    "operations",
    "ops",
    "claims team",
    "internal",
    "staff",
    "provider relations",
    "billing team",
];

/// Lowercased alphanumeric words
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn significant_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn singular(word: &str) -> &str {
    if word.len() > 3 {
        word.strip_suffix('s').unwrap_or(word)
    } else {
        word
    }
}

/// Vocabulary of a claim's status, issue and reason codes
struct ClaimVocabulary {
    words: HashSet<String>,
}

impl ClaimVocabulary {
    fn new(claim: &AdjudicatedClaim) -> Self {
        Self {
            words: words(&claim.searchable_text())
                .iter()
                .map(|w| singular(w).to_string())
                .collect(),
        }
    }

    fn contains(&self, word: &str) -> bool {
        self.words.contains(singular(word))
    }

    /// Every significant word of `condition` occurs in the claim
    fn matches(&self, condition: &str) -> bool {
        let wanted = significant_words(condition);
        !wanted.is_empty() && wanted.iter().all(|w| self.contains(w))
    }
}

/// Position of the first keyword found on a word boundary
fn keyword_position(text: &str, keywords: &[&str]) -> Option<usize> {
    keywords
        .iter()
        .filter_map(|kw| {
            text.match_indices(kw).find_map(|(pos, _)| {
                let before = text[..pos].chars().next_back();
                let after = text[pos + kw.len()..].chars().next();
                let bounded = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
                (bounded(before) && bounded(after)).then_some(pos)
            })
        })
        .min()
}

/// Decides the side from an action phrase; the earliest mention wins
fn resolution_of_action(action: &str) -> Option<Resolution> {
    let lowered = action.to_lowercase();
    if let Some(label) = Resolution::from_label(&lowered) {
        return Some(label);
    }
    let member = keyword_position(&lowered, MEMBER_KEYWORDS);
    let ops = keyword_position(&lowered, OPS_KEYWORDS);
    match (member, ops) {
        (Some(m), Some(o)) if o < m => Some(Resolution::OpsResolvable),
        (Some(_), _) => Some(Resolution::MemberResolvable),
        (None, Some(_)) => Some(Resolution::OpsResolvable),
        (None, None) => None,
    }
}

/// A rule line understood by [`InstructionPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRule {
    pub condition: String,
    pub resolution: Resolution,
    pub steps: Vec<String>,
    pub source: String,
}

impl InstructionRule {
    /// Parses `<condition> => <action>` or `If <condition>, <action>`
    ///
    /// Text after `:` in the action is split on `;` into remediation steps.
    pub fn parse(line: &str) -> Option<Self> {
        let (condition, action) = if let Some((cond, action)) = line.split_once("=>") {
            (cond.trim(), action.trim())
        } else {
            // ASCII folding keeps byte offsets valid for slicing `line`
            let lowered = line.to_ascii_lowercase();
            let rest_start = lowered.strip_prefix("if ").map(|_| 3)?;
            let rest = &line[rest_start..];
            let rest_lower = &lowered[rest_start..];
            let split = rest_lower
                .find(" then ")
                .map(|i| (i, i + " then ".len()))
                .or_else(|| rest_lower.find(',').map(|i| (i, i + 1)))?;
            (rest[..split.0].trim(), rest[split.1..].trim())
        };

        let (head, steps) = match action.split_once(':') {
            Some((head, steps)) => (head.trim(), split_steps(steps)),
            None => (action, Vec::new()),
        };
        let resolution = resolution_of_action(head)?;
        if condition.is_empty() {
            return None;
        }

        Some(Self {
            condition: condition.to_string(),
            resolution,
            steps,
            source: line.to_string(),
        })
    }
}

fn split_steps(text: &str) -> Vec<String> {
    text.split(';')
        .map(|s| s.trim().trim_end_matches('.').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interprets the caller's plain-language rules; the first matching line wins
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionPolicy;

impl ClassificationPolicy for InstructionPolicy {
    fn name(&self) -> &str {
        "instructions"
    }

    fn classify(&self, claim: &AdjudicatedClaim, rules: &EvaluationRules) -> Option<Classification> {
        let vocabulary = ClaimVocabulary::new(claim);
        rules
            .lines()
            .filter_map(InstructionRule::parse)
            .find(|rule| vocabulary.matches(&rule.condition))
            .map(|rule| Classification {
                resolution: rule.resolution,
                issue: claim.issue_summary(),
                remediation_steps: rule.steps,
                matched_rule: rule.source,
            })
    }
}

/// A known issue type
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub key: &'static str,
    /// Any one of these word sets identifies the issue
    pub patterns: &'static [&'static [&'static str]],
    pub resolution: Resolution,
    pub label: &'static str,
    pub steps: &'static [&'static str],
}

impl CatalogEntry {
    fn matches(&self, vocabulary: &ClaimVocabulary) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.iter().all(|w| vocabulary.contains(w)))
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "provider_taxonomy_mismatch",
        patterns: &[&["taxonomy"]],
        resolution: Resolution::OpsResolvable,
        label: "Provider taxonomy code does not match the billed services",
        steps: &[
            "Verify the rendering provider taxonomy with provider data management",
            "Correct the taxonomy code and reprocess the claim",
        ],
    },
    CatalogEntry {
        key: "npi_mismatch",
        patterns: &[&["npi"]],
        resolution: Resolution::OpsResolvable,
        label: "Provider NPI does not match the provider on file",
        steps: &[
            "Validate the billing and rendering NPI against the provider registry",
            "Update the provider record and reprocess the claim",
        ],
    },
    CatalogEntry {
        key: "coding_error",
        patterns: &[&["coding"], &["invalid", "procedure"], &["diagnosis", "code"], &["modifier"]],
        resolution: Resolution::OpsResolvable,
        label: "Procedure or diagnosis coding error",
        steps: &[
            "Review the procedure and diagnosis codes with the provider",
            "Request a corrected claim if the coding is wrong",
        ],
    },
    CatalogEntry {
        key: "authorization",
        patterns: &[&["authorization"], &["preauthorization"], &["prior", "auth"]],
        resolution: Resolution::OpsResolvable,
        label: "Required authorization is missing or does not match",
        steps: &[
            "Check the utilization management system for a matching authorization",
            "Link the authorization to the claim or route to the provider for retro review",
        ],
    },
    CatalogEntry {
        key: "duplicate_claim",
        patterns: &[&["duplicate"]],
        resolution: Resolution::OpsResolvable,
        label: "Claim was flagged as a duplicate",
        steps: &[
            "Compare the claim with the original submission",
            "Close the duplicate or reverse the denial if the services differ",
        ],
    },
    CatalogEntry {
        key: "address_mismatch",
        patterns: &[&["address", "mismatch"], &["address", "match"], &["invalid", "address"]],
        resolution: Resolution::MemberResolvable,
        label: "The address on the claim does not match the address on file",
        steps: &[
            "Confirm your current mailing address",
            "Update your address through member services or the member portal",
        ],
    },
    CatalogEntry {
        key: "coordination_of_benefits",
        patterns: &[&["coordination", "benefit"], &["cob"], &["other", "insurance"]],
        resolution: Resolution::MemberResolvable,
        label: "Coordination of benefits information is needed",
        steps: &[
            "Complete the coordination of benefits questionnaire",
            "Tell us about any other health coverage you have",
        ],
    },
    CatalogEntry {
        key: "missing_member_information",
        patterns: &[&["missing", "member"], &["member", "information"], &["incomplete", "member"]],
        resolution: Resolution::MemberResolvable,
        label: "Member information is missing or incomplete",
        steps: &[
            "Review your member profile for missing details",
            "Send the missing information to member services",
        ],
    },
    CatalogEntry {
        key: "eligibility_verification",
        patterns: &[&["eligibility"], &["dependent", "verification"], &["not", "eligible"]],
        resolution: Resolution::MemberResolvable,
        label: "Eligibility or dependent verification is required",
        steps: &[
            "Provide proof of eligibility for the patient",
            "Complete the dependent verification form",
        ],
    },
];

/// Built-in catalog of known adjudication issues
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueCatalogPolicy;

impl IssueCatalogPolicy {
    pub fn entries() -> &'static [CatalogEntry] {
        CATALOG
    }
}

impl ClassificationPolicy for IssueCatalogPolicy {
    fn name(&self) -> &str {
        "issue_catalog"
    }

    fn classify(&self, claim: &AdjudicatedClaim, _rules: &EvaluationRules) -> Option<Classification> {
        let vocabulary = ClaimVocabulary::new(claim);
        CATALOG
            .iter()
            .find(|entry| entry.matches(&vocabulary))
            .map(|entry| Classification {
                resolution: entry.resolution,
                issue: claim.issue.clone().unwrap_or_else(|| entry.label.to_string()),
                remediation_steps: entry.steps.iter().map(|s| s.to_string()).collect(),
                matched_rule: entry.key.to_string(),
            })
    }
}

/// Tries policies in order and returns the first classification
#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<Box<dyn ClassificationPolicy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller instructions first, then the built-in catalog
    pub fn standard() -> Self {
        Self::new().with(InstructionPolicy).with(IssueCatalogPolicy)
    }

    pub fn with(mut self, policy: impl ClassificationPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl ClassificationPolicy for PolicyChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn classify(&self, claim: &AdjudicatedClaim, rules: &EvaluationRules) -> Option<Classification> {
        self.policies.iter().find_map(|policy| {
            let result = policy.classify(claim, rules);
            if let Some(ref c) = result {
                debug!(
                    policy = policy.name(),
                    claim_id = %claim.claim_id,
                    rule = %c.matched_rule,
                    "Claim classified"
                );
            }
            result
        })
    }
}

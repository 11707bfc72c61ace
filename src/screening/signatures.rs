//! Threat signatures
//!
//! Signatures are anchored on syntactic markers (statement terminators,
//! quotes, tags, imperative override phrases) rather than on business
//! vocabulary, so ordinary analytics questions about "costs", "drops" or
//! "deleted licenses" never match.

use regex::Regex;

use super::config::CustomSignature;
use super::error::{ScreeningError, ScreeningResult};
use super::types::ThreatCategory;

/// A compiled signature
#[derive(Debug, Clone)]
pub struct ThreatSignature {
    pub name: String,
    pub category: ThreatCategory,
    pub severity: f32,
    regex: Regex,
}

impl ThreatSignature {
    pub fn new(
        name: impl Into<String>,
        category: ThreatCategory,
        severity: f32,
        pattern: &str,
    ) -> ScreeningResult<Self> {
        let name = name.into();
        if !(0.0..=1.0).contains(&severity) {
            return Err(ScreeningError::InvalidSeverity { name, severity });
        }
        let regex = Regex::new(pattern).map_err(|e| ScreeningError::InvalidPattern {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            category,
            severity,
            regex,
        })
    }

    /// First matching fragment, if any
    pub fn find<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

impl TryFrom<&CustomSignature> for ThreatSignature {
    type Error = ScreeningError;

    fn try_from(custom: &CustomSignature) -> ScreeningResult<Self> {
        ThreatSignature::new(
            custom.name.clone(),
            custom.category,
            custom.severity,
            &custom.pattern,
        )
    }
}

/// (name, category, severity, pattern) in evaluation order
const BUILTIN: &[(&str, ThreatCategory, f32, &str)] = &[
    // Structured-query injection
    (
        "terminated_destructive_statement",
        ThreatCategory::SqlInjection,
        0.95,
        r"(?i);\s*(drop\s+(table|database|schema|view|index)\b|truncate\s+(table\s+)?\w+|alter\s+table\b|delete\s+from\b|insert\s+into\b|update\s+\w+\s+set\b|exec(ute)?\s|shutdown\b|create\s+(table|user|login)\b)",
    ),
    ("terminated_comment", ThreatCategory::SqlInjection, 0.85, r";\s*--"),
    ("union_select", ThreatCategory::SqlInjection, 0.9, r"(?i)\bunion\s+(all\s+)?select\b"),
    ("drop_table", ThreatCategory::SqlInjection, 0.9, r"(?i)\bdrop\s+(table|database|schema)\b"),
    (
        "quoted_tautology",
        ThreatCategory::SqlInjection,
        0.85,
        r"(?i)'\s*or\s+'?\w+'?\s*=\s*'?\w+",
    ),
    // A closed string literal in a predicate, or a quote that ends the input,
    // followed by a comment marker. Possessives like "clients' #1" stay clean.
    (
        "quote_comment",
        ThreatCategory::SqlInjection,
        0.8,
        r"(?i)(?:[=(]\s*|\b(?:where|and|or|like|values|select|from|by|in)\s+)'[^']*'\s*(?:--|#|/\*)|'\s*(?:--|#|/\*)\s*$",
    ),
    (
        "stored_procedure_call",
        ThreatCategory::SqlInjection,
        0.9,
        r"(?i)\bexec(ute)?\s*\(?\s*(xp|sp)_\w+",
    ),
    // Script / markup injection
    ("script_tag", ThreatCategory::ScriptInjection, 0.95, r"(?i)<\s*script\b"),
    ("javascript_uri", ThreatCategory::ScriptInjection, 0.9, r"(?i)javascript\s*:"),
    (
        "inline_event_handler",
        ThreatCategory::ScriptInjection,
        0.9,
        r"(?i)<[^>]*\bon[a-z]+\s*=",
    ),
    ("eval_call", ThreatCategory::ScriptInjection, 0.85, r"(?i)\beval\s*\("),
    (
        "embedded_frame",
        ThreatCategory::ScriptInjection,
        0.8,
        r"(?i)<\s*(iframe|object|embed)\b",
    ),
    // Instruction override in free text
    (
        "ignore_previous_instructions",
        ThreatCategory::PromptInjection,
        0.85,
        r"(?i)\b(ignore|disregard|override)\s+(all\s+)?(the\s+|your\s+)?(previous|prior|above|earlier)\s+(instructions|prompts|rules|directions)",
    ),
    (
        "reveal_system_prompt",
        ThreatCategory::PromptInjection,
        0.8,
        r"(?i)\b(reveal|show|print|repeat|output)\s+(me\s+)?(your|the)\s+system\s+prompt",
    ),
    ("system_prompt", ThreatCategory::PromptInjection, 0.55, r"(?i)\bsystem\s+prompt\b"),
    (
        "forget_everything",
        ThreatCategory::PromptInjection,
        0.7,
        r"(?i)\bforget\s+(everything|all\s+(previous|prior)\s+instructions)",
    ),
    (
        "role_reassignment",
        ThreatCategory::PromptInjection,
        0.6,
        r"(?i)\byou\s+are\s+now\s+(a|an|the|my|in)\b",
    ),
    // Data exfiltration probes
    (
        "privileged_password",
        ThreatCategory::DataExfiltration,
        0.7,
        r"(?i)\b(admin|root|administrator)\s+password",
    ),
    (
        "credential_probe",
        ThreatCategory::DataExfiltration,
        0.5,
        r"(?i)\b(api|secret|access)\s+(key|token)s?\b",
    ),
];

/// Ordered signature set
#[derive(Debug, Clone)]
pub struct SignatureSet {
    signatures: Vec<ThreatSignature>,
}

impl SignatureSet {
    /// Built-in signatures followed by custom ones
    pub fn with_custom(custom: &[CustomSignature]) -> ScreeningResult<Self> {
        let mut signatures = BUILTIN
            .iter()
            .map(|(name, category, severity, pattern)| {
                ThreatSignature::new(*name, *category, *severity, pattern)
            })
            .collect::<ScreeningResult<Vec<_>>>()?;

        for entry in custom {
            signatures.push(ThreatSignature::try_from(entry)?);
        }

        Ok(Self { signatures })
    }

    pub fn builtin() -> ScreeningResult<Self> {
        Self::with_custom(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreatSignature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

//! Query sanitization
//!
//! Redacts personal identifiers from query text before it is embedded
//! or stored as a cache key:
//! - Card numbers
//! - Social security numbers
//! - Phone numbers
//! - Email addresses
//! - IPv4 addresses

use regex::Regex;

use super::error::{PrivacyError, PrivacyResult};

/// Built-in (placeholder, pattern) pairs in application order
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("[CARD]", r"\b(?:\d[ -]?){12,15}\d\b"),
    ("[SSN]", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("[PHONE]", r"(?:\+?1[-. ]?)?\(?\b\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b"),
    ("[EMAIL]", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
    ("[IP]", r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"),
];

/// Text after redaction
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedText {
    pub text: String,
    /// Placeholder of every redaction made
    pub redactions: Vec<String>,
}

impl SanitizedText {
    pub fn was_redacted(&self) -> bool {
        !self.redactions.is_empty()
    }
}

/// PII redactor for query text
#[derive(Debug, Clone)]
pub struct QuerySanitizer {
    patterns: Vec<(String, Regex)>,
}

impl QuerySanitizer {
    /// Create a sanitizer with the built-in patterns
    pub fn new() -> PrivacyResult<Self> {
        Self::with_custom(&[])
    }
    
    /// Built-in patterns followed by custom ones (redacted as `[REDACTED]`)
    pub fn with_custom(custom: &[String]) -> PrivacyResult<Self> {
        let builtin = BUILTIN_PATTERNS
            .iter()
            .map(|(label, pattern)| (label.to_string(), pattern.to_string()));
        let extra = custom
            .iter()
            .map(|pattern| ("[REDACTED]".to_string(), pattern.clone()));
        
        let patterns = builtin
            .chain(extra)
            .map(|(label, pattern)| {
                Regex::new(&pattern)
                    .map(|regex| (label, regex))
                    .map_err(|e| PrivacyError::InvalidPattern {
                        pattern,
                        reason: e.to_string(),
                    })
            })
            .collect::<PrivacyResult<Vec<_>>>()?;
        
        Ok(Self { patterns })
    }
    
    /// Redact identifiers
    pub fn sanitize(&self, input: &str) -> SanitizedText {
        let mut text = input.to_string();
        let mut redactions = Vec::new();
        
        for (label, regex) in &self.patterns {
            let count = regex.find_iter(&text).count();
            if count > 0 {
                text = regex.replace_all(&text, label.as_str()).into_owned();
                redactions.extend(std::iter::repeat(label.clone()).take(count));
            }
        }
        
        if !redactions.is_empty() {
            tracing::debug!(count = redactions.len(), "Redacted identifiers from query");
        }
        SanitizedText { text, redactions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_common_identifiers() {
        let s = QuerySanitizer::new().unwrap();
        let out = s.sanitize("Revenue for john.doe@acme.com, SSN 123-45-6789, call 555-123-4567");
        assert!(!out.text.contains("john.doe"));
        assert!(!out.text.contains("123-45-6789"));
        assert!(!out.text.contains("555-123-4567"));
        assert!(out.text.contains("[EMAIL]"));
        assert!(out.text.contains("[SSN]"));
        assert!(out.text.contains("[PHONE]"));
        assert_eq!(out.redactions.len(), 3);
    }

    #[test]
    fn test_redacts_card_and_ip() {
        let s = QuerySanitizer::new().unwrap();
        let out = s.sanitize("Charge 4111 1111 1111 1111 from 192.168.1.20");
        assert!(out.text.contains("[CARD]"));
        assert!(out.text.contains("[IP]"));
    }

    #[test]
    fn test_business_text_untouched() {
        let s = QuerySanitizer::new().unwrap();
        let text = "What was revenue in Q3 2024 for clients with 50+ seats?";
        let out = s.sanitize(text);
        assert_eq!(out.text, text);
        assert!(!out.was_redacted());
    }

    #[test]
    fn test_custom_pattern() {
        let s = QuerySanitizer::with_custom(&[r"ACCT-\d+".to_string()]).unwrap();
        let out = s.sanitize("Margin for ACCT-99812");
        assert_eq!(out.text, "Margin for [REDACTED]");
    }

    #[test]
    fn test_invalid_custom_pattern() {
        assert!(matches!(
            QuerySanitizer::with_custom(&["[".to_string()]),
            Err(PrivacyError::InvalidPattern { .. })
        ));
    }
}

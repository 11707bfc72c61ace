//! Query types
//!
//! A query is created once per request and never mutated after the
//! pipeline has attached its sanitized text and embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Context key carrying the caller identity
pub const CALLER_ID_KEY: &str = "caller_id";

/// Coarse analytics category of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    /// Margins, revenue, client profitability
    Profitability,
    /// Software license usage and waste
    LicenseEfficiency,
    /// Staff utilization and billable hours
    ResourceUtilization,
    /// Anything else
    General,
}

impl QueryCategory {
    /// Classify query text by keyword families.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has_any(&["profit", "margin", "revenue", "cost", "earning", "income"]) {
            QueryCategory::Profitability
        } else if has_any(&["license", "software", "seat", "subscription"]) {
            QueryCategory::LicenseEfficiency
        } else if has_any(&["staff", "utilization", "resource", "technician", "billable", "hours"]) {
            QueryCategory::ResourceUtilization
        } else {
            QueryCategory::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Profitability => "profitability",
            QueryCategory::LicenseEfficiency => "license_efficiency",
            QueryCategory::ResourceUtilization => "resource_utilization",
            QueryCategory::General => "general",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An analytics request flowing through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Unique identifier (time-ordered)
    pub id: Uuid,

    /// Text as submitted by the caller
    pub text: String,

    /// Text with personal identifiers redacted
    pub sanitized: String,

    /// Feature embedding of the sanitized text
    pub embedding: Vec<f32>,

    /// Analytics category
    pub category: QueryCategory,

    /// Estimated complexity in [0, 1], once known
    #[serde(default)]
    pub complexity: Option<f32>,

    /// Caller-supplied context
    pub context: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, context: HashMap<String, String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::now_v7(),
            category: QueryCategory::classify(&text),
            complexity: None,
            sanitized: text.clone(),
            text,
            embedding: Vec::new(),
            context,
            created_at: Utc::now(),
        }
    }

    /// Replace the sanitized text
    pub fn with_sanitized(mut self, sanitized: impl Into<String>) -> Self {
        self.sanitized = sanitized.into();
        self
    }

    /// Attach the embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Attach the complexity estimate
    pub fn with_complexity(mut self, score: f32) -> Self {
        self.complexity = Some(score.clamp(0.0, 1.0));
        self
    }

    /// Caller identity from the context, if present and non-empty
    pub fn caller_id(&self) -> Option<&str> {
        self.context
            .get(CALLER_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_categories() {
        assert_eq!(
            QueryCategory::classify("What is our profit margin?"),
            QueryCategory::Profitability
        );
        assert_eq!(
            QueryCategory::classify("Which licenses are underutilized?"),
            QueryCategory::LicenseEfficiency
        );
        assert_eq!(
            QueryCategory::classify("How is our staff utilization?"),
            QueryCategory::ResourceUtilization
        );
        assert_eq!(QueryCategory::classify("hello"), QueryCategory::General);
    }

    #[test]
    fn test_caller_id_from_context() {
        let mut context = HashMap::new();
        context.insert(CALLER_ID_KEY.to_string(), "alice".to_string());
        let query = Query::new("What are our biggest costs?", context);
        assert_eq!(query.caller_id(), Some("alice"));

        let anonymous = Query::new("What are our biggest costs?", HashMap::new());
        assert_eq!(anonymous.caller_id(), None);
    }

    #[test]
    fn test_builder_keeps_identity() {
        let query = Query::new("raw text", HashMap::new());
        let id = query.id;
        let query = query
            .with_sanitized("clean text")
            .with_embedding(vec![1.0, 0.0])
            .with_complexity(1.7);
        assert_eq!(query.id, id);
        assert_eq!(query.complexity, Some(1.0));
        assert_eq!(query.text, "raw text");
        assert_eq!(query.sanitized, "clean text");
        assert_eq!(query.embedding.len(), 2);
    }
}

//! Query complexity estimation

use serde::{Deserialize, Serialize};

const ANALYTICAL_KEYWORDS: &[&str] = &[
    "analyze", "compare", "correlate", "predict", "optimize", "summarize",
];

const QUESTION_WORDS: &[&str] = &["why", "how", "what if", "compare", "analyze"];

const MULTI_PART_MARKERS: &[&str] = &["and also", "as well as", "in addition", "then ", "; "];

const CROSS_CORRELATION_MARKERS: &[&str] = &[
    "correlat",
    "relationship between",
    "versus",
    " vs ",
    "impact of",
    "affect",
];

/// How hard a query is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    /// Heuristic score in [0, 1]
    pub score: f32,
    
    /// Several questions in one
    pub multi_part: bool,
    
    /// Relates two or more measures
    pub cross_correlation: bool,
}

impl ComplexityEstimate {
    pub const SIMPLE: ComplexityEstimate = ComplexityEstimate {
        score: 0.0,
        multi_part: false,
        cross_correlation: false,
    };
    
    /// Estimate from text: length, analytical keywords, question words and conjunctions
    pub fn estimate(text: &str) -> Self {
        let lower = text.to_lowercase();
        
        let mut score = (text.chars().count() as f32 / 500.0).min(0.3);
        score += 0.1 * ANALYTICAL_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count() as f32;
        if lower.contains('?') {
            score += 0.1 * QUESTION_WORDS.iter().filter(|qw| lower.contains(*qw)).count() as f32;
        }
        
        let multi_part = lower.matches('?').count() > 1
            || MULTI_PART_MARKERS.iter().any(|m| lower.contains(m));
        let cross_correlation = CROSS_CORRELATION_MARKERS.iter().any(|m| lower.contains(m));
        
        Self {
            score: score.min(1.0),
            multi_part,
            cross_correlation,
        }
    }
}

//! Configuration for the feature embedder

use serde::{Deserialize, Serialize};

/// Configuration for deterministic feature embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Output dimension (fixed for the lifetime of a cache)
    pub dimension: usize,
    
    /// Character n-gram length
    pub char_ngram: usize,
    
    /// Weight of whole-word features
    pub word_weight: f32,
    
    /// Weight of adjacent word-pair features
    pub bigram_weight: f32,
    
    /// Weight of character n-gram features
    pub ngram_weight: f32,
    
    /// Drop common English function words
    pub strip_stop_words: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 256,
            char_ngram: 3,
            word_weight: 1.0,
            bigram_weight: 0.75,
            ngram_weight: 0.35,
            strip_stop_words: true,
        }
    }
}

//! Deterministic feature embedder
//!
//! Maps text to a fixed-dimension, L2-normalized vector using signed
//! feature hashing over words, word pairs and character n-grams.
//! The same text always yields the same vector, so cache keys are stable
//! across restarts.

use super::config::EmbeddingConfig;
use super::error::{EmbeddingError, EmbeddingResult};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "am", "of", "in", "on", "at",
    "to", "for", "by", "with", "and", "or", "our", "we", "us", "my", "me", "i", "you", "your",
    "it", "its", "this", "that", "these", "those", "what", "which", "who", "how", "do", "does",
    "did", "can", "could", "should", "would", "please", "show", "tell", "give", "about",
];

/// Text embedder based on hashed lexical features
#[derive(Debug, Clone)]
pub struct FeatureEmbedder {
    config: EmbeddingConfig,
}

impl FeatureEmbedder {
    /// Create a new embedder
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        if config.dimension == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimension must be positive".to_string(),
            });
        }
        if config.char_ngram == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "char_ngram must be positive".to_string(),
            });
        }
        Ok(Self { config })
    }
    
    /// Output dimension
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
    
    /// Embed a single text
    pub fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let all_tokens = tokenize(text);
        if all_tokens.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        
        // A query made only of function words still needs features.
        let tokens: Vec<&str> = if self.config.strip_stop_words {
            let content: Vec<&str> = all_tokens
                .iter()
                .map(String::as_str)
                .filter(|t| !STOP_WORDS.contains(t))
                .collect();
            if content.is_empty() {
                all_tokens.iter().map(String::as_str).collect()
            } else {
                content
            }
        } else {
            all_tokens.iter().map(String::as_str).collect()
        };
        
        let mut vector = vec![0.0f32; self.config.dimension];
        
        for token in &tokens {
            self.accumulate(&mut vector, b"w:", token.as_bytes(), self.config.word_weight);
            
            let padded: Vec<char> = format!("#{token}#").chars().collect();
            let n = self.config.char_ngram;
            if padded.len() >= n {
                for window in padded.windows(n) {
                    let gram: String = window.iter().collect();
                    self.accumulate(&mut vector, b"c:", gram.as_bytes(), self.config.ngram_weight);
                }
            }
        }
        
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, b"b:", joined.as_bytes(), self.config.bigram_weight);
        }
        
        normalize(&mut vector);
        if vector.iter().all(|v| *v == 0.0) {
            // every feature cancelled out; fall back to an unsigned word bag
            for token in &tokens {
                let (bucket, _) = self.bucket(b"w:", token.as_bytes());
                vector[bucket] += 1.0;
            }
            normalize(&mut vector);
        }
        
        Ok(vector)
    }
    
    /// Embed multiple texts
    pub fn batch_embed(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
    
    fn accumulate(&self, vector: &mut [f32], namespace: &[u8], feature: &[u8], weight: f32) {
        let (bucket, sign) = self.bucket(namespace, feature);
        vector[bucket] += sign * weight;
    }
    
    fn bucket(&self, namespace: &[u8], feature: &[u8]) -> (usize, f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace);
        hasher.update(feature);
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();
        
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index) % self.config.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

/// Lowercase alphanumeric tokens
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scale to unit length in place (no-op for the zero vector)
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

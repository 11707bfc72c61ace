//! Cache entries and retention scoring

use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::types::AnalyticsPayload;
use crate::privacy::PrivacyMarker;

/// A cached response keyed by its query embedding
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: Uuid,
    
    /// Sanitized text of the query that produced the payload
    pub canonical_query: String,
    
    pub embedding: Vec<f32>,
    
    pub payload: AnalyticsPayload,
    
    /// Quality in [0, 1] at insert time
    pub quality: f32,
    
    pub created_at: Instant,
    
    pub last_accessed: Instant,
    
    pub hit_count: u64,
    
    /// Forced expiry
    pub expires_at: Option<Instant>,
    
    /// Only this caller may hit the entry
    pub restricted_to: Option<String>,
    
    /// Privacy already applied to the payload (`None` for raw payloads)
    pub privacy: Option<PrivacyMarker>,
}

impl CacheEntry {
    pub fn new(
        canonical_query: impl Into<String>,
        embedding: Vec<f32>,
        payload: AnalyticsPayload,
        quality: f32,
    ) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::now_v7(),
            canonical_query: canonical_query.into(),
            embedding,
            payload,
            quality,
            created_at: now,
            last_accessed: now,
            hit_count: 0,
            expires_at: None,
            restricted_to: None,
            privacy: None,
        }
    }
    
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
    
    /// Whether a caller may be served this entry
    pub fn visible_to(&self, caller: Option<&str>) -> bool {
        match &self.restricted_to {
            None => true,
            Some(owner) => caller == Some(owner.as_str()),
        }
    }
    
    /// Retention score: quality decayed by idle time.
    ///
    /// `quality × 2^(−idle / half_life)`, and 0 beyond `max_idle`.
    pub fn retention_score(&self, now: Instant, half_life: Duration, max_idle: Duration) -> f64 {
        let idle = now.saturating_duration_since(self.last_accessed);
        if idle >= max_idle {
            return 0.0;
        }
        let half_life = half_life.as_secs_f64().max(f64::EPSILON);
        self.quality as f64 * 0.5f64.powf(idle.as_secs_f64() / half_life)
    }
    
    /// Consistency check, returning the first violation found
    pub fn validate(&self, dimension: usize) -> Result<(), String> {
        if self.embedding.len() != dimension {
            return Err(format!(
                "embedding has {} dimensions, expected {}",
                self.embedding.len(),
                dimension
            ));
        }
        if self.embedding.iter().any(|v| !v.is_finite()) {
            return Err("embedding contains non-finite values".to_string());
        }
        if self.embedding.iter().all(|v| *v == 0.0) {
            return Err("embedding has zero norm".to_string());
        }
        if !(self.quality.is_finite() && (0.0..=1.0).contains(&self.quality)) {
            return Err(format!("quality {} outside [0, 1]", self.quality));
        }
        if self.payload.metrics.values().any(|v| !v.is_finite()) {
            return Err("payload contains non-finite metrics".to_string());
        }
        Ok(())
    }
}

/// Options controlling how an entry is stored
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    pub restricted_to: Option<String>,
    pub ttl: Option<Duration>,
    pub privacy: Option<PrivacyMarker>,
}

impl InsertOptions {
    /// Shareable entry
    pub fn shared(privacy: Option<PrivacyMarker>) -> Self {
        Self {
            privacy,
            ..Default::default()
        }
    }
    
    /// Entry from a monitored query: caller-restricted with a short expiry
    pub fn monitored(caller: impl Into<String>, ttl: Duration, privacy: Option<PrivacyMarker>) -> Self {
        Self {
            restricted_to: Some(caller.into()),
            ttl: Some(ttl),
            privacy,
        }
    }
}

/// A successful lookup
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry_id: Uuid,
    pub similarity: f32,
    pub canonical_query: String,
    pub payload: AnalyticsPayload,
    pub quality: f32,
    pub hit_count: u64,
    pub privacy: Option<PrivacyMarker>,
}

/// An entry dropped by the consistency check
#[derive(Debug, Clone)]
pub struct CorruptionReport {
    pub entry_id: Uuid,
    pub reason: String,
}

/// Result of a lookup, including any entries dropped along the way
#[derive(Debug, Clone, Default)]
pub struct LookupOutcome {
    pub hit: Option<CacheHit>,
    pub corrupted: Vec<CorruptionReport>,
}

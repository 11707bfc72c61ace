//! Semantic response cache
//!
//! Entries are matched by cosine similarity of query embeddings rather
//! than exact text. All access goes through one lock so that lookups,
//! inserts and evictions observe a consistent entry set.

use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::types::AnalyticsPayload;
use crate::embeddings::{cosine_similarity, FeatureEmbedder};
use crate::privacy::PrivacyMarker;

use super::bootstrap::CacheSeed;
use super::config::CacheConfig;
use super::entry::{CacheEntry, CacheHit, CorruptionReport, InsertOptions, LookupOutcome};
use super::error::{CacheError, CacheResult};

/// Semantic cache over fixed-dimension embeddings
pub struct SemanticCache {
    config: CacheConfig,
    
    /// Embedding dimension shared by every entry
    dimension: usize,
    
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Uuid, CacheEntry>,
    stats: CacheStatsInternal,
}

#[derive(Default)]
struct CacheStatsInternal {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    corruptions: u64,
}

/// Public cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    
    /// Number of cache misses
    pub misses: u64,
    
    /// Entries removed to make room
    pub evictions: u64,
    
    /// Entries removed after their forced expiry
    pub expirations: u64,
    
    /// Entries dropped by the consistency check
    pub corruptions: u64,
    
    /// Current entry count
    pub entry_count: usize,
    
    /// Maximum entries
    pub capacity: usize,
    
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl SemanticCache {
    pub fn new(config: CacheConfig, dimension: usize) -> Self {
        Self {
            config,
            dimension,
            state: RwLock::new(CacheState::default()),
        }
    }
    
    pub fn dimension(&self) -> usize {
        self.dimension
    }
    
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    
    /// Find the most similar visible entry at or above the threshold.
    ///
    /// Expired entries are purged and inconsistent ones dropped along the
    /// way; both are reported as misses when they would have matched.
    pub async fn lookup(&self, embedding: &[f32], caller: Option<&str>) -> LookupOutcome {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let mut outcome = LookupOutcome::default();
        
        if embedding.len() != self.dimension {
            tracing::warn!(
                expected = self.dimension,
                actual = embedding.len(),
                "Lookup embedding has wrong dimension"
            );
            state.stats.misses += 1;
            return outcome;
        }
        
        let expired: Vec<Uuid> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.id)
            .collect();
        for id in &expired {
            state.entries.remove(id);
        }
        state.stats.expirations += expired.len() as u64;
        
        let mut best: Option<(Uuid, f32)> = None;
        for entry in state.entries.values() {
            if let Err(reason) = entry.validate(self.dimension) {
                outcome.corrupted.push(CorruptionReport {
                    entry_id: entry.id,
                    reason,
                });
                continue;
            }
            if !entry.visible_to(caller) {
                continue;
            }
            let similarity = cosine_similarity(embedding, &entry.embedding);
            if similarity >= self.config.similarity_threshold
                && best.map(|(_, s)| similarity > s).unwrap_or(true)
            {
                best = Some((entry.id, similarity));
            }
        }
        
        for report in &outcome.corrupted {
            tracing::warn!(entry_id = %report.entry_id, reason = %report.reason, "Dropping corrupt cache entry");
            state.entries.remove(&report.entry_id);
        }
        state.stats.corruptions += outcome.corrupted.len() as u64;
        
        let hit = best.and_then(|(id, similarity)| {
            state.entries.get_mut(&id).map(|entry| {
                entry.last_accessed = now;
                entry.hit_count += 1;
                CacheHit {
                    entry_id: entry.id,
                    similarity,
                    canonical_query: entry.canonical_query.clone(),
                    payload: entry.payload.clone(),
                    quality: entry.quality,
                    hit_count: entry.hit_count,
                    privacy: entry.privacy.clone(),
                }
            })
        });
        
        if hit.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        outcome.hit = hit;
        outcome
    }
    
    /// Store a payload under a query embedding
    pub async fn insert(
        &self,
        canonical_query: &str,
        embedding: Vec<f32>,
        payload: AnalyticsPayload,
        quality: f32,
        options: InsertOptions,
    ) -> CacheResult<Uuid> {
        if embedding.len() != self.dimension {
            return Err(CacheError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        
        let now = Instant::now();
        let mut entry = CacheEntry::new(canonical_query, embedding, payload, quality);
        entry.restricted_to = options.restricted_to;
        entry.privacy = options.privacy;
        entry.expires_at = options
            .ttl
            .or_else(|| self.config.entry_ttl())
            .map(|ttl| now + ttl);
        entry
            .validate(self.dimension)
            .map_err(|reason| CacheError::InvalidEntry { reason })?;
        
        let mut state = self.state.write().await;
        
        let duplicate = state
            .entries
            .values()
            .find(|existing| {
                existing.restricted_to == entry.restricted_to
                    && cosine_similarity(&existing.embedding, &entry.embedding)
                        >= self.config.duplicate_similarity
            })
            .map(|existing| existing.id);
        if let Some(id) = duplicate {
            state.entries.remove(&id);
        }
        
        while state.entries.len() >= self.config.capacity {
            if !self.evict_one(&mut state, now) {
                break;
            }
        }
        
        let id = entry.id;
        state.entries.insert(id, entry);
        tracing::debug!(entry_id = %id, entries = state.entries.len(), "Cached response");
        Ok(id)
    }
    
    /// Remove one entry: expired first, then lowest retention score
    fn evict_one(&self, state: &mut CacheState, now: Instant) -> bool {
        if let Some(id) = state
            .entries
            .values()
            .find(|e| e.is_expired(now))
            .map(|e| e.id)
        {
            state.entries.remove(&id);
            state.stats.expirations += 1;
            return true;
        }
        
        let half_life = self.config.half_life();
        let max_idle = self.config.max_idle();
        let victim = state
            .entries
            .values()
            .map(|e| (e.id, e.retention_score(now, half_life, max_idle), e.last_accessed))
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.2.cmp(&b.2))
            })
            .map(|(id, _, _)| id);
        
        match victim {
            Some(id) => {
                state.entries.remove(&id);
                state.stats.evictions += 1;
                tracing::trace!(entry_id = %id, "Evicted cache entry");
                true
            }
            None => false,
        }
    }
    
    /// Swap the payload of an entry after privacy protection was applied
    pub async fn replace_payload(
        &self,
        entry_id: Uuid,
        payload: AnalyticsPayload,
        privacy: PrivacyMarker,
    ) -> bool {
        let mut state = self.state.write().await;
        match state.entries.get_mut(&entry_id) {
            Some(entry) => {
                entry.payload = payload;
                entry.privacy = Some(privacy);
                true
            }
            None => false,
        }
    }
    
    /// Pre-populate with known queries and precomputed payloads.
    ///
    /// Seeds are stored without a privacy marker; they are protected the
    /// first time they are served.
    pub async fn warm(&self, embedder: &FeatureEmbedder, seeds: Vec<CacheSeed>) -> CacheResult<usize> {
        let mut inserted = 0;
        for seed in seeds {
            let embedding = embedder
                .embed(&seed.query)
                .map_err(|e| CacheError::SeedFailed {
                    reason: format!("{}: {e}", seed.query),
                })?;
            self.insert(
                &seed.query,
                embedding,
                seed.payload,
                seed.quality,
                InsertOptions::default(),
            )
            .await?;
            inserted += 1;
        }
        tracing::info!(inserted, "Cache warmed");
        Ok(inserted)
    }
    
    pub async fn remove(&self, entry_id: Uuid) -> bool {
        self.state.write().await.entries.remove(&entry_id).is_some()
    }
    
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }
    
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
    
    /// Clear all cache entries
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
    }
    
    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let stats = &state.stats;
        
        let total = stats.hits + stats.misses;
        let hit_rate = if total > 0 {
            stats.hits as f64 / total as f64
        } else {
            0.0
        };
        
        CacheStats {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            corruptions: stats.corruptions,
            entry_count: state.entries.len(),
            capacity: self.config.capacity,
            hit_rate,
        }
    }
    
    /// Insert an entry as-is, bypassing validation
    #[cfg(test)]
    pub(crate) async fn insert_unchecked(&self, entry: CacheEntry) {
        self.state.write().await.entries.insert(entry.id, entry);
    }
}

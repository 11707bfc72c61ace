//! Tests for model selection

use super::*;
use proptest::prelude::*;
use std::time::Duration;

fn hardware(total_mb: u64, available_mb: u64, cores: usize, gpu: bool) -> HardwareProfile {
    HardwareProfile {
        total_memory_mb: total_mb,
        available_memory_mb: available_mb,
        cpu_cores: cores,
        has_gpu: gpu,
    }
}

const BALANCED: f32 = 0.5;

fn ids(profiles: &[ModelProfile]) -> Vec<&str> {
    profiles.iter().map(|p| p.id.as_str()).collect()
}

#[cfg(test)]
mod tier_tests {
    use super::*;

    #[test]
    fn test_tier_classification() {
        let cutoffs = TierCutoffs::default();
        assert_eq!(
            ModelTier::classify(&hardware(32_768, 30_000, 16, true), &cutoffs),
            ModelTier::High
        );
        // no accelerator caps a large host at Medium
        assert_eq!(
            ModelTier::classify(&hardware(32_768, 30_000, 16, false), &cutoffs),
            ModelTier::Medium
        );
        assert_eq!(
            ModelTier::classify(&hardware(8_192, 6_000, 4, false), &cutoffs),
            ModelTier::Medium
        );
        assert_eq!(
            ModelTier::classify(&hardware(8_192, 6_000, 2, false), &cutoffs),
            ModelTier::Low
        );
        assert_eq!(
            ModelTier::classify(&hardware(4_096, 3_000, 8, false), &cutoffs),
            ModelTier::Low
        );
    }

    #[test]
    fn test_candidate_lists_end_with_fallback() {
        for tier in [ModelTier::Low, ModelTier::Medium, ModelTier::High] {
            let candidates = tier.candidates();
            assert!(!candidates.is_empty());
            assert_eq!(candidates[candidates.len() - 1], TINYLLAMA);
        }
    }
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    #[test]
    fn test_high_tier_full_list() {
        let selector = ModelSelector::new(SelectorConfig::default());
        let selected = selector.select(&hardware(32_768, 30_000, 16, true), BALANCED);
        assert_eq!(ids(&selected), vec!["llama3:8b", "phi3:mini", "tinyllama"]);
    }

    #[test]
    fn test_headroom_skips_large_models() {
        let selector = ModelSelector::new(SelectorConfig::default());
        // 4 GB free minus 1 GB reserve cannot hold llama3 (4.7 GB)
        let selected = selector.select(&hardware(32_768, 4_096, 16, true), BALANCED);
        assert_eq!(ids(&selected), vec!["phi3:mini", "tinyllama"]);
    }

    #[test]
    fn test_fallback_kept_without_headroom() {
        let selector = ModelSelector::new(SelectorConfig::default());
        let selected = selector.select(&hardware(16_384, 100, 8, false), BALANCED);
        assert_eq!(ids(&selected), vec!["tinyllama"]);
    }

    #[test]
    fn test_unreliable_model_skipped_during_cooldown() {
        let selector = ModelSelector::new(SelectorConfig::default());
        let host = hardware(16_384, 12_000, 8, false);
        for _ in 0..3 {
            selector.record_outcome("phi3:mini", Duration::from_secs(1), false);
        }
        for _ in 0..100 {
            assert_eq!(ids(&selector.select(&host, BALANCED)), vec!["tinyllama"]);
        }
        assert!(!selector.usage()[0].reliable);
    }

    #[test]
    fn test_unreliable_model_offered_after_cooldown() {
        let config = SelectorConfig {
            unreliable_cooldown_ms: 20,
            ..Default::default()
        };
        let selector = ModelSelector::new(config);
        let host = hardware(16_384, 12_000, 8, false);
        for _ in 0..3 {
            selector.record_outcome("phi3:mini", Duration::from_secs(1), false);
        }
        assert_eq!(ids(&selector.select(&host, BALANCED)), vec!["tinyllama"]);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ids(&selector.select(&host, BALANCED)), vec!["phi3:mini", "tinyllama"]);

        // another failure restarts the cooldown
        selector.record_outcome("phi3:mini", Duration::from_secs(1), false);
        assert_eq!(ids(&selector.select(&host, BALANCED)), vec!["tinyllama"]);
    }

    #[test]
    fn test_simple_queries_try_smaller_models_first() {
        let selector = ModelSelector::new(SelectorConfig::default());
        let host = hardware(32_768, 30_000, 16, true);
        assert_eq!(
            ids(&selector.select(&host, 0.1)),
            vec!["phi3:mini", "llama3:8b", "tinyllama"]
        );
        assert_eq!(
            ids(&selector.select(&host, 0.9)),
            vec!["llama3:8b", "phi3:mini", "tinyllama"]
        );
    }

    #[test]
    fn test_latency_ewma() {
        let selector = ModelSelector::new(SelectorConfig::default());
        selector.record_outcome("tinyllama", Duration::from_millis(1_000), true);
        selector.record_outcome("tinyllama", Duration::from_millis(2_000), true);
        let selected = selector.select(&hardware(2_048, 1_500, 2, false), BALANCED);
        // 0.2 * 2000 + 0.8 * 1000
        assert!((selected[0].avg_latency_ms - 1_200.0).abs() < 1e-6);

        let usage = selector.usage();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].successes, 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Selection is never empty and always ends with the fallback.
        #[test]
        fn prop_selection_never_empty(
            total in 512u64..65_536,
            available in 0u64..65_536,
            cores in 1usize..64,
            gpu in any::<bool>(),
            complexity in 0.0f32..1.0,
        ) {
            let selector = ModelSelector::new(SelectorConfig::default());
            let selected = selector.select(&hardware(total, available.min(total), cores, gpu), complexity);
            prop_assert!(!selected.is_empty());
            prop_assert_eq!(selected[selected.len() - 1].id.as_str(), TINYLLAMA.id);
        }
    }
}

#[cfg(test)]
mod residency_tests {
    use super::*;

    fn profile(spec: &ModelSpec) -> ModelProfile {
        ModelProfile::from_spec(spec)
    }

    #[tokio::test]
    async fn test_lease_refcount() {
        let tracker = ResidencyTracker::new(8_192);
        let a = tracker.acquire(&profile(&PHI3_MINI)).await.unwrap();
        let b = tracker.acquire(&profile(&PHI3_MINI)).await.unwrap();
        assert_eq!(tracker.status().active_leases, 2);
        assert_eq!(tracker.use_count("phi3:mini"), 2);
        drop(a);
        drop(b);
        let status = tracker.status();
        assert_eq!(status.active_leases, 0);
        assert_eq!(status.resident, vec!["phi3:mini".to_string()]);
    }

    #[tokio::test]
    async fn test_idle_models_evicted_for_budget() {
        let tracker = ResidencyTracker::new(3_000);
        drop(tracker.acquire(&profile(&PHI3_MINI)).await.unwrap());
        let lease = tracker.acquire(&profile(&TINYLLAMA)).await.unwrap();
        assert_eq!(lease.model_id(), "tinyllama");
        // 2300 + 640 fits in 3000
        assert_eq!(tracker.status().resident.len(), 2);

        drop(lease);
        let mut big = profile(&PHI3_MINI);
        big.id = "other".to_string();
        big.memory_mb = 2_900;
        let _held = tracker.acquire(&big).await.unwrap();
        assert_eq!(tracker.status().resident, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_busy_models_not_evicted() {
        let tracker = ResidencyTracker::new(2_500);
        let _held = tracker.acquire(&profile(&PHI3_MINI)).await.unwrap();
        let result = tracker.acquire(&profile(&TINYLLAMA)).await;
        assert!(matches!(result, Err(ResidencyError::InsufficientMemory { .. })));
    }

    #[tokio::test]
    async fn test_single_large_model_slot() {
        let tracker = ResidencyTracker::new(64_000);
        let first = tracker.acquire(&profile(&LLAMA3_8B)).await.unwrap();

        let mut other_large = profile(&LLAMA3_8B);
        other_large.id = "mixtral".to_string();
        let waiting = tokio::time::timeout(
            Duration::from_millis(50),
            tracker.acquire(&other_large),
        )
        .await;
        assert!(waiting.is_err(), "second large lease must wait");

        drop(first);
        let second = tracker.acquire(&other_large).await.unwrap();
        assert_eq!(second.model_id(), "mixtral");
        assert_eq!(tracker.large_resident_count(), 1);
    }
}

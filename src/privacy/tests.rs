//! Tests for the privacy guard

use super::*;
use crate::core::types::AnalyticsPayload;
use proptest::prelude::*;

fn guard_with_total(total: f64) -> PrivacyGuard {
    let config = PrivacyConfig {
        total_epsilon: total,
        ..Default::default()
    };
    PrivacyGuard::with_seed(config, 42).unwrap()
}

#[cfg(test)]
mod budget_tests {
    use super::*;

    #[test]
    fn test_five_quarter_requests_on_unit_budget() {
        let guard = guard_with_total(1.0);
        for _ in 0..4 {
            guard.protect_with(100.0, 1.0, 0.25).unwrap();
        }
        let fifth = guard.protect_with(100.0, 1.0, 0.25);
        assert!(matches!(fifth, Err(PrivacyError::BudgetExhausted { .. })));

        let snapshot = guard.snapshot();
        assert!((snapshot.consumed_epsilon - 1.0).abs() < 1e-12);
        assert_eq!(snapshot.operations, 4);
        assert!(snapshot.is_exhausted);
    }

    #[test]
    fn test_rejection_leaves_budget_unchanged() {
        let guard = guard_with_total(0.3);
        guard.protect_with(1.0, 1.0, 0.2).unwrap();
        let before = guard.snapshot();
        assert!(guard.protect_with(1.0, 1.0, 0.2).is_err());
        let after = guard.snapshot();
        assert_eq!(before.consumed_epsilon, after.consumed_epsilon);
        assert_eq!(guard.ledger().len(), 1);
        // a smaller request still fits
        assert!(guard.can_afford(0.1));
    }

    #[test]
    fn test_refresh_starts_new_epoch() {
        let guard = guard_with_total(0.1);
        guard.protect(5.0, 1.0).unwrap();
        assert!(guard.protect(5.0, 1.0).is_err());

        let snapshot = guard.refresh(Some(0.5)).unwrap();
        assert_eq!(snapshot.epoch, 1);
        assert_eq!(snapshot.consumed_epsilon, 0.0);
        assert_eq!(snapshot.total_epsilon, 0.5);
        assert_eq!(snapshot.operations, 0);

        let value = guard.protect(5.0, 1.0).unwrap();
        assert_eq!(value.epoch, 1);
        // ledger keeps earlier epochs
        assert_eq!(guard.ledger().len(), 2);
    }

    #[test]
    fn test_refresh_rejects_invalid_total() {
        let guard = guard_with_total(1.0);
        assert!(guard.refresh(Some(-1.0)).is_err());
        assert_eq!(guard.snapshot().epoch, 0);
    }

    #[test]
    fn test_low_budget_flag() {
        let guard = guard_with_total(1.0);
        guard.protect_with(1.0, 1.0, 0.95).unwrap();
        let snapshot = guard.snapshot();
        assert!(snapshot.is_low);
        assert!(!snapshot.is_exhausted);
        assert!(snapshot.remaining_fraction() < 0.1);
    }

    #[test]
    fn test_invalid_parameters() {
        let guard = guard_with_total(1.0);
        assert!(matches!(
            guard.protect_with(f64::NAN, 1.0, 0.1),
            Err(PrivacyError::InvalidParameter { .. })
        ));
        assert!(guard.protect_with(1.0, 0.0, 0.1).is_err());
        assert!(guard.protect_with(1.0, 1.0, -0.1).is_err());
        assert_eq!(guard.snapshot().operations, 0);
        assert!(PrivacyBudget::new(1.0, 0.0).is_err());
    }
}

#[cfg(test)]
mod mechanism_tests {
    use super::*;

    #[test]
    fn test_seeded_guard_is_reproducible() {
        let a = guard_with_total(1.0).protect(10.0, 1.0).unwrap();
        let b = guard_with_total(1.0).protect(10.0, 1.0).unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.mechanism, NoiseMechanism::Laplace);
        assert!((a.epsilon_spent - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_protect_many_charges_once() {
        let guard = guard_with_total(1.0);
        let batch = guard.protect_many(&[1.0, 2.0, 3.0], 0.5, 0.3).unwrap();
        assert_eq!(batch.values.len(), 3);
        assert_eq!(batch.mechanism, NoiseMechanism::Gaussian);

        let snapshot = guard.snapshot();
        assert!((snapshot.consumed_epsilon - 0.3).abs() < 1e-12);
        assert_eq!(snapshot.operations, 1);
        assert_eq!(snapshot.mechanism_usage.get("gaussian"), Some(&1));
    }

    #[test]
    fn test_ledger_records_composed_delta() {
        let guard = guard_with_total(1.0);
        guard.protect(5.0, 1.0).unwrap();
        guard.protect_many(&[1.0, 2.0, 3.0, 4.0], 1.0, 0.2).unwrap();

        let ledger = guard.ledger();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].delta, 0.0);
        assert_eq!(ledger[1].delta, guard.snapshot().delta);
        assert_eq!(ledger[1].value_count, 4);
    }

    #[test]
    fn test_protect_many_splits_delta_across_values() {
        // per-value σ uses ε/k and δ/k, so it is wider than the ε/k, δ calibration
        let split = gaussian_sigma(1.0, 0.2 / 4.0, 1e-5 / 4.0);
        let shared = gaussian_sigma(1.0, 0.2 / 4.0, 1e-5);
        assert!(split > shared);

        let guard = guard_with_total(1.0);
        let values = vec![0.0; 2_000];
        let batch = guard.protect_many(&values, 1.0, 0.2).unwrap();
        let sigma = gaussian_sigma(1.0, 0.2 / 2_000.0, guard.snapshot().delta / 2_000.0);
        let observed = (batch.values.iter().map(|v| v * v).sum::<f64>() / 2_000.0).sqrt();
        assert!((observed / sigma - 1.0).abs() < 0.1, "observed {observed}, expected {sigma}");
    }

    #[test]
    fn test_protect_many_rejects_empty() {
        let guard = guard_with_total(1.0);
        assert!(guard.protect_many(&[], 1.0, 0.1).is_err());
    }

    #[test]
    fn test_levels() {
        assert_eq!(PrivacyLevel::Minimal.epsilon(), 0.01);
        assert_eq!(PrivacyLevel::Standard.epsilon(), 0.1);
        assert_eq!(PrivacyLevel::High.epsilon(), 0.5);
    }
}

#[cfg(test)]
mod payload_tests {
    use super::*;

    #[test]
    fn test_payload_without_metrics_is_free() {
        let guard = guard_with_total(1.0);
        let payload = AnalyticsPayload::new("No numeric results");
        let (protected, marker) = guard.protect_payload(&payload).unwrap();
        assert_eq!(protected, payload);
        assert_eq!(marker.epsilon_spent, 0.0);
        assert_eq!(marker.mechanism, None);
        assert_eq!(guard.snapshot().operations, 0);
    }

    #[test]
    fn test_single_metric_uses_laplace() {
        let guard = guard_with_total(1.0);
        let payload = AnalyticsPayload::new("margin").with_metric("profit_margin", 0.25);
        let (protected, marker) = guard.protect_payload(&payload).unwrap();
        assert_eq!(marker.mechanism, Some(NoiseMechanism::Laplace));
        assert_ne!(protected.metrics["profit_margin"], 0.25);
        assert_eq!(protected.answer, payload.answer);
    }

    #[test]
    fn test_multiple_metrics_use_gaussian() {
        let guard = guard_with_total(1.0);
        let payload = AnalyticsPayload::new("summary")
            .with_metric("revenue", 120_000.0)
            .with_metric("costs", 90_000.0);
        let (protected, marker) = guard.protect_payload(&payload).unwrap();
        assert_eq!(marker.mechanism, Some(NoiseMechanism::Gaussian));
        assert_eq!(protected.metrics.len(), 2);
        assert!((marker.epsilon_spent - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_payload_rejected_when_exhausted() {
        let guard = guard_with_total(0.05);
        let payload = AnalyticsPayload::new("margin").with_metric("profit_margin", 0.25);
        assert!(matches!(
            guard.protect_payload(&payload),
            Err(PrivacyError::BudgetExhausted { .. })
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Consumed ε never decreases and never exceeds the total.
    #[test]
    fn prop_budget_monotone_and_bounded(
        total in 0.1f64..5.0,
        requests in prop::collection::vec(0.01f64..1.0, 1..40),
    ) {
        let mut budget = PrivacyBudget::new(total, 1e-5).unwrap();
        let mut previous = 0.0;
        for epsilon in requests {
            let fits = budget.consumed() + epsilon <= total + 1e-9;
            let result = budget.try_spend(epsilon, NoiseMechanism::Laplace, 1.0, 1);
            prop_assert_eq!(result.is_ok(), fits);
            prop_assert!(budget.consumed() >= previous);
            prop_assert!(budget.consumed() <= total);
            previous = budget.consumed();
        }
    }
}

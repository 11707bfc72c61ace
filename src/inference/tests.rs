//! Tests for inference types and collaborators

use super::*;
use crate::core::types::{AnalyticsPayload, ComputationPath};
use uuid::Uuid;

#[test]
fn test_raw_result_builder() {
    let id = Uuid::now_v7();
    let result = RawResult::direct(id, AnalyticsPayload::new("ok"), "phi3:mini")
        .with_latency_ms(120)
        .with_model_confidence(1.4)
        .with_path(ComputationPath::Degraded);

    assert_eq!(result.query_id, id);
    assert_eq!(result.model_id, "phi3:mini");
    assert_eq!(result.latency_ms, 120);
    assert_eq!(result.model_confidence, Some(1.0));
    assert_eq!(result.path, ComputationPath::Degraded);
}

#[test]
fn test_complete_snapshot_quality() {
    let snapshot = DataSnapshot::new(12, 340, 900, 45)
        .with_invoice_total(50_000.0)
        .with_summary(TOTAL_REVENUE_KEY, 48_000.0);

    assert!(snapshot.missing_datasets().is_empty());
    assert_eq!(snapshot.completeness(), 1.0);
    assert!(!snapshot.revenue_inconsistent());
    assert_eq!(snapshot.data_quality(), 1.0);
}

#[test]
fn test_missing_datasets_lower_quality() {
    let snapshot = DataSnapshot::new(12, 0, 900, 0);

    assert_eq!(snapshot.missing_datasets(), vec!["invoices", "licenses"]);
    assert_eq!(snapshot.completeness(), 0.5);
    assert!((snapshot.data_quality() - 0.6).abs() < 1e-6);
}

#[test]
fn test_revenue_inconsistency_penalized() {
    let snapshot = DataSnapshot::new(1, 1, 1, 1)
        .with_invoice_total(10_000.0)
        .with_summary(TOTAL_REVENUE_KEY, 5_000.0);

    assert!(snapshot.revenue_inconsistent());
    assert!((snapshot.data_quality() - 0.8).abs() < 1e-6);
}

#[test]
fn test_empty_snapshot() {
    let snapshot = DataSnapshot::default();
    assert_eq!(snapshot.completeness(), 0.0);
    assert!((snapshot.data_quality() - 0.2).abs() < 1e-6);
}

#[test]
fn test_retryable_classification() {
    assert!(InferenceError::Timeout { timeout_ms: 10 }.is_retryable());
    assert!(InferenceError::ComputationFailed { reason: "x".into() }.is_retryable());
    assert!(!InferenceError::ModelUnavailable { reason: "x".into() }.is_retryable());
    assert!(!InferenceError::InvalidRequest { reason: "x".into() }.is_retryable());
}

#[tokio::test]
async fn test_static_tabular_source_update() {
    let source = StaticTabularSource::new(DataSnapshot::new(1, 2, 3, 4));
    assert_eq!(source.snapshot().await.unwrap().invoices, 2);

    source.update(DataSnapshot::new(5, 6, 7, 8));
    assert_eq!(source.snapshot().await.unwrap().clients, 5);
}

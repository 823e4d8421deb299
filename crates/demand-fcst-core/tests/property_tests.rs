//! Property-based tests for the forecasting pipeline and recommendation rules.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated demand histories and inventory snapshots.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use demand_fcst_core::{
    generate_forecast, generate_recommendations, ForecastPolicy, ForecastRequest,
    InventorySnapshot, RawRecord, RecommendationPolicy, RecommendationType,
};
use proptest::prelude::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

/// Daily records starting on 2025-01-01.
fn make_records(values: &[f64]) -> Vec<RawRecord> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let date = start + Duration::days(i as i64);
            RawRecord::new(date.to_string(), *v)
        })
        .collect()
}

/// Strategy for non-negative daily demand.
fn demand_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| prop::collection::vec(0.0..500.0_f64, len))
}

/// Strategy for inventory snapshots.
fn snapshot_strategy() -> impl Strategy<Value = InventorySnapshot> {
    (
        0.0..200.0_f64,
        0.0..50.0_f64,
        0.0..10.0_f64,
        0.0..120.0_f64,
        0.5..100.0_f64,
    )
        .prop_map(|(stock, threshold, demand, last_order, price)| InventorySnapshot {
            min_threshold: threshold,
            avg_daily_demand: demand,
            last_order_days_ago: last_order,
            unit_price: price,
            ..InventorySnapshot::new("p", stock)
        })
}

// =============================================================================
// Property: Short histories are rejected
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn short_history_is_rejected(values in demand_strategy(1, 7)) {
        let request = ForecastRequest::new("p", "Product", make_records(&values));
        let err = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap_err();
        prop_assert!(err.is_data_validation());
    }
}

// =============================================================================
// Property: Forecast output stays inside its documented ranges
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    #[test]
    fn forecast_ranges_hold(
        values in demand_strategy(7, 60),
        horizon in 1usize..45
    ) {
        let request = ForecastRequest::new("p", "Product", make_records(&values))
            .with_forecast_days(horizon);
        let result = generate_forecast(&request, today(), &ForecastPolicy::default());
        prop_assert!(result.is_ok(), "forecast failed: {:?}", result.err());
        let result = result.unwrap();

        prop_assert_eq!(result.forecast_data.len(), horizon);
        prop_assert!(result.recommended_quantity >= 1);
        prop_assert!((0.0..=100.0).contains(&result.accuracy));
        for point in &result.forecast_data {
            prop_assert!((0.6..=1.0).contains(&point.confidence));
        }
        prop_assert!(result.confidence_metrics.data_quality <= 1.0);
        prop_assert!(result.next_order_date <= today() + Duration::days(14));
    }

    #[test]
    fn short_history_accuracy_is_default(values in demand_strategy(7, 14)) {
        let request = ForecastRequest::new("p", "Product", make_records(&values))
            .with_forecast_days(7);
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();
        prop_assert_eq!(result.accuracy, 85.0);
        prop_assert!(!result.accuracy_measured);
    }
}

// =============================================================================
// Property: Recommendation rules
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn reorder_and_optimize_are_exclusive(snapshot in snapshot_strategy()) {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let policy = RecommendationPolicy::default();
        let recs = generate_recommendations(std::slice::from_ref(&snapshot), now, &policy);

        let has = |kind| recs.iter().any(|r| r.kind == kind);
        prop_assert!(!(has(RecommendationType::Reorder) && has(RecommendationType::Optimize)));
        prop_assert_eq!(
            has(RecommendationType::Reorder),
            snapshot.current_stock <= snapshot.min_threshold
        );
        prop_assert_eq!(
            has(RecommendationType::Promotion),
            snapshot.avg_daily_demand < 0.5 && snapshot.last_order_days_ago > 60.0
        );
        prop_assert!(recs.len() <= 2);

        // Promotion, when present, always comes last
        if let Some(pos) = recs.iter().position(|r| r.kind == RecommendationType::Promotion) {
            prop_assert_eq!(pos, recs.len() - 1);
        }
        for r in &recs {
            prop_assert!(r.estimated_savings >= 0);
            prop_assert!(r.days_until_action.map_or(true, |d| d >= 1));
        }
    }
}

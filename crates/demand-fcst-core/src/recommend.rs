//! Inventory recommendations from per-product stock snapshots.
//!
//! Each snapshot is evaluated on its own against three rules:
//!
//! | Rule      | Condition                                   | Priority       |
//! |-----------|---------------------------------------------|----------------|
//! | Reorder   | stock ≤ threshold                           | high / medium  |
//! | Optimize  | stock > 3 × threshold (only without reorder)| low            |
//! | Promotion | demand < 0.5/day and last order > 60 days   | low            |
//!
//! Promotion is independent of the other two, so a snapshot yields zero,
//! one or two recommendations. Output keeps snapshot order; there is no
//! ranking across products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::RecommendationPolicy;

fn default_min_threshold() -> f64 {
    10.0
}

fn default_avg_daily_demand() -> f64 {
    1.0
}

fn default_last_order_days_ago() -> f64 {
    30.0
}

fn default_unit_price() -> f64 {
    10.0
}

/// Current inventory metrics of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default, alias = "product_sku")]
    pub sku: String,
    #[serde(default)]
    pub current_stock: f64,
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_avg_daily_demand")]
    pub avg_daily_demand: f64,
    #[serde(default = "default_last_order_days_ago")]
    pub last_order_days_ago: f64,
    #[serde(default = "default_unit_price", alias = "price")]
    pub unit_price: f64,
}

impl InventorySnapshot {
    /// Snapshot with the default threshold, demand, order age and price.
    pub fn new(product_id: impl Into<String>, current_stock: f64) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: String::new(),
            sku: String::new(),
            current_stock,
            min_threshold: default_min_threshold(),
            avg_daily_demand: default_avg_daily_demand(),
            last_order_days_ago: default_last_order_days_ago(),
            unit_price: default_unit_price(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Reorder,
    Optimize,
    Promotion,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Reorder => "reorder",
            RecommendationType::Optimize => "optimize",
            RecommendationType::Promotion => "promotion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// An actionable inventory recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// `rec_<type>_<product_id>`
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub product_id: String,
    pub product_name: String,
    pub product_sku: String,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub action: String,
    pub estimated_savings: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_action: Option<i64>,
    /// Units to order, for reorder recommendations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_quantity: Option<i64>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    fn base(
        kind: RecommendationType,
        priority: Priority,
        snapshot: &InventorySnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("rec_{}_{}", kind.as_str(), snapshot.product_id),
            kind,
            priority,
            product_id: snapshot.product_id.clone(),
            product_name: snapshot.product_name.clone(),
            product_sku: snapshot.sku.clone(),
            title: String::new(),
            description: String::new(),
            impact: String::new(),
            action: String::new(),
            estimated_savings: 0,
            days_until_action: None,
            recommended_quantity: None,
            confidence: 0.0,
            created_at: now,
        }
    }
}

fn reorder(
    s: &InventorySnapshot,
    now: DateTime<Utc>,
    policy: &RecommendationPolicy,
) -> Recommendation {
    let urgent = s.current_stock <= s.min_threshold * policy.urgent_stock_fraction;
    let priority = if urgent { Priority::High } else { Priority::Medium };

    let days_until_stockout = if s.avg_daily_demand > 0.0 {
        (s.current_stock / s.avg_daily_demand).max(1.0)
    } else {
        policy.default_stockout_days
    };
    let days = days_until_stockout as i64;
    let cover = s.avg_daily_demand * policy.reorder_cover_days;
    let quantity = cover as i64;

    Recommendation {
        title: if urgent {
            "Urgent Reorder Required".to_string()
        } else {
            "Reorder Required".to_string()
        },
        description: format!(
            "Stock will run out in approximately {} days at current consumption rate.",
            days
        ),
        impact: if urgent {
            "High risk of stockout".to_string()
        } else {
            "Medium risk of stockout".to_string()
        },
        action: format!("Order {} units to maintain 2-week supply", quantity),
        estimated_savings: (cover * s.unit_price * policy.reorder_savings_rate) as i64,
        days_until_action: Some(days),
        recommended_quantity: Some(quantity),
        confidence: if urgent {
            policy.urgent_reorder_confidence
        } else {
            policy.reorder_confidence
        },
        ..Recommendation::base(RecommendationType::Reorder, priority, s, now)
    }
}

fn optimize(
    s: &InventorySnapshot,
    now: DateTime<Utc>,
    policy: &RecommendationPolicy,
) -> Recommendation {
    let carrying_cost = s.current_stock * s.unit_price * policy.monthly_carrying_rate;
    let description = if s.min_threshold > 0.0 {
        format!(
            "Current stock is {:.1}x above minimum threshold. Reduce carrying costs.",
            s.current_stock / s.min_threshold
        )
    } else {
        "Current stock is above minimum threshold. Reduce carrying costs.".to_string()
    };

    Recommendation {
        title: "Optimize Inventory Level".to_string(),
        description,
        impact: format!("Reduce carrying costs by ${:.0}/month", carrying_cost),
        action: "Reduce next order quantity by 25%".to_string(),
        estimated_savings: (carrying_cost * 12.0) as i64,
        confidence: policy.optimize_confidence,
        ..Recommendation::base(RecommendationType::Optimize, Priority::Low, s, now)
    }
}

fn promotion(
    s: &InventorySnapshot,
    now: DateTime<Utc>,
    policy: &RecommendationPolicy,
) -> Recommendation {
    Recommendation {
        title: "Promotional Opportunity".to_string(),
        description:
            "Low demand velocity detected. Consider promotional pricing to increase turnover."
                .to_string(),
        impact: "Clear slow-moving inventory".to_string(),
        action: "Apply 15-20% promotional discount".to_string(),
        estimated_savings: (s.current_stock * s.unit_price * policy.promotion_savings_rate) as i64,
        days_until_action: Some(policy.promotion_action_days),
        confidence: policy.promotion_confidence,
        ..Recommendation::base(RecommendationType::Promotion, Priority::Low, s, now)
    }
}

/// Recommendations for a single snapshot.
pub fn recommend_for(
    snapshot: &InventorySnapshot,
    now: DateTime<Utc>,
    policy: &RecommendationPolicy,
) -> Vec<Recommendation> {
    let mut out = Vec::with_capacity(2);

    if snapshot.current_stock <= snapshot.min_threshold {
        out.push(reorder(snapshot, now, policy));
    } else if snapshot.current_stock > snapshot.min_threshold * policy.overstock_multiple {
        out.push(optimize(snapshot, now, policy));
    }

    if snapshot.avg_daily_demand < policy.slow_demand_threshold
        && snapshot.last_order_days_ago > policy.stale_order_days
    {
        out.push(promotion(snapshot, now, policy));
    }

    out
}

/// Recommendations for a batch of snapshots, in snapshot order.
pub fn generate_recommendations(
    snapshots: &[InventorySnapshot],
    now: DateTime<Utc>,
    policy: &RecommendationPolicy,
) -> Vec<Recommendation> {
    let recommendations: Vec<Recommendation> = snapshots
        .iter()
        .flat_map(|s| recommend_for(s, now, policy))
        .collect();

    tracing::debug!(
        snapshots = snapshots.len(),
        recommendations = recommendations.len(),
        "generated inventory recommendations"
    );
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(stock: f64, threshold: f64, demand: f64, last_order: f64) -> InventorySnapshot {
        InventorySnapshot {
            product_name: "Widget".to_string(),
            sku: "W-1".to_string(),
            min_threshold: threshold,
            avg_daily_demand: demand,
            last_order_days_ago: last_order,
            ..InventorySnapshot::new("p1", stock)
        }
    }

    #[test]
    fn test_reorder_half_threshold_is_urgent() {
        let recs = generate_recommendations(
            &[snapshot(5.0, 10.0, 2.0, 10.0)],
            now(),
            &RecommendationPolicy::default(),
        );
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.kind, RecommendationType::Reorder);
        // 5 <= 0.5 * 10
        assert_eq!(r.priority, Priority::High);
        assert_eq!(r.title, "Urgent Reorder Required");
        assert_eq!(r.days_until_action, Some(2));
        assert_eq!(r.recommended_quantity, Some(28));
        assert_eq!(r.action, "Order 28 units to maintain 2-week supply");
        assert_eq!(
            r.description,
            "Stock will run out in approximately 2 days at current consumption rate."
        );
        // 2 * 14 * 10 * 0.1
        assert_eq!(r.estimated_savings, 28);
        assert_eq!(r.confidence, 0.9);
        assert_eq!(r.id, "rec_reorder_p1");
        assert_eq!(r.product_sku, "W-1");
        assert_eq!(r.created_at, now());
    }

    #[test]
    fn test_reorder_medium_priority() {
        let recs = recommend_for(
            &snapshot(8.0, 10.0, 2.0, 10.0),
            now(),
            &RecommendationPolicy::default(),
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert_eq!(recs[0].title, "Reorder Required");
        assert_eq!(recs[0].impact, "Medium risk of stockout");
        assert_eq!(recs[0].confidence, 0.8);
        assert_eq!(recs[0].days_until_action, Some(4));
    }

    #[test]
    fn test_reorder_days_floor_and_zero_demand() {
        let policy = RecommendationPolicy::default();
        let recs = recommend_for(&snapshot(1.0, 10.0, 5.0, 10.0), now(), &policy);
        assert_eq!(recs[0].days_until_action, Some(1));

        let recs = recommend_for(&snapshot(3.0, 10.0, 0.0, 10.0), now(), &policy);
        assert_eq!(recs[0].kind, RecommendationType::Reorder);
        assert_eq!(recs[0].days_until_action, Some(7));
        assert_eq!(recs[0].recommended_quantity, Some(0));
    }

    #[test]
    fn test_overstock_is_optimize_only() {
        let recs = recommend_for(
            &snapshot(100.0, 10.0, 2.0, 10.0),
            now(),
            &RecommendationPolicy::default(),
        );
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.kind, RecommendationType::Optimize);
        assert_eq!(r.priority, Priority::Low);
        assert_eq!(
            r.description,
            "Current stock is 10.0x above minimum threshold. Reduce carrying costs."
        );
        // 100 * 10 * 0.02 = 20 per month
        assert_eq!(r.impact, "Reduce carrying costs by $20/month");
        assert_eq!(r.estimated_savings, 240);
        assert_eq!(r.days_until_action, None);
        assert_eq!(r.confidence, 0.7);
    }

    #[test]
    fn test_between_threshold_and_overstock_is_silent() {
        let recs = recommend_for(
            &snapshot(25.0, 10.0, 2.0, 10.0),
            now(),
            &RecommendationPolicy::default(),
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn test_slow_mover_gets_promotion() {
        let policy = RecommendationPolicy::default();
        let recs = recommend_for(&snapshot(20.0, 10.0, 0.2, 90.0), now(), &policy);
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.kind, RecommendationType::Promotion);
        assert_eq!(r.title, "Promotional Opportunity");
        assert_eq!(r.days_until_action, Some(30));
        assert_eq!(r.confidence, 0.65);
        // 20 * 10 * 0.1
        assert_eq!(r.estimated_savings, 20);

        // Promotion fires alongside optimize
        let recs = recommend_for(&snapshot(50.0, 10.0, 0.2, 90.0), now(), &policy);
        let kinds: Vec<_> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecommendationType::Optimize, RecommendationType::Promotion]
        );

        // And alongside reorder
        let recs = recommend_for(&snapshot(2.0, 10.0, 0.1, 61.0), now(), &policy);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].kind, RecommendationType::Reorder);
    }

    #[test]
    fn test_recent_order_blocks_promotion() {
        let recs = recommend_for(
            &snapshot(20.0, 10.0, 0.2, 60.0),
            now(),
            &RecommendationPolicy::default(),
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn test_zero_threshold_omits_ratio() {
        let recs = recommend_for(
            &snapshot(5.0, 0.0, 2.0, 10.0),
            now(),
            &RecommendationPolicy::default(),
        );
        assert_eq!(recs[0].kind, RecommendationType::Optimize);
        assert!(!recs[0].description.contains('x'));
    }

    #[test]
    fn test_batch_keeps_snapshot_order() {
        let mut a = snapshot(100.0, 10.0, 2.0, 10.0);
        a.product_id = "a".to_string();
        let mut b = snapshot(1.0, 10.0, 2.0, 10.0);
        b.product_id = "b".to_string();
        let recs = generate_recommendations(&[a, b], now(), &RecommendationPolicy::default());
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec_optimize_a", "rec_reorder_b"]);
    }

    #[test]
    fn test_snapshot_json_defaults_and_aliases() {
        let s: InventorySnapshot = serde_json::from_str(
            r#"{"product_id": "p7", "product_name": "Bolt", "product_sku": "B-7", "price": 4.5}"#,
        )
        .unwrap();
        assert_eq!(s.sku, "B-7");
        assert_eq!(s.unit_price, 4.5);
        assert_eq!(s.current_stock, 0.0);
        assert_eq!(s.min_threshold, 10.0);
        assert_eq!(s.avg_daily_demand, 1.0);
        assert_eq!(s.last_order_days_ago, 30.0);
    }

    #[test]
    fn test_recommendation_json_shape() {
        let recs = recommend_for(
            &snapshot(100.0, 10.0, 2.0, 10.0),
            now(),
            &RecommendationPolicy::default(),
        );
        let json = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(json["type"], "optimize");
        assert_eq!(json["priority"], "low");
        assert!(json.get("days_until_action").is_none());
        assert!(json["created_at"].as_str().unwrap().starts_with("2025-06-01T12:00:00"));
    }
}

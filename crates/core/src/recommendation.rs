//! Recommendation value objects, the priority policy table and savings
//! summaries.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::threshold_validation::{validate_non_negative, validate_unit_range};
use crate::types::{Money, Timestamp};

/// Months per year used for annualized savings.
pub const MONTHS_PER_YEAR: f64 = 12.0;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    RightsizeDown,
    RightsizeUp,
    DeleteUnusedStorage,
    ReservedCapacity,
}

impl RecommendationKind {
    /// Prefix of the deterministic recommendation id.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::RightsizeDown | Self::RightsizeUp => "rightsize",
            Self::DeleteUnusedStorage => "storage",
            Self::ReservedCapacity => "reserved_instances",
        }
    }
}

/// Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Effort and risk share the same three-level scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// One proposed optimization. Immutable once built.
///
/// `id` is derived from the resource id and kind so regenerating over the
/// same inputs yields the same ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    /// `None` for fleet-level recommendations.
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    /// Connector that reported the resource(s).
    pub provider: Option<String>,
    pub reason: String,
    pub estimated_monthly_savings: Money,
    pub confidence: f64,
    pub priority: Priority,
    pub implementation_effort: Level,
    pub risk_level: Level,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment_period: Option<String>,
    /// Upsizes carry a cost delta instead of savings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_increase_percent: Option<f64>,
}

impl Recommendation {
    pub fn annual_savings(&self) -> Money {
        self.estimated_monthly_savings * MONTHS_PER_YEAR
    }
}

/// Deterministic id for a per-resource recommendation.
pub fn resource_recommendation_id(kind: RecommendationKind, resource_id: &str) -> String {
    format!("{}_{resource_id}", kind.id_prefix())
}

// ---------------------------------------------------------------------------
// Priority policy
// ---------------------------------------------------------------------------

/// Minimum savings and confidence for one priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierRule {
    pub priority: Priority,
    pub min_monthly_savings: Money,
    pub min_confidence: f64,
}

/// Declared tier table used to classify and audit recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityPolicy {
    /// Highest tier first.
    rules: Vec<TierRule>,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                TierRule {
                    priority: Priority::High,
                    min_monthly_savings: 10_000.0,
                    min_confidence: 0.90,
                },
                TierRule {
                    priority: Priority::Medium,
                    min_monthly_savings: 5_000.0,
                    min_confidence: 0.70,
                },
                TierRule {
                    priority: Priority::Low,
                    min_monthly_savings: 1_000.0,
                    min_confidence: 0.50,
                },
            ],
        }
    }
}

impl PriorityPolicy {
    /// Build a policy; rules are sorted highest tier first.
    pub fn new(mut rules: Vec<TierRule>) -> Result<Self, CoreError> {
        for rule in &rules {
            validate_non_negative(rule.min_monthly_savings, "min_monthly_savings")?;
            validate_unit_range(rule.min_confidence, "min_confidence")?;
        }
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TierRule] {
        &self.rules
    }

    /// Highest tier whose savings and confidence minimums are both met.
    pub fn classify(&self, monthly_savings: Money, confidence: f64) -> Option<Priority> {
        self.rules
            .iter()
            .find(|r| monthly_savings >= r.min_monthly_savings && confidence >= r.min_confidence)
            .map(|r| r.priority)
    }

    /// Whether the declared priority is backed by the policy table.
    pub fn is_consistent(&self, rec: &Recommendation) -> bool {
        self.classify(rec.estimated_monthly_savings, rec.confidence)
            .is_some_and(|tier| tier >= rec.priority)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Aggregate savings over a set of recommendations. Recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsSummary {
    pub total_recommendations: usize,
    pub estimated_monthly_savings: Money,
    pub estimated_annual_savings: Money,
    pub priority_breakdown: PriorityBreakdown,
    pub currency: String,
    pub generated_at: Timestamp,
}

/// Sum savings and count priorities. Pure aggregation.
pub fn summarize(recommendations: &[Recommendation], currency: &str) -> SavingsSummary {
    let monthly: Money = recommendations
        .iter()
        .map(|r| r.estimated_monthly_savings)
        .sum();

    let mut breakdown = PriorityBreakdown::default();
    for rec in recommendations {
        match rec.priority {
            Priority::High => breakdown.high += 1,
            Priority::Medium => breakdown.medium += 1,
            Priority::Low => breakdown.low += 1,
        }
    }

    SavingsSummary {
        total_recommendations: recommendations.len(),
        estimated_monthly_savings: monthly,
        estimated_annual_savings: monthly * MONTHS_PER_YEAR,
        priority_breakdown: breakdown,
        currency: currency.to_string(),
        generated_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(savings: f64, confidence: f64, priority: Priority) -> Recommendation {
        Recommendation {
            id: resource_recommendation_id(RecommendationKind::RightsizeDown, "i-1"),
            kind: RecommendationKind::RightsizeDown,
            resource_id: Some("i-1".into()),
            resource_type: Some("compute".into()),
            provider: None,
            reason: "test".into(),
            estimated_monthly_savings: savings,
            confidence,
            priority,
            implementation_effort: Level::Low,
            risk_level: Level::Low,
            created_at: chrono::Utc::now(),
            current_instance_type: None,
            recommended_instance_type: None,
            resource_count: None,
            commitment_period: None,
            estimated_cost_increase_percent: None,
        }
    }

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(
            resource_recommendation_id(RecommendationKind::DeleteUnusedStorage, "vol-9"),
            "storage_vol-9"
        );
        assert_eq!(
            resource_recommendation_id(RecommendationKind::RightsizeUp, "i-2"),
            "rightsize_i-2"
        );
    }

    #[test]
    fn classify_tier_boundaries() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify(10_000.0, 0.90), Some(Priority::High));
        assert_eq!(policy.classify(10_000.0, 0.89), Some(Priority::Medium));
        assert_eq!(policy.classify(5_000.0, 0.70), Some(Priority::Medium));
        assert_eq!(policy.classify(4_999.0, 0.99), Some(Priority::Low));
        assert_eq!(policy.classify(1_000.0, 0.50), Some(Priority::Low));
        assert_eq!(policy.classify(999.0, 1.0), None);
        assert_eq!(policy.classify(50_000.0, 0.4), None);
    }

    #[test]
    fn consistency_check() {
        let policy = PriorityPolicy::default();
        assert!(policy.is_consistent(&rec(12_000.0, 0.95, Priority::High)));
        assert!(policy.is_consistent(&rec(12_000.0, 0.95, Priority::Low)));
        assert!(!policy.is_consistent(&rec(8_500.0, 0.85, Priority::High)));
        assert!(!policy.is_consistent(&rec(10.0, 0.1, Priority::Low)));
    }

    #[test]
    fn custom_policy_is_sorted_and_validated() {
        let policy = PriorityPolicy::new(vec![
            TierRule {
                priority: Priority::Low,
                min_monthly_savings: 1.0,
                min_confidence: 0.1,
            },
            TierRule {
                priority: Priority::High,
                min_monthly_savings: 100.0,
                min_confidence: 0.5,
            },
        ])
        .unwrap();
        assert_eq!(policy.rules()[0].priority, Priority::High);
        assert!(PriorityPolicy::new(vec![TierRule {
            priority: Priority::Low,
            min_monthly_savings: 1.0,
            min_confidence: 1.5,
        }])
        .is_err());
    }

    #[test]
    fn summary_of_empty_set_is_zero() {
        let s = summarize(&[], "INR");
        assert_eq!(s.total_recommendations, 0);
        assert_eq!(s.estimated_monthly_savings, 0.0);
        assert_eq!(s.estimated_annual_savings, 0.0);
        assert_eq!(s.priority_breakdown, PriorityBreakdown::default());
    }

    #[test]
    fn summary_sums_and_counts() {
        let recs = vec![
            rec(15_000.0, 0.8, Priority::Medium),
            rec(8_500.0, 0.85, Priority::High),
            rec(3_200.0, 0.95, Priority::High),
        ];
        let s = summarize(&recs, "INR");
        assert_eq!(s.total_recommendations, 3);
        assert_eq!(s.estimated_monthly_savings, 26_700.0);
        assert_eq!(s.estimated_annual_savings, 26_700.0 * 12.0);
        assert_eq!(s.priority_breakdown.high, 2);
        assert_eq!(s.priority_breakdown.medium, 1);
        assert_eq!(s.priority_breakdown.low, 0);
        assert_eq!(s.currency, "INR");
    }

    #[test]
    fn serializes_kind_as_type() {
        let json = serde_json::to_value(rec(1.0, 0.5, Priority::Low)).unwrap();
        assert_eq!(json["type"], "rightsize_down");
        assert_eq!(json["priority"], "low");
        assert!(json.get("commitment_period").is_none());
    }
}

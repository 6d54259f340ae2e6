//! Rightsizing advisor: turns one resource's CPU statistics into at most one
//! downsize or upsize action.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. `average < low_cpu` and `maximum < max_cpu_ceiling` -> downsize.
//! 2. `average > high_cpu` -> upsize.

use serde::Serialize;

use crate::error::CoreError;
use crate::instance_sizing::{larger_instance_type, smaller_instance_type};
use crate::recommendation::{
    resource_recommendation_id, Level, Priority, Recommendation, RecommendationKind,
};
use crate::resource::ResourceRecord;
use crate::threshold_validation::{validate_non_negative, validate_percent, validate_unit_range};
use crate::types::Money;
use crate::utilization::{score, UtilizationMetrics, UtilizationScore};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Average CPU below which a resource is considered idle.
pub const DEFAULT_LOW_CPU: f64 = 20.0;
/// Average CPU above which a resource is considered saturated.
pub const DEFAULT_HIGH_CPU: f64 = 80.0;
/// Peak CPU that must not be reached for a downsize to be safe.
pub const DEFAULT_MAX_CPU_CEILING: f64 = 50.0;
/// Share of current spend a downsize is expected to save.
pub const DEFAULT_DOWNSIZE_SAVINGS_PERCENT: f64 = 30.0;
/// Expected cost increase of an upsize.
pub const DEFAULT_UPSIZE_COST_INCREASE_PERCENT: f64 = 20.0;
/// Confidence attached to downsize actions.
pub const DEFAULT_DOWNSIZE_CONFIDENCE: f64 = 0.85;
/// Confidence attached to upsize actions.
pub const DEFAULT_UPSIZE_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RightsizingThresholds {
    pub low_cpu: f64,
    pub high_cpu: f64,
    pub max_cpu_ceiling: f64,
    pub downsize_savings_percent: f64,
    pub upsize_cost_increase_percent: f64,
    pub downsize_confidence: f64,
    pub upsize_confidence: f64,
}

impl Default for RightsizingThresholds {
    fn default() -> Self {
        Self {
            low_cpu: DEFAULT_LOW_CPU,
            high_cpu: DEFAULT_HIGH_CPU,
            max_cpu_ceiling: DEFAULT_MAX_CPU_CEILING,
            downsize_savings_percent: DEFAULT_DOWNSIZE_SAVINGS_PERCENT,
            upsize_cost_increase_percent: DEFAULT_UPSIZE_COST_INCREASE_PERCENT,
            downsize_confidence: DEFAULT_DOWNSIZE_CONFIDENCE,
            upsize_confidence: DEFAULT_UPSIZE_CONFIDENCE,
        }
    }
}

impl RightsizingThresholds {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_percent(self.low_cpu, "low_cpu")?;
        validate_percent(self.high_cpu, "high_cpu")?;
        validate_percent(self.max_cpu_ceiling, "max_cpu_ceiling")?;
        validate_percent(self.downsize_savings_percent, "downsize_savings_percent")?;
        validate_non_negative(
            self.upsize_cost_increase_percent,
            "upsize_cost_increase_percent",
        )?;
        validate_unit_range(self.downsize_confidence, "downsize_confidence")?;
        validate_unit_range(self.upsize_confidence, "upsize_confidence")?;
        if self.low_cpu >= self.high_cpu {
            return Err(CoreError::Configuration(format!(
                "low_cpu ({}) must be below high_cpu ({})",
                self.low_cpu, self.high_cpu
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RightsizingDirection {
    Downsize { savings_percent: f64 },
    Upsize { cost_increase_percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RightsizingAction {
    pub resource_id: String,
    #[serde(flatten)]
    pub direction: RightsizingDirection,
    pub reason: String,
    pub priority: Priority,
    pub confidence: f64,
}

impl RightsizingAction {
    pub fn is_downsize(&self) -> bool {
        matches!(self.direction, RightsizingDirection::Downsize { .. })
    }

    /// Build a recommendation for `resource`.
    ///
    /// `monthly_savings` is only used for downsizes; upsizes always report 0
    /// savings and carry the cost increase instead. Returns `None` when no
    /// target class is known for the resource's current class.
    pub fn into_recommendation(
        self,
        resource: &ResourceRecord,
        monthly_savings: Money,
    ) -> Option<Recommendation> {
        let current = resource.instance_type.clone();
        let (kind, target, savings, increase, effort) = match self.direction {
            RightsizingDirection::Downsize { .. } => (
                RecommendationKind::RightsizeDown,
                smaller_instance_type(current.as_deref()?)?,
                monthly_savings,
                None,
                Level::Low,
            ),
            RightsizingDirection::Upsize {
                cost_increase_percent,
            } => (
                RecommendationKind::RightsizeUp,
                larger_instance_type(current.as_deref()?)?,
                0.0,
                Some(cost_increase_percent),
                Level::Medium,
            ),
        };

        Some(Recommendation {
            id: resource_recommendation_id(kind, &resource.id),
            kind,
            resource_id: Some(resource.id.clone()),
            resource_type: Some(resource.kind.as_str().to_string()),
            provider: resource.provider.clone(),
            reason: self.reason,
            estimated_monthly_savings: savings,
            confidence: self.confidence,
            priority: self.priority,
            implementation_effort: effort,
            risk_level: Level::Low,
            created_at: chrono::Utc::now(),
            current_instance_type: current,
            recommended_instance_type: Some(target),
            resource_count: None,
            commitment_period: None,
            estimated_cost_increase_percent: increase,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RightsizingEvaluation {
    pub resource_id: String,
    pub utilization: UtilizationScore,
    /// Zero or one entries.
    pub actions: Vec<RightsizingAction>,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RightsizingAdvisor {
    thresholds: RightsizingThresholds,
}

impl RightsizingAdvisor {
    pub fn new(thresholds: RightsizingThresholds) -> Result<Self, CoreError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &RightsizingThresholds {
        &self.thresholds
    }

    /// Score `metrics` and decide on at most one action.
    pub fn evaluate(&self, metrics: &UtilizationMetrics) -> RightsizingEvaluation {
        let t = &self.thresholds;
        let avg = metrics.cpu_utilization.average_or_zero();
        let max = metrics.cpu_utilization.maximum_or_zero();

        let action = if avg < t.low_cpu && max < t.max_cpu_ceiling {
            Some(RightsizingAction {
                resource_id: metrics.resource_id.clone(),
                direction: RightsizingDirection::Downsize {
                    savings_percent: t.downsize_savings_percent,
                },
                reason: format!("Low CPU utilization: {avg:.1}% average, {max:.1}% peak"),
                priority: Priority::High,
                confidence: t.downsize_confidence,
            })
        } else if avg > t.high_cpu {
            Some(RightsizingAction {
                resource_id: metrics.resource_id.clone(),
                direction: RightsizingDirection::Upsize {
                    cost_increase_percent: t.upsize_cost_increase_percent,
                },
                reason: format!("High CPU utilization: {avg:.1}% average"),
                priority: Priority::Medium,
                confidence: t.upsize_confidence,
            })
        } else {
            None
        };

        RightsizingEvaluation {
            resource_id: metrics.resource_id.clone(),
            utilization: score(metrics),
            actions: action.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::resource::{ResourceKind, ResourceState};

    fn advisor() -> RightsizingAdvisor {
        RightsizingAdvisor::default()
    }

    fn instance(id: &str, class: &str) -> ResourceRecord {
        ResourceRecord {
            id: id.into(),
            kind: ResourceKind::Compute,
            state: ResourceState::Running,
            instance_type: Some(class.into()),
            attachments: vec![],
            region: None,
            created_at: None,
            tags: BTreeMap::new(),
            provider: Some("aws".into()),
        }
    }

    #[test]
    fn downsize_when_idle_and_low_peak() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 15.0, 25.0));
        assert_eq!(eval.actions.len(), 1);
        assert_matches!(
            eval.actions[0].direction,
            RightsizingDirection::Downsize { savings_percent } if savings_percent == 30.0
        );
        assert_eq!(eval.actions[0].priority, Priority::High);
        assert_eq!(eval.utilization.score, 50);
    }

    #[test]
    fn no_downsize_when_peak_reaches_ceiling() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 15.0, 50.0));
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn no_downsize_at_low_threshold() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 20.0, 30.0));
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn upsize_when_saturated() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 85.0, 99.0));
        assert_eq!(eval.actions.len(), 1);
        assert_matches!(
            eval.actions[0].direction,
            RightsizingDirection::Upsize { cost_increase_percent } if cost_increase_percent == 20.0
        );
        assert_eq!(eval.actions[0].priority, Priority::Medium);
    }

    #[test]
    fn no_upsize_at_high_threshold() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 80.0, 99.0));
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn never_more_than_one_action() {
        let a = advisor();
        let mut avg = 0.0;
        while avg <= 100.0 {
            for max in [0.0, 25.0, 49.9, 50.0, 100.0] {
                let eval = a.evaluate(&UtilizationMetrics::new("i", 30, avg, max));
                assert!(eval.actions.len() <= 1);
                let down = eval.actions.iter().any(RightsizingAction::is_downsize);
                let up = eval.actions.iter().any(|x| !x.is_downsize());
                assert_eq!(down, avg < 20.0 && max < 50.0, "avg={avg} max={max}");
                assert_eq!(up, avg > 80.0, "avg={avg} max={max}");
            }
            avg += 2.5;
        }
    }

    #[test]
    fn missing_metrics_count_as_idle() {
        let metrics = UtilizationMetrics {
            resource_id: "i-1".into(),
            period_days: 30,
            cpu_utilization: Default::default(),
        };
        let eval = advisor().evaluate(&metrics);
        assert!(eval.actions[0].is_downsize());
    }

    #[test]
    fn thresholds_are_validated() {
        let bad = RightsizingThresholds {
            low_cpu: 90.0,
            ..Default::default()
        };
        assert_matches!(RightsizingAdvisor::new(bad), Err(CoreError::Configuration(_)));

        let bad = RightsizingThresholds {
            downsize_confidence: 1.2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(RightsizingThresholds::default().validate().is_ok());
    }

    #[test]
    fn downsize_converts_to_recommendation() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 10.0, 20.0));
        let rec = eval.actions[0]
            .clone()
            .into_recommendation(&instance("i-1", "t3.large"), 8_500.0)
            .unwrap();
        assert_eq!(rec.id, "rightsize_i-1");
        assert_eq!(rec.kind, RecommendationKind::RightsizeDown);
        assert_eq!(rec.recommended_instance_type.as_deref(), Some("t3.medium"));
        assert_eq!(rec.estimated_monthly_savings, 8_500.0);
        assert_eq!(rec.confidence, 0.85);
    }

    #[test]
    fn upsize_converts_with_cost_delta() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 95.0, 100.0));
        let rec = eval.actions[0]
            .clone()
            .into_recommendation(&instance("i-1", "t3.large"), 8_500.0)
            .unwrap();
        assert_eq!(rec.kind, RecommendationKind::RightsizeUp);
        assert_eq!(rec.estimated_monthly_savings, 0.0);
        assert_eq!(rec.estimated_cost_increase_percent, Some(20.0));
        assert_eq!(rec.recommended_instance_type.as_deref(), Some("t3.xlarge"));
    }

    #[test]
    fn smallest_class_yields_no_recommendation() {
        let eval = advisor().evaluate(&UtilizationMetrics::new("i-1", 30, 10.0, 20.0));
        let rec = eval.actions[0]
            .clone()
            .into_recommendation(&instance("i-1", "t3.nano"), 8_500.0);
        assert!(rec.is_none());
    }
}

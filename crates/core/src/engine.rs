//! Recommendation engine.
//!
//! Runs three independent passes over an inventory snapshot (rightsizing,
//! storage waste, reserved capacity), concatenates their output in that
//! order and stable-sorts it by descending monthly savings. A pass that
//! fails is logged and skipped; the others still contribute.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cost::AggregateCostAnalysis;
use crate::currency::DEFAULT_CURRENCY;
use crate::error::CoreError;
use crate::recommendation::{
    resource_recommendation_id, summarize, Level, Priority, PriorityPolicy, Recommendation,
    RecommendationKind, SavingsSummary,
};
use crate::resource::ResourceRecord;
use crate::rightsizing::{RightsizingAction, RightsizingAdvisor, RightsizingDirection};
use crate::threshold_validation::{validate_non_negative, validate_unit_range};
use crate::types::Money;
use crate::utilization::FleetUtilization;

/// Hex characters of the fleet digest kept in reserved-capacity ids.
const FINGERPRINT_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-pass savings and confidence figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    pub rightsize_monthly_savings: Money,
    pub rightsize_confidence: f64,
    pub storage_monthly_savings: Money,
    pub storage_confidence: f64,
    pub reserved_monthly_savings: Money,
    pub reserved_confidence: f64,
    /// Running compute resources required before a commitment pays off.
    pub reserved_min_fleet_size: usize,
    pub reserved_commitment_period: String,
    pub currency: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rightsize_monthly_savings: 8_500.0,
            rightsize_confidence: 0.85,
            storage_monthly_savings: 3_200.0,
            storage_confidence: 0.95,
            reserved_monthly_savings: 15_000.0,
            reserved_confidence: 0.80,
            reserved_min_fleet_size: 3,
            reserved_commitment_period: "1 year".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_negative(self.rightsize_monthly_savings, "rightsize_monthly_savings")?;
        validate_non_negative(self.storage_monthly_savings, "storage_monthly_savings")?;
        validate_non_negative(self.reserved_monthly_savings, "reserved_monthly_savings")?;
        validate_unit_range(self.rightsize_confidence, "rightsize_confidence")?;
        validate_unit_range(self.storage_confidence, "storage_confidence")?;
        validate_unit_range(self.reserved_confidence, "reserved_confidence")?;
        if self.reserved_min_fleet_size == 0 {
            return Err(CoreError::Configuration(
                "reserved_min_fleet_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    settings: EngineSettings,
    advisor: RightsizingAdvisor,
    policy: PriorityPolicy,
}

impl RecommendationEngine {
    pub fn new(
        settings: EngineSettings,
        advisor: RightsizingAdvisor,
        policy: PriorityPolicy,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self {
            settings,
            advisor,
            policy,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn advisor(&self) -> &RightsizingAdvisor {
        &self.advisor
    }

    /// Run every pass and return recommendations, largest savings first.
    ///
    /// Running instances without a usable measurement in `utilization` get
    /// the assumed-idle rightsizing treatment.
    pub fn generate(
        &self,
        analysis: &AggregateCostAnalysis,
        inventory: &[ResourceRecord],
        utilization: &FleetUtilization,
    ) -> Vec<Recommendation> {
        tracing::debug!(
            resources = inventory.len(),
            measured = utilization.len(),
            total_cost = analysis.total_cost,
            "Generating recommendations"
        );

        let passes: [(&str, Result<Vec<Recommendation>, CoreError>); 3] = [
            ("rightsizing", self.rightsizing_pass(inventory, utilization)),
            ("storage", self.storage_pass(inventory)),
            ("reserved_capacity", self.reserved_capacity_pass(inventory)),
        ];

        let mut out = Vec::new();
        for (pass, result) in passes {
            match result {
                Ok(recs) => out.extend(recs),
                Err(e) => tracing::warn!(pass, error = %e, "Recommendation pass failed"),
            }
        }

        for rec in &out {
            if !self.policy.is_consistent(rec) {
                tracing::debug!(
                    id = %rec.id,
                    declared = rec.priority.label(),
                    savings = rec.estimated_monthly_savings,
                    confidence = rec.confidence,
                    "Declared priority exceeds policy tier"
                );
            }
        }

        // `sort_by` is stable, so ties keep pass order.
        out.sort_by(|a, b| b.estimated_monthly_savings.total_cmp(&a.estimated_monthly_savings));
        out
    }

    /// Summary in the engine's configured currency.
    pub fn summarize(&self, recommendations: &[Recommendation]) -> SavingsSummary {
        summarize(recommendations, &self.settings.currency)
    }

    fn rightsizing_pass(
        &self,
        inventory: &[ResourceRecord],
        utilization: &FleetUtilization,
    ) -> Result<Vec<Recommendation>, CoreError> {
        let mut out = Vec::new();
        for resource in inventory.iter().filter(|r| r.is_running_compute()) {
            let measured = utilization.get(resource).filter(|metrics| {
                if metrics.resource_id == resource.id {
                    return true;
                }
                tracing::warn!(
                    resource_id = %resource.id,
                    metrics_resource_id = %metrics.resource_id,
                    "Utilization keyed under another resource, treating as unmeasured"
                );
                false
            });
            let action = match measured {
                Some(metrics) => self.advisor.evaluate(metrics).actions.into_iter().next(),
                None => Some(self.assumed_idle_action(resource)),
            };
            let Some(mut action) = action else {
                continue;
            };
            if action.is_downsize() {
                action.confidence = self.settings.rightsize_confidence;
            }

            match action.into_recommendation(resource, self.settings.rightsize_monthly_savings) {
                Some(rec) => out.push(rec),
                None => tracing::debug!(
                    resource_id = %resource.id,
                    instance_type = resource.instance_type.as_deref().unwrap_or(""),
                    "No target class known, rightsizing suppressed"
                ),
            }
        }
        Ok(out)
    }

    /// Stand-in used when no measurement exists for a running instance.
    fn assumed_idle_action(&self, resource: &ResourceRecord) -> RightsizingAction {
        RightsizingAction {
            resource_id: resource.id.clone(),
            direction: RightsizingDirection::Downsize {
                savings_percent: self.advisor.thresholds().downsize_savings_percent,
            },
            reason: "Assumed low CPU utilization (no metrics available)".to_string(),
            priority: Priority::High,
            confidence: self.settings.rightsize_confidence,
        }
    }

    fn storage_pass(&self, inventory: &[ResourceRecord]) -> Result<Vec<Recommendation>, CoreError> {
        let now = Utc::now();
        Ok(inventory
            .iter()
            .filter(|r| r.is_unattached_storage())
            .map(|r| Recommendation {
                id: resource_recommendation_id(RecommendationKind::DeleteUnusedStorage, &r.id),
                kind: RecommendationKind::DeleteUnusedStorage,
                resource_id: Some(r.id.clone()),
                resource_type: Some(r.kind.as_str().to_string()),
                provider: r.provider.clone(),
                reason: "Unattached storage volume".to_string(),
                estimated_monthly_savings: self.settings.storage_monthly_savings,
                confidence: self.settings.storage_confidence,
                priority: Priority::High,
                implementation_effort: Level::Low,
                risk_level: Level::Low,
                created_at: now,
                current_instance_type: r.instance_type.clone(),
                recommended_instance_type: None,
                resource_count: None,
                commitment_period: None,
                estimated_cost_increase_percent: None,
            })
            .collect())
    }

    fn reserved_capacity_pass(
        &self,
        inventory: &[ResourceRecord],
    ) -> Result<Vec<Recommendation>, CoreError> {
        let running: Vec<&ResourceRecord> =
            inventory.iter().filter(|r| r.is_running_compute()).collect();
        if running.len() < self.settings.reserved_min_fleet_size {
            return Ok(Vec::new());
        }

        let mut providers: Vec<&str> = running.iter().filter_map(|r| r.provider.as_deref()).collect();
        providers.sort_unstable();
        providers.dedup();

        Ok(vec![Recommendation {
            id: reserved_capacity_id(running.iter().map(|r| r.id.as_str())),
            kind: RecommendationKind::ReservedCapacity,
            resource_id: None,
            resource_type: Some("compute".to_string()),
            provider: match providers.as_slice() {
                [single] => Some((*single).to_string()),
                _ => None,
            },
            reason: format!(
                "{} instances running steadily; commit to reserved capacity",
                running.len()
            ),
            estimated_monthly_savings: self.settings.reserved_monthly_savings,
            confidence: self.settings.reserved_confidence,
            priority: Priority::Medium,
            implementation_effort: Level::Medium,
            risk_level: Level::Low,
            created_at: Utc::now(),
            current_instance_type: None,
            recommended_instance_type: None,
            resource_count: Some(running.len()),
            commitment_period: Some(self.settings.reserved_commitment_period.clone()),
            estimated_cost_increase_percent: None,
        }])
    }
}

/// `reserved_instances_<digest>` over the sorted fleet ids. Same fleet, same id.
pub fn reserved_capacity_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut ids: Vec<&str> = ids.into_iter().collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    format!(
        "{}_{}",
        RecommendationKind::ReservedCapacity.id_prefix(),
        &hex[..FINGERPRINT_LEN]
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use chrono::Duration;

    use super::*;
    use crate::cost::CostPeriod;
    use crate::utilization::UtilizationMetrics;
    use crate::resource::{ResourceKind, ResourceState};

    fn analysis(total: f64) -> AggregateCostAnalysis {
        let now = Utc::now();
        let period = CostPeriod::new(now - Duration::days(30), now).unwrap();
        let mut a = AggregateCostAnalysis::empty(period, "INR");
        a.total_cost = total;
        a
    }

    fn compute(id: &str, class: &str) -> ResourceRecord {
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

    fn volume(id: &str, attached_to: Option<&str>) -> ResourceRecord {
        ResourceRecord {
            id: id.into(),
            kind: ResourceKind::BlockStorage,
            state: if attached_to.is_some() {
                ResourceState::InUse
            } else {
                ResourceState::Available
            },
            instance_type: Some("gp3".into()),
            attachments: attached_to.into_iter().map(String::from).collect(),
            region: None,
            created_at: None,
            tags: BTreeMap::new(),
            provider: Some("aws".into()),
        }
    }

    fn fleet(n: usize) -> Vec<ResourceRecord> {
        (0..n).map(|i| compute(&format!("i-{i}"), "large")).collect()
    }

    fn measured(entries: Vec<(&ResourceRecord, UtilizationMetrics)>) -> FleetUtilization {
        let mut fleet = FleetUtilization::new();
        for (resource, metrics) in entries {
            fleet.insert(resource, metrics);
        }
        fleet
    }

    fn reserved(recs: &[Recommendation]) -> usize {
        recs.iter()
            .filter(|r| r.kind == RecommendationKind::ReservedCapacity)
            .count()
    }

    #[test]
    fn end_to_end_scenario() {
        let engine = RecommendationEngine::default();
        let inventory = vec![
            compute("i-a", "large"),
            compute("i-b", "large"),
            compute("i-c", "medium"),
            volume("vol-1", None),
        ];
        let recs = engine.generate(&analysis(100_000.0), &inventory, &FleetUtilization::new());

        assert_eq!(recs.len(), 5);
        let savings: Vec<f64> = recs.iter().map(|r| r.estimated_monthly_savings).collect();
        assert_eq!(savings, vec![15_000.0, 8_500.0, 8_500.0, 8_500.0, 3_200.0]);

        assert_eq!(recs[0].kind, RecommendationKind::ReservedCapacity);
        assert_eq!(recs[0].resource_id, None);
        assert_eq!(recs[0].commitment_period.as_deref(), Some("1 year"));
        assert_eq!(recs[0].resource_count, Some(3));
        assert!(recs[0].id.starts_with("reserved_instances_"));

        let ids: Vec<&str> = recs[1..4].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rightsize_i-a", "rightsize_i-b", "rightsize_i-c"]);
        assert_eq!(recs[1].recommended_instance_type.as_deref(), Some("medium"));
        assert_eq!(recs[3].recommended_instance_type.as_deref(), Some("small"));
        assert!(recs[1..4].iter().all(|r| r.priority == Priority::High));
        assert!(recs[1..4].iter().all(|r| r.confidence == 0.85));

        assert_eq!(recs[4].id, "storage_vol-1");
        assert_eq!(recs[4].confidence, 0.95);
    }

    #[test]
    fn output_is_sorted_descending() {
        let engine = RecommendationEngine::default();
        let mut inventory = fleet(4);
        inventory.push(volume("vol-1", None));
        inventory.push(volume("vol-2", Some("i-0")));
        let recs = engine.generate(&analysis(0.0), &inventory, &FleetUtilization::new());
        assert!(recs
            .windows(2)
            .all(|w| w[0].estimated_monthly_savings >= w[1].estimated_monthly_savings));
    }

    #[test]
    fn ties_keep_pass_order() {
        let settings = EngineSettings {
            rightsize_monthly_savings: 1_000.0,
            storage_monthly_savings: 1_000.0,
            reserved_monthly_savings: 1_000.0,
            ..Default::default()
        };
        let engine =
            RecommendationEngine::new(settings, Default::default(), Default::default()).unwrap();
        let mut inventory = vec![volume("vol-1", None)];
        inventory.extend(fleet(3));
        let recs = engine.generate(&analysis(0.0), &inventory, &FleetUtilization::new());

        let kinds: Vec<RecommendationKind> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::RightsizeDown,
                RecommendationKind::RightsizeDown,
                RecommendationKind::RightsizeDown,
                RecommendationKind::DeleteUnusedStorage,
                RecommendationKind::ReservedCapacity,
            ]
        );
    }

    #[test]
    fn reserved_capacity_requires_three_running() {
        let engine = RecommendationEngine::default();
        for (n, expected) in [(0, 0), (1, 0), (2, 0), (3, 1), (10, 1)] {
            let recs = engine.generate(&analysis(0.0), &fleet(n), &FleetUtilization::new());
            assert_eq!(reserved(&recs), expected, "fleet of {n}");
        }
    }

    #[test]
    fn stopped_instances_are_ignored() {
        let engine = RecommendationEngine::default();
        let mut inventory = fleet(2);
        let mut stopped = compute("i-stopped", "large");
        stopped.state = ResourceState::Stopped;
        inventory.push(stopped);

        let recs = engine.generate(&analysis(0.0), &inventory, &FleetUtilization::new());
        assert_eq!(reserved(&recs), 0);
        assert!(recs.iter().all(|r| r.resource_id.as_deref() != Some("i-stopped")));
    }

    #[test]
    fn reserved_id_is_stable_and_fleet_specific() {
        let a = reserved_capacity_id(["i-2", "i-1", "i-3"]);
        let b = reserved_capacity_id(["i-1", "i-3", "i-2"]);
        let c = reserved_capacity_id(["i-1", "i-2", "i-4"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "reserved_instances_".len() + FINGERPRINT_LEN);
    }

    #[test]
    fn unknown_or_smallest_class_suppresses_rightsizing() {
        let engine = RecommendationEngine::default();
        let inventory = vec![compute("i-1", "t3.nano"), compute("i-2", "custom")];
        let recs = engine.generate(&analysis(0.0), &inventory, &FleetUtilization::new());
        assert!(recs.is_empty());
    }

    #[test]
    fn measured_utilization_takes_precedence() {
        let engine = RecommendationEngine::default();
        let inventory = vec![
            compute("i-busy", "t3.large"),
            compute("i-fine", "t3.large"),
            compute("i-idle", "t3.large"),
        ];
        let utilization = measured(vec![
            (&inventory[0], UtilizationMetrics::new("i-busy", 30, 92.0, 100.0)),
            (&inventory[1], UtilizationMetrics::new("i-fine", 30, 55.0, 70.0)),
            (&inventory[2], UtilizationMetrics::new("i-idle", 30, 5.0, 10.0)),
        ]);

        let recs = engine.generate(&analysis(0.0), &inventory, &utilization);

        let up = recs.iter().find(|r| r.id == "rightsize_i-busy").unwrap();
        assert_eq!(up.kind, RecommendationKind::RightsizeUp);
        assert_eq!(up.estimated_monthly_savings, 0.0);
        assert_eq!(up.estimated_cost_increase_percent, Some(20.0));
        assert_eq!(up.priority, Priority::Medium);

        assert!(recs.iter().all(|r| r.id != "rightsize_i-fine"));

        let down = recs.iter().find(|r| r.id == "rightsize_i-idle").unwrap();
        assert_eq!(down.kind, RecommendationKind::RightsizeDown);
        assert_eq!(down.estimated_monthly_savings, 8_500.0);

        // Fleet size counts running instances, not recommendations.
        assert_eq!(reserved(&recs), 1);
        assert_eq!(recs.last().map(|r| r.kind), Some(RecommendationKind::RightsizeUp));
    }

    #[test]
    fn misattributed_metrics_only_affect_their_resource() {
        let engine = RecommendationEngine::default();
        let inventory = vec![
            compute("i-good", "t3.large"),
            compute("i-bad", "t3.large"),
            compute("i-busy", "t3.large"),
            volume("vol-1", None),
        ];
        let utilization = measured(vec![
            (&inventory[0], UtilizationMetrics::new("i-good", 30, 5.0, 10.0)),
            (&inventory[1], UtilizationMetrics::new("i-other", 30, 95.0, 99.0)),
            (&inventory[2], UtilizationMetrics::new("i-busy", 30, 92.0, 100.0)),
        ]);

        let recs = engine.generate(&analysis(0.0), &inventory, &utilization);

        let good = recs.iter().find(|r| r.id == "rightsize_i-good").unwrap();
        assert_eq!(good.kind, RecommendationKind::RightsizeDown);
        assert_eq!(good.recommended_instance_type.as_deref(), Some("t3.medium"));

        // Misattributed sample is ignored, so i-bad falls back to assumed idle.
        let bad = recs.iter().find(|r| r.id == "rightsize_i-bad").unwrap();
        assert_eq!(bad.kind, RecommendationKind::RightsizeDown);
        assert!(bad.reason.contains("no metrics"));

        let busy = recs.iter().find(|r| r.id == "rightsize_i-busy").unwrap();
        assert_eq!(busy.kind, RecommendationKind::RightsizeUp);

        assert_eq!(reserved(&recs), 1);
        assert!(recs.iter().any(|r| r.id == "storage_vol-1"));
    }

    #[test]
    fn storage_and_reserved_capacity_are_low_risk() {
        let engine = RecommendationEngine::default();
        let mut inventory = fleet(3);
        inventory.push(volume("vol-1", None));
        let recs = engine.generate(&analysis(0.0), &inventory, &FleetUtilization::new());

        let storage = recs.iter().find(|r| r.id == "storage_vol-1").unwrap();
        assert_eq!(storage.risk_level, Level::Low);
        let commitment = recs
            .iter()
            .find(|r| r.kind == RecommendationKind::ReservedCapacity)
            .unwrap();
        assert_eq!(commitment.risk_level, Level::Low);
    }

    #[test]
    fn settings_are_validated() {
        let bad = EngineSettings {
            storage_confidence: 2.0,
            ..Default::default()
        };
        assert_matches!(
            RecommendationEngine::new(bad, Default::default(), Default::default()),
            Err(CoreError::Configuration(_))
        );
        let bad = EngineSettings {
            reserved_min_fleet_size: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn engine_summary_uses_configured_currency() {
        let engine = RecommendationEngine::default();
        let recs = engine.generate(&analysis(0.0), &fleet(3), &FleetUtilization::new());
        let summary = engine.summarize(&recs);
        assert_eq!(summary.currency, "INR");
        assert_eq!(summary.total_recommendations, 4);
        assert_eq!(summary.estimated_monthly_savings, 3.0 * 8_500.0 + 15_000.0);
        assert_eq!(summary.estimated_annual_savings, 12.0 * summary.estimated_monthly_savings);
        assert_eq!(summary.priority_breakdown.high, 3);
        assert_eq!(summary.priority_breakdown.medium, 1);
    }
}

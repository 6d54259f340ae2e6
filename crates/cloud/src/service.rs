//! End-to-end optimization pipeline over a set of connectors.
//!
//! Ties the aggregator, inventory and utilization collection together and
//! hands plain values to the pure [`RecommendationEngine`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;

use cloudspend_core::cost::{AggregateCostAnalysis, CostPeriod, GroupBy};
use cloudspend_core::engine::RecommendationEngine;
use cloudspend_core::error::CoreError;
use cloudspend_core::recommendation::{Recommendation, SavingsSummary};
use cloudspend_core::resource::ResourceRecord;
use cloudspend_core::types::{Money, Timestamp};
use cloudspend_core::utilization::{fleet_score, FleetUtilization, UtilizationMetrics};

use crate::aggregator::CostAggregator;
use crate::connector::{CloudConnector, OptimizationOutcome};
use crate::fleet::collect_utilization;

/// Connector health for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorStatus {
    pub provider: String,
    pub authenticated: bool,
    pub permissions: BTreeMap<String, bool>,
}

/// Ranked recommendations plus the analysis they were derived from.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReport {
    pub recommendations: Vec<Recommendation>,
    pub summary: SavingsSummary,
    #[serde(skip)]
    pub analysis: AggregateCostAnalysis,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub total_cost: Money,
    pub monthly_cost: Money,
    pub potential_savings: Money,
    /// Mean utilization score over measured instances, if any were measured.
    pub optimization_score: Option<u8>,
    pub currency: String,
    /// Set when at least one provider did not contribute.
    pub partial: bool,
    pub failed_providers: Vec<String>,
    pub last_updated: Timestamp,
}

pub struct OptimizationService {
    aggregator: CostAggregator,
    engine: RecommendationEngine,
    utilization_days: u32,
}

impl OptimizationService {
    pub fn new(aggregator: CostAggregator, engine: RecommendationEngine, utilization_days: u32) -> Self {
        Self {
            aggregator,
            engine,
            utilization_days,
        }
    }

    pub fn aggregator(&self) -> &CostAggregator {
        &self.aggregator
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub fn currency(&self) -> &str {
        self.aggregator.currency()
    }

    pub async fn authenticate_all(&self) -> usize {
        self.aggregator.authenticate_all().await
    }

    pub async fn cost_analysis(&self, period: &CostPeriod, group_by: &[GroupBy]) -> AggregateCostAnalysis {
        self.aggregator.analyze(period, group_by).await
    }

    fn authenticated(&self) -> impl Iterator<Item = &Arc<dyn CloudConnector>> {
        self.aggregator
            .connectors()
            .iter()
            .filter(|c| c.is_authenticated())
    }

    /// Inventory and measured utilization from every authenticated connector.
    ///
    /// Records are tagged with their connector's provider when they arrive
    /// untagged, so equal ids from different providers stay distinct.
    pub async fn snapshot(&self) -> (Vec<ResourceRecord>, FleetUtilization) {
        let timeout = self.aggregator.connector_timeout();
        let days = self.utilization_days;

        let per_connector = self.authenticated().map(|c| async move {
            let mut inventory = match tokio::time::timeout(timeout, c.get_resource_inventory()).await {
                Ok(records) => records,
                Err(_) => {
                    tracing::warn!(provider = c.provider(), "Inventory timed out");
                    Vec::new()
                }
            };
            for record in &mut inventory {
                record
                    .provider
                    .get_or_insert_with(|| c.provider().to_string());
            }
            let metrics = collect_utilization(c, &inventory, days, timeout).await;
            (inventory, metrics)
        });

        let mut inventory = Vec::new();
        let mut utilization = FleetUtilization::new();
        for (records, mut metrics) in join_all(per_connector).await {
            for record in &records {
                let Some(sample) = metrics.remove(&record.id) else {
                    continue;
                };
                if utilization.insert(record, sample).is_some() {
                    tracing::warn!(
                        provider = record.provider.as_deref().unwrap_or(""),
                        resource_id = %record.id,
                        "Duplicate resource id within provider, keeping the later sample"
                    );
                }
            }
            inventory.extend(records);
        }
        (inventory, utilization)
    }

    /// Regenerate recommendations over a trailing window of `days` days.
    pub async fn recommendations(&self, days: u32) -> Result<RecommendationReport, CoreError> {
        let (analysis, (inventory, utilization)) = tokio::join!(
            self.aggregator.analyze_trailing(days, &[]),
            self.snapshot()
        );
        let analysis = analysis?;
        let recommendations = self.engine.generate(&analysis, &inventory, &utilization);
        let summary = self.engine.summarize(&recommendations);
        Ok(RecommendationReport {
            recommendations,
            summary,
            analysis,
        })
    }

    pub async fn cost_summary(&self, days: u32) -> Result<CostSummary, CoreError> {
        let (analysis, (_, utilization)) = tokio::join!(
            self.aggregator.analyze_trailing(days, &[]),
            self.snapshot()
        );
        let analysis = analysis?;
        let samples: Vec<UtilizationMetrics> = utilization.values().cloned().collect();
        Ok(CostSummary {
            total_cost: analysis.total_cost,
            monthly_cost: analysis.monthly_run_rate(),
            potential_savings: analysis.potential_savings,
            optimization_score: fleet_score(&samples),
            currency: analysis.currency.clone(),
            partial: analysis.is_partial(),
            failed_providers: analysis.failed_providers,
            last_updated: Utc::now(),
        })
    }

    /// Forward one recommendation to the connector that reported it.
    pub async fn apply(&self, recommendation_id: &str, days: u32) -> Result<OptimizationOutcome, CoreError> {
        let report = self.recommendations(days).await?;
        let rec = report
            .recommendations
            .into_iter()
            .find(|r| r.id == recommendation_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Recommendation",
                id: recommendation_id.to_string(),
            })?;

        let provider = rec.provider.as_deref().ok_or_else(|| {
            CoreError::Conflict(format!(
                "Recommendation {recommendation_id} spans several providers and must be applied per provider"
            ))
        })?;
        let connector = self
            .aggregator
            .connectors()
            .iter()
            .find(|c| c.provider() == provider)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Connector",
                id: provider.to_string(),
            })?;

        connector.apply_optimization(&rec).await.map_err(|e| {
            tracing::warn!(provider, recommendation_id, error = %e, "Apply failed");
            CoreError::Conflict(format!("Provider {provider} could not accept the optimization"))
        })
    }

    /// Authentication state and permissions for every configured connector.
    pub async fn connector_status(&self) -> Vec<ConnectorStatus> {
        let checks = self.aggregator.connectors().iter().map(|c| async move {
            let authenticated = c.is_authenticated();
            let permissions = if authenticated {
                c.check_permissions().await
            } else {
                crate::connector::denied_permissions()
            };
            ConnectorStatus {
                provider: c.provider().to_string(),
                authenticated,
                permissions,
            }
        });
        join_all(checks).await
    }
}

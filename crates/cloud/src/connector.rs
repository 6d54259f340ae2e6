//! The provider connector contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use cloudspend_core::cost::{CostPeriod, ProviderCostResult};
use cloudspend_core::recommendation::Recommendation;
use cloudspend_core::resource::ResourceRecord;
use cloudspend_core::utilization::UtilizationMetrics;

use crate::error::ConnectorError;

/// Permission names reported by [`CloudConnector::check_permissions`].
pub const PERMISSION_NAMES: [&str; 4] = ["cost_read", "resource_read", "resource_modify", "billing_read"];

/// Every known permission set to `false`.
pub fn denied_permissions() -> BTreeMap<String, bool> {
    PERMISSION_NAMES
        .iter()
        .map(|name| (name.to_string(), false))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    /// Nothing was changed; the operator has to act on the recommendation.
    ManualActionRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutcome {
    pub recommendation_id: String,
    pub provider: String,
    pub status: OptimizationStatus,
    pub message: String,
}

/// Uniform access to one provider's billing, inventory and metrics APIs.
///
/// Each implementation owns its own authentication state. Callers hold
/// connectors as `Arc<dyn CloudConnector>`.
#[async_trait]
pub trait CloudConnector: Send + Sync {
    /// Stable identifier, used as the key in aggregate results.
    fn provider(&self) -> &str;

    /// Cheap status check; never performs I/O.
    fn is_authenticated(&self) -> bool;

    /// Establish credentials. Safe to call repeatedly.
    async fn authenticate(&self) -> bool;

    async fn get_cost_data(&self, period: &CostPeriod)
        -> Result<ProviderCostResult, ConnectorError>;

    /// Inventory snapshot. Failures are logged and yield an empty list.
    async fn get_resource_inventory(&self) -> Vec<ResourceRecord>;

    async fn get_utilization_metrics(
        &self,
        resource_id: &str,
        days: u32,
    ) -> Result<UtilizationMetrics, ConnectorError>;

    /// Provider-specific permission probe behind [`check_permissions`].
    ///
    /// [`check_permissions`]: CloudConnector::check_permissions
    async fn probe_permissions(&self) -> Result<BTreeMap<String, bool>, ConnectorError>;

    /// Hand a recommendation to the provider. Automated execution is not
    /// supported, so the default records nothing and asks for manual action.
    async fn apply_optimization(
        &self,
        recommendation: &Recommendation,
    ) -> Result<OptimizationOutcome, ConnectorError> {
        if !self.is_authenticated() {
            return Err(ConnectorError::NotAuthenticated {
                provider: self.provider().to_string(),
            });
        }
        tracing::info!(
            provider = self.provider(),
            recommendation_id = %recommendation.id,
            "Optimization requested, manual action required"
        );
        Ok(OptimizationOutcome {
            recommendation_id: recommendation.id.clone(),
            provider: self.provider().to_string(),
            status: OptimizationStatus::ManualActionRequired,
            message: "Automated execution is not supported; apply this change manually"
                .to_string(),
        })
    }

    /// Diagnostics only. Any failure reports every permission as denied.
    async fn check_permissions(&self) -> BTreeMap<String, bool> {
        match self.probe_permissions().await {
            Ok(perms) => perms,
            Err(e) => {
                tracing::warn!(provider = self.provider(), error = %e, "Permission check failed");
                denied_permissions()
            }
        }
    }
}

//! Connector that serves a fixed data set from memory or a JSON file.
//!
//! Used for demos and offline development, and as the fake provider in
//! tests. Costs are declared per day and scaled to the requested period.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use cloudspend_core::cost::{CostPeriod, ProviderCostResult};
use cloudspend_core::resource::ResourceRecord;
use cloudspend_core::utilization::UtilizationMetrics;

use crate::connector::CloudConnector;
use crate::error::ConnectorError;

fn default_currency() -> String {
    "USD".to_string()
}

/// On-disk fixture layout.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticFixture {
    pub provider: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Cost per service per day, in `currency`.
    #[serde(default)]
    pub daily_costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub metrics: Vec<UtilizationMetrics>,
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl StaticFixture {
    pub fn from_file(path: &Path) -> Result<Self, ConnectorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::InvalidResponse(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ConnectorError::InvalidResponse(format!("invalid fixture {}: {e}", path.display()))
        })
    }
}

pub struct StaticConnector {
    fixture: StaticFixture,
    authenticated: AtomicBool,
}

impl StaticConnector {
    pub fn new(mut fixture: StaticFixture) -> Self {
        for resource in &mut fixture.resources {
            resource
                .provider
                .get_or_insert_with(|| fixture.provider.clone());
        }
        Self {
            fixture,
            authenticated: AtomicBool::new(false),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConnectorError> {
        StaticFixture::from_file(path).map(Self::new)
    }

    fn ensure_authenticated(&self) -> Result<(), ConnectorError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ConnectorError::NotAuthenticated {
                provider: self.fixture.provider.clone(),
            })
        }
    }
}

#[async_trait]
impl CloudConnector for StaticConnector {
    fn provider(&self) -> &str {
        &self.fixture.provider
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    async fn authenticate(&self) -> bool {
        self.authenticated.store(true, Ordering::Release);
        true
    }

    async fn get_cost_data(
        &self,
        period: &CostPeriod,
    ) -> Result<ProviderCostResult, ConnectorError> {
        self.ensure_authenticated()?;
        let days = period.days() as f64;
        let breakdown: BTreeMap<String, f64> = self
            .fixture
            .daily_costs
            .iter()
            .map(|(service, daily)| (service.clone(), daily * days))
            .collect();
        Ok(ProviderCostResult {
            provider: self.fixture.provider.clone(),
            currency: self.fixture.currency.clone(),
            total_cost: breakdown.values().sum(),
            period: *period,
            breakdown,
        })
    }

    async fn get_resource_inventory(&self) -> Vec<ResourceRecord> {
        if let Err(e) = self.ensure_authenticated() {
            tracing::warn!(provider = %self.fixture.provider, error = %e, "Inventory unavailable");
            return Vec::new();
        }
        self.fixture.resources.clone()
    }

    async fn get_utilization_metrics(
        &self,
        resource_id: &str,
        days: u32,
    ) -> Result<UtilizationMetrics, ConnectorError> {
        self.ensure_authenticated()?;
        self.fixture
            .metrics
            .iter()
            .find(|m| m.resource_id == resource_id)
            .map(|m| UtilizationMetrics {
                period_days: days,
                ..m.clone()
            })
            .ok_or_else(|| ConnectorError::NotFound(format!("no metrics for {resource_id}")))
    }

    async fn probe_permissions(&self) -> Result<BTreeMap<String, bool>, ConnectorError> {
        self.ensure_authenticated()?;
        Ok(self.fixture.permissions.clone())
    }
}

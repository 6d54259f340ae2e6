//! Cross-provider cost aggregation.
//!
//! Every authenticated connector is queried concurrently and each call is
//! bounded by a timeout. A connector that errors, times out or reports a
//! currency with no known rate is logged and left out; aggregation itself
//! never fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use cloudspend_core::cost::{
    build_breakdown, AggregateCostAnalysis, CostPeriod, GroupBy, ProviderCostResult,
};
use cloudspend_core::currency::ExchangeRate;
use cloudspend_core::error::CoreError;
use cloudspend_core::threshold_validation::validate_unit_range;

use crate::connector::CloudConnector;
use crate::error::ConnectorError;

/// Share of total spend reported as potential savings.
pub const DEFAULT_SAVINGS_RATIO: f64 = 0.25;
/// Upper bound on one connector call.
pub const DEFAULT_CONNECTOR_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub savings_ratio: f64,
    pub connector_timeout: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            savings_ratio: DEFAULT_SAVINGS_RATIO,
            connector_timeout: DEFAULT_CONNECTOR_TIMEOUT,
        }
    }
}

pub struct CostAggregator {
    connectors: Vec<Arc<dyn CloudConnector>>,
    rates: Arc<dyn ExchangeRate>,
    settings: AggregatorSettings,
}

impl CostAggregator {
    pub fn new(
        connectors: Vec<Arc<dyn CloudConnector>>,
        rates: Arc<dyn ExchangeRate>,
        settings: AggregatorSettings,
    ) -> Result<Self, CoreError> {
        validate_unit_range(settings.savings_ratio, "savings_ratio")?;
        if settings.connector_timeout.is_zero() {
            return Err(CoreError::Configuration(
                "connector_timeout must be positive".to_string(),
            ));
        }
        Ok(Self {
            connectors,
            rates,
            settings,
        })
    }

    pub fn connectors(&self) -> &[Arc<dyn CloudConnector>] {
        &self.connectors
    }

    pub fn currency(&self) -> &str {
        self.rates.target_currency()
    }

    pub fn connector_timeout(&self) -> Duration {
        self.settings.connector_timeout
    }

    /// Authenticate every connector concurrently. Returns how many succeeded.
    pub async fn authenticate_all(&self) -> usize {
        let timeout = self.settings.connector_timeout;
        let results = join_all(self.connectors.iter().map(|c| async move {
            match tokio::time::timeout(timeout, c.authenticate()).await {
                Ok(ok) => ok,
                Err(_) => {
                    tracing::warn!(provider = c.provider(), "Authentication timed out");
                    false
                }
            }
        }))
        .await;
        results.into_iter().filter(|ok| *ok).count()
    }

    /// Aggregate cost for `period` across all authenticated connectors.
    pub async fn analyze(&self, period: &CostPeriod, group_by: &[GroupBy]) -> AggregateCostAnalysis {
        let target = self.rates.target_currency().to_string();
        let timeout = self.settings.connector_timeout;

        let active: Vec<&Arc<dyn CloudConnector>> = self
            .connectors
            .iter()
            .filter(|c| {
                let ok = c.is_authenticated();
                if !ok {
                    tracing::debug!(provider = c.provider(), "Skipping unauthenticated connector");
                }
                ok
            })
            .collect();

        let calls = active.iter().map(|c| async move {
            let result = match tokio::time::timeout(timeout, c.get_cost_data(period)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectorError::Timeout(timeout)),
            };
            (c.provider().to_string(), result)
        });
        let results = join_all(calls).await;

        let mut providers: BTreeMap<String, ProviderCostResult> = BTreeMap::new();
        let mut failed_providers = Vec::new();
        for (provider, result) in results {
            match result.and_then(|r| self.normalize(r, &target)) {
                Ok(normalized) => {
                    providers.insert(provider, normalized);
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Provider omitted from cost analysis");
                    failed_providers.push(provider);
                }
            }
        }
        failed_providers.sort();

        let total_cost: f64 = providers.values().map(|p| p.total_cost).sum();
        let breakdown = build_breakdown(&providers, group_by);

        tracing::info!(
            providers = providers.len(),
            failed = failed_providers.len(),
            total_cost,
            currency = %target,
            "Cost analysis complete"
        );

        AggregateCostAnalysis {
            period: *period,
            currency: target,
            total_cost,
            providers,
            potential_savings: total_cost * self.settings.savings_ratio,
            group_by: group_by.to_vec(),
            breakdown,
            failed_providers,
        }
    }

    /// Aggregate over the trailing `days` days ending now.
    pub async fn analyze_trailing(
        &self,
        days: u32,
        group_by: &[GroupBy],
    ) -> Result<AggregateCostAnalysis, CoreError> {
        let period = CostPeriod::trailing_days(days, Utc::now())?;
        Ok(self.analyze(&period, group_by).await)
    }

    fn normalize(
        &self,
        result: ProviderCostResult,
        target: &str,
    ) -> Result<ProviderCostResult, ConnectorError> {
        if !result.total_cost.is_finite() || result.total_cost < 0.0 {
            return Err(ConnectorError::InvalidResponse(format!(
                "negative or non-finite total cost {}",
                result.total_cost
            )));
        }
        let factor = self.rates.rate(&result.currency)?;
        Ok(result.normalized(factor, target))
    }
}

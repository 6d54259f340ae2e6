//! Cost data model shared by connectors, the aggregator and the API.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Money, Timestamp};

/// Maximum trailing window accepted by [`CostPeriod::trailing_days`].
pub const MAX_TRAILING_DAYS: u32 = 366;

/// Default trailing window for cost queries.
pub const DEFAULT_TRAILING_DAYS: u32 = 30;

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// A closed time range a cost query covers. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostPeriod {
    start: Timestamp,
    end: Timestamp,
}

impl CostPeriod {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::Validation(format!(
                "Cost period start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `days` days ending at `now`.
    pub fn trailing_days(days: u32, now: Timestamp) -> Result<Self, CoreError> {
        if days == 0 || days > MAX_TRAILING_DAYS {
            return Err(CoreError::Validation(format!(
                "Trailing window must be between 1 and {MAX_TRAILING_DAYS} days, got {days}"
            )));
        }
        Self::new(now - Duration::days(i64::from(days)), now)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Whole days covered, at least 1.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(1)
    }
}

// ---------------------------------------------------------------------------
// Per-provider result
// ---------------------------------------------------------------------------

/// Cost reported by a single connector for one period.
///
/// Connectors report in their native currency; the aggregator rewrites
/// `currency` and all amounts to the target currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCostResult {
    pub provider: String,
    pub currency: String,
    pub total_cost: Money,
    pub period: CostPeriod,
    /// Cost per provider service (e.g. `"Amazon EC2"`). May be empty.
    #[serde(default)]
    pub breakdown: BTreeMap<String, Money>,
}

impl ProviderCostResult {
    /// Apply a conversion factor to every amount and relabel the currency.
    pub fn normalized(mut self, factor: f64, currency: &str) -> Self {
        self.total_cost *= factor;
        for amount in self.breakdown.values_mut() {
            *amount *= factor;
        }
        self.currency = currency.to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Optional dimensions for the aggregate breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Provider,
    Service,
}

impl GroupBy {
    /// Parse a comma-separated list such as `"provider,service"`.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, CoreError> {
        let mut out = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let dim = match part {
                "provider" => Self::Provider,
                "service" => Self::Service,
                other => {
                    return Err(CoreError::Validation(format!(
                        "Unknown group_by dimension '{other}'. Must be one of: provider, service"
                    )))
                }
            };
            if !out.contains(&dim) {
                out.push(dim);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Normalized, cross-provider cost analysis for one period.
///
/// `total_cost` is the sum over `providers` only; providers that failed are
/// absent from the map and listed in `failed_providers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateCostAnalysis {
    pub period: CostPeriod,
    pub currency: String,
    pub total_cost: Money,
    pub providers: BTreeMap<String, ProviderCostResult>,
    pub potential_savings: Money,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupBy>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdown: BTreeMap<String, BTreeMap<String, Money>>,
    #[serde(default)]
    pub failed_providers: Vec<String>,
}

impl AggregateCostAnalysis {
    /// An analysis with no provider data, e.g. when nothing is configured.
    pub fn empty(period: CostPeriod, currency: &str) -> Self {
        Self {
            period,
            currency: currency.to_string(),
            total_cost: 0.0,
            providers: BTreeMap::new(),
            potential_savings: 0.0,
            group_by: Vec::new(),
            breakdown: BTreeMap::new(),
            failed_providers: Vec::new(),
        }
    }

    /// Whether at least one queried provider did not contribute.
    pub fn is_partial(&self) -> bool {
        !self.failed_providers.is_empty()
    }

    /// Total scaled to a 30-day month from the period length.
    pub fn monthly_run_rate(&self) -> Money {
        self.total_cost / self.period.days() as f64 * 30.0
    }
}

/// Build the requested breakdowns from normalized provider results.
pub fn build_breakdown(
    providers: &BTreeMap<String, ProviderCostResult>,
    group_by: &[GroupBy],
) -> BTreeMap<String, BTreeMap<String, Money>> {
    let mut out = BTreeMap::new();
    for dim in group_by {
        let mut totals: BTreeMap<String, Money> = BTreeMap::new();
        match dim {
            GroupBy::Provider => {
                for (name, result) in providers {
                    *totals.entry(name.clone()).or_default() += result.total_cost;
                }
            }
            GroupBy::Service => {
                for result in providers.values() {
                    for (service, amount) in &result.breakdown {
                        *totals.entry(service.clone()).or_default() += amount;
                    }
                }
            }
        }
        let key = match dim {
            GroupBy::Provider => "provider",
            GroupBy::Service => "service",
        };
        out.insert(key.to_string(), totals);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Utilization metrics and the CPU efficiency scorer.
//!
//! The score rewards a sweet spot of 40-70% average CPU. Below the band each
//! point costs 2, above it each point costs 1.5.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::resource::ResourceRecord;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lower edge of the optimal average-CPU band (inclusive).
pub const OPTIMAL_BAND_LOW: f64 = 40.0;
/// Upper edge of the optimal average-CPU band (inclusive).
pub const OPTIMAL_BAND_HIGH: f64 = 70.0;
/// Score lost per percentage point below the band.
pub const UNDER_PENALTY_PER_POINT: f64 = 2.0;
/// Score lost per percentage point above the band.
pub const OVER_PENALTY_PER_POINT: f64 = 1.5;
/// Default lookback for metrics queries.
pub const DEFAULT_PERIOD_DAYS: u32 = 30;
/// Longest lookback accepted. Hourly samples over 60 days fill CloudWatch's
/// 1,440-datapoint response limit exactly.
pub const MAX_PERIOD_DAYS: u32 = 60;

/// Reject a metrics lookback outside `1..=MAX_PERIOD_DAYS`.
pub fn validate_period_days(days: u32) -> Result<(), CoreError> {
    if !(1..=MAX_PERIOD_DAYS).contains(&days) {
        return Err(CoreError::Configuration(format!(
            "utilization lookback must be between 1 and {MAX_PERIOD_DAYS} days, got {days}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// CPU statistics over the metrics period. Missing values read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUtilization {
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl CpuUtilization {
    pub fn new(average: f64, maximum: f64) -> Self {
        Self {
            average: Some(average),
            maximum: Some(maximum),
        }
    }

    pub fn average_or_zero(&self) -> f64 {
        sanitize(self.average)
    }

    pub fn maximum_or_zero(&self) -> f64 {
        sanitize(self.maximum)
    }
}

/// Treat missing, NaN and negative readings as 0.
fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationMetrics {
    pub resource_id: String,
    pub period_days: u32,
    #[serde(default)]
    pub cpu_utilization: CpuUtilization,
}

impl UtilizationMetrics {
    pub fn new(resource_id: &str, period_days: u32, average: f64, maximum: f64) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            period_days,
            cpu_utilization: CpuUtilization::new(average, maximum),
        }
    }
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationTier {
    Underutilized,
    Optimal,
    Overutilized,
}

impl UtilizationTier {
    pub fn from_average(avg: f64) -> Self {
        if avg < OPTIMAL_BAND_LOW {
            Self::Underutilized
        } else if avg > OPTIMAL_BAND_HIGH {
            Self::Overutilized
        } else {
            Self::Optimal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Underutilized => "Underutilized",
            Self::Optimal => "Optimal",
            Self::Overutilized => "Overutilized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtilizationScore {
    pub score: u8,
    pub tier: UtilizationTier,
}

/// Efficiency score in `[0, 100]` for an average CPU percentage.
pub fn score_cpu(avg_cpu_percent: f64) -> u8 {
    let avg = sanitize(Some(avg_cpu_percent));
    let raw = if (OPTIMAL_BAND_LOW..=OPTIMAL_BAND_HIGH).contains(&avg) {
        100.0
    } else if avg < OPTIMAL_BAND_LOW {
        100.0 - (OPTIMAL_BAND_LOW - avg) * UNDER_PENALTY_PER_POINT
    } else {
        100.0 - (avg - OPTIMAL_BAND_HIGH) * OVER_PENALTY_PER_POINT
    };
    raw.clamp(0.0, 100.0).trunc() as u8
}

/// Score and classify a metrics sample. Never fails.
pub fn score(metrics: &UtilizationMetrics) -> UtilizationScore {
    let avg = metrics.cpu_utilization.average_or_zero();
    UtilizationScore {
        score: score_cpu(avg),
        tier: UtilizationTier::from_average(avg),
    }
}

/// Mean score across samples; `None` for an empty slice.
pub fn fleet_score(samples: &[UtilizationMetrics]) -> Option<u8> {
    if samples.is_empty() {
        return None;
    }
    let total: u32 = samples.iter().map(|m| u32::from(score(m).score)).sum();
    Some((total / samples.len() as u32) as u8)
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// Measured utilization across a multi-provider inventory.
///
/// Resource ids are only unique within one provider, so entries are keyed by
/// the record's provider first and its id second.
#[derive(Debug, Clone, Default)]
pub struct FleetUtilization {
    by_provider: HashMap<Option<String>, HashMap<String, UtilizationMetrics>>,
}

impl FleetUtilization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `metrics` for `resource`, returning the entry it replaced.
    pub fn insert(
        &mut self,
        resource: &ResourceRecord,
        metrics: UtilizationMetrics,
    ) -> Option<UtilizationMetrics> {
        self.by_provider
            .entry(resource.provider.clone())
            .or_default()
            .insert(resource.id.clone(), metrics)
    }

    pub fn get(&self, resource: &ResourceRecord) -> Option<&UtilizationMetrics> {
        self.by_provider
            .get(&resource.provider)
            .and_then(|by_id| by_id.get(&resource.id))
    }

    pub fn len(&self) -> usize {
        self.by_provider.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> impl Iterator<Item = &UtilizationMetrics> {
        self.by_provider.values().flat_map(HashMap::values)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

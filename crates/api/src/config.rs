use std::sync::Arc;
use std::time::Duration;

use cloudspend_cloud::aggregator::{
    AggregatorSettings, CostAggregator, DEFAULT_CONNECTOR_TIMEOUT, DEFAULT_SAVINGS_RATIO,
};
use cloudspend_cloud::connector::CloudConnector;
use cloudspend_cloud::service::OptimizationService;
use cloudspend_core::cost::DEFAULT_TRAILING_DAYS;
use cloudspend_core::currency::{FixedRateTable, DEFAULT_CURRENCY, DEFAULT_USD_TO_INR};
use cloudspend_core::engine::{EngineSettings, RecommendationEngine};
use cloudspend_core::error::CoreError;
use cloudspend_core::recommendation::PriorityPolicy;
use cloudspend_core::rightsizing::{RightsizingAdvisor, RightsizingThresholds};
use cloudspend_core::utilization::validate_period_days;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining in-flight requests after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Cost analysis and recommendation settings.
    pub analysis: AnalysisConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            analysis: AnalysisConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Currency, savings and rightsizing settings shared by every request.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Target currency every amount is reported in.
    pub currency: String,
    /// `CODE=RATE` pairs converting into `currency`.
    pub exchange_rates: String,
    /// Fraction of total spend reported as potential savings.
    pub savings_ratio: f64,
    /// Per-connector deadline for a single call.
    pub connector_timeout_secs: u64,
    /// Trailing window for utilization metrics and default cost queries,
    /// `1..=60`.
    pub utilization_days: u32,
    pub thresholds: RightsizingThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            exchange_rates: format!("USD={DEFAULT_USD_TO_INR}"),
            savings_ratio: DEFAULT_SAVINGS_RATIO,
            connector_timeout_secs: DEFAULT_CONNECTOR_TIMEOUT.as_secs(),
            utilization_days: DEFAULT_TRAILING_DAYS,
            thresholds: RightsizingThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                  | Default            |
    /// |--------------------------|--------------------|
    /// | `CURRENCY`               | `INR`              |
    /// | `USD_TO_INR`             | `83.0`             |
    /// | `EXCHANGE_RATES`         | `USD=<USD_TO_INR>` |
    /// | `SAVINGS_RATIO`          | `0.25`             |
    /// | `CONNECTOR_TIMEOUT_SECS` | `20`               |
    /// | `UTILIZATION_DAYS`       | `30`               |
    /// | `CPU_LOW_THRESHOLD`      | `20`               |
    /// | `CPU_HIGH_THRESHOLD`     | `80`               |
    /// | `CPU_MAX_CEILING`        | `50`               |
    ///
    /// `USD_TO_INR` only seeds the default table when the target is INR.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let currency = std::env::var("CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.currency);

        let usd_to_inr: f64 = env_parse("USD_TO_INR", DEFAULT_USD_TO_INR);
        let exchange_rates = std::env::var("EXCHANGE_RATES")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                if currency == DEFAULT_CURRENCY {
                    format!("USD={usd_to_inr}")
                } else {
                    String::new()
                }
            });

        let thresholds = RightsizingThresholds {
            low_cpu: env_parse("CPU_LOW_THRESHOLD", defaults.thresholds.low_cpu),
            high_cpu: env_parse("CPU_HIGH_THRESHOLD", defaults.thresholds.high_cpu),
            max_cpu_ceiling: env_parse("CPU_MAX_CEILING", defaults.thresholds.max_cpu_ceiling),
            ..defaults.thresholds
        };

        Self {
            currency,
            exchange_rates,
            savings_ratio: env_parse("SAVINGS_RATIO", defaults.savings_ratio),
            connector_timeout_secs: env_parse(
                "CONNECTOR_TIMEOUT_SECS",
                defaults.connector_timeout_secs,
            ),
            utilization_days: env_parse("UTILIZATION_DAYS", defaults.utilization_days),
            thresholds,
        }
    }

    /// Wire connectors, exchange rates and the recommendation engine into a
    /// service. Every setting is validated here so misconfiguration surfaces
    /// at startup.
    pub fn build_service(
        &self,
        connectors: Vec<Arc<dyn CloudConnector>>,
    ) -> Result<OptimizationService, CoreError> {
        validate_period_days(self.utilization_days)?;
        let rates = FixedRateTable::parse(&self.currency, &self.exchange_rates)?;
        let aggregator = CostAggregator::new(
            connectors,
            Arc::new(rates),
            AggregatorSettings {
                savings_ratio: self.savings_ratio,
                connector_timeout: Duration::from_secs(self.connector_timeout_secs),
            },
        )?;

        let advisor = RightsizingAdvisor::new(self.thresholds)?;
        let engine = RecommendationEngine::new(
            EngineSettings {
                currency: self.currency.clone(),
                ..EngineSettings::default()
            },
            advisor,
            PriorityPolicy::default(),
        )?;

        Ok(OptimizationService::new(
            aggregator,
            engine,
            self.utilization_days,
        ))
    }
}

/// Parse an optional env var, panicking on a malformed value.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        _ => default,
    }
}

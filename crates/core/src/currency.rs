//! Currency normalization.
//!
//! [`ExchangeRate`] is the seam for swapping in a live-rate provider. The
//! default [`FixedRateTable`] holds one static multiplier per source currency.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::types::Money;

/// Default target currency.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Default USD -> INR multiplier.
pub const DEFAULT_USD_TO_INR: f64 = 83.0;

/// Converts amounts from a source currency into one fixed target currency.
pub trait ExchangeRate: Send + Sync {
    /// The currency every converted amount is expressed in.
    fn target_currency(&self) -> &str;

    /// Multiplier from `from` to the target currency.
    fn rate(&self, from: &str) -> Result<f64, CoreError>;

    fn convert(&self, amount: Money, from: &str) -> Result<Money, CoreError> {
        Ok(amount * self.rate(from)?)
    }
}

/// Static per-currency multipliers. Currency codes are compared
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct FixedRateTable {
    target: String,
    rates: HashMap<String, f64>,
}

impl FixedRateTable {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_uppercase(),
            rates: HashMap::new(),
        }
    }

    /// Register the multiplier for one source currency.
    pub fn with_rate(mut self, from: &str, rate: f64) -> Result<Self, CoreError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Configuration(format!(
                "Exchange rate for {from} must be positive, got {rate}"
            )));
        }
        self.rates.insert(from.to_uppercase(), rate);
        Ok(self)
    }

    /// Parse `"USD=83,EUR=90.5"` into rates for `target`.
    pub fn parse(target: &str, pairs: &str) -> Result<Self, CoreError> {
        let mut table = Self::new(target);
        for pair in pairs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (code, value) = pair.split_once('=').ok_or_else(|| {
                CoreError::Configuration(format!("Exchange rate '{pair}' must look like CODE=RATE"))
            })?;
            let rate: f64 = value.trim().parse().map_err(|_| {
                CoreError::Configuration(format!("Exchange rate '{pair}' has a non-numeric rate"))
            })?;
            table = table.with_rate(code.trim(), rate)?;
        }
        Ok(table)
    }
}

impl Default for FixedRateTable {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), DEFAULT_USD_TO_INR);
        Self {
            target: DEFAULT_CURRENCY.to_string(),
            rates,
        }
    }
}

impl ExchangeRate for FixedRateTable {
    fn target_currency(&self) -> &str {
        &self.target
    }

    fn rate(&self, from: &str) -> Result<f64, CoreError> {
        let from = from.to_uppercase();
        if from == self.target {
            return Ok(1.0);
        }
        self.rates.get(&from).copied().ok_or_else(|| {
            CoreError::Validation(format!(
                "No exchange rate configured from {from} to {}",
                self.target
            ))
        })
    }
}

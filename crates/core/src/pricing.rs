//! Subscription tiers offered to customers, priced in INR.

use serde::Serialize;

use crate::types::Money;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingTier {
    pub name: &'static str,
    /// Flat fee per month; absent for percentage-priced tiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_fee: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_monthly_spend: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_annual_spend: Option<Money>,
    /// Share of managed spend charged instead of a flat fee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_fee: Option<f64>,
}

const TIERS: &[PricingTier] = &[
    PricingTier {
        name: "freemium",
        monthly_fee: Some(0.0),
        max_monthly_spend: Some(800_000.0),
        max_annual_spend: None,
        percentage_fee: None,
    },
    PricingTier {
        name: "starter",
        monthly_fee: Some(8_000.0),
        max_monthly_spend: None,
        max_annual_spend: Some(8_000_000.0),
        percentage_fee: None,
    },
    PricingTier {
        name: "growth",
        monthly_fee: Some(15_000.0),
        max_monthly_spend: None,
        max_annual_spend: Some(20_000_000.0),
        percentage_fee: None,
    },
    PricingTier {
        name: "enterprise",
        monthly_fee: None,
        max_monthly_spend: None,
        max_annual_spend: None,
        percentage_fee: Some(1.5),
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct PricingTable {
    pub currency: &'static str,
    pub tiers: &'static [PricingTier],
}

pub fn pricing_table() -> PricingTable {
    PricingTable {
        currency: "INR",
        tiers: TIERS,
    }
}

impl PricingTable {
    pub fn tier(&self, name: &str) -> Option<&PricingTier> {
        self.tiers.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Cheapest flat-fee tier whose monthly spend cap covers `monthly_spend`.
    /// Annual caps are compared against twelve months of that spend.
    pub fn tier_for_monthly_spend(&self, monthly_spend: Money) -> &PricingTier {
        self.tiers
            .iter()
            .find(|t| match (t.max_monthly_spend, t.max_annual_spend) {
                (Some(cap), _) => monthly_spend <= cap,
                (None, Some(cap)) => monthly_spend * 12.0 <= cap,
                (None, None) => true,
            })
            .unwrap_or(&TIERS[TIERS.len() - 1])
    }
}

//! Connector for a generic JSON billing REST API.
//!
//! Endpoints, all authenticated with a bearer token:
//!
//! | Method | Path                        | Body                         |
//! |--------|-----------------------------|------------------------------|
//! | GET    | /costs?start=&end=          | `{currency, total_cost, breakdown}` |
//! | GET    | /resources                  | `[ResourceRecord]`           |
//! | GET    | /resources/{id}/metrics?days= | `UtilizationMetrics`       |
//! | GET    | /permissions                | `{name: bool}`               |

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use cloudspend_core::cost::{CostPeriod, ProviderCostResult};
use cloudspend_core::resource::ResourceRecord;
use cloudspend_core::utilization::UtilizationMetrics;

use crate::connector::CloudConnector;
use crate::error::ConnectorError;

/// Settings for one billing API endpoint.
#[derive(Debug, Clone)]
pub struct HttpBillingSettings {
    /// Identifier reported as the connector's provider.
    pub provider: String,
    /// Base URL without a trailing slash, e.g. `https://billing.example.com/v1`.
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CostResponse {
    currency: String,
    total_cost: f64,
    #[serde(default)]
    breakdown: BTreeMap<String, f64>,
}

pub struct HttpBillingConnector {
    client: reqwest::Client,
    settings: HttpBillingSettings,
    authenticated: AtomicBool,
}

impl HttpBillingConnector {
    pub fn new(settings: HttpBillingSettings) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, mut settings: HttpBillingSettings) -> Self {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        Self {
            client,
            settings,
            authenticated: AtomicBool::new(false),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(self.url(path));
        match &self.settings.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), ConnectorError> {
        if self.is_authenticated() || self.authenticate().await {
            Ok(())
        } else {
            Err(ConnectorError::NotAuthenticated {
                provider: self.settings.provider.clone(),
            })
        }
    }

    async fn fetch_resources(&self) -> Result<Vec<ResourceRecord>, ConnectorError> {
        self.ensure_authenticated().await?;
        let response = self.get("/resources").send().await?;
        let mut records: Vec<ResourceRecord> = Self::parse_response(response).await?;
        for record in &mut records {
            record
                .provider
                .get_or_insert_with(|| self.settings.provider.clone());
        }
        Ok(records)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or the matching
    /// [`ConnectorError`] with the body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ConnectorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ConnectorError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ConnectorError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CloudConnector for HttpBillingConnector {
    fn provider(&self) -> &str {
        &self.settings.provider
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    async fn authenticate(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        let result = match self.get("/permissions").send().await {
            Ok(response) => Self::ensure_success(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                self.authenticated.store(true, Ordering::Release);
                tracing::info!(provider = %self.settings.provider, "Billing API authenticated");
                true
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.settings.provider,
                    error = %e,
                    "Billing API authentication failed"
                );
                false
            }
        }
    }

    async fn get_cost_data(
        &self,
        period: &CostPeriod,
    ) -> Result<ProviderCostResult, ConnectorError> {
        self.ensure_authenticated().await?;
        let response = self
            .get("/costs")
            .query(&[
                ("start", period.start().to_rfc3339()),
                ("end", period.end().to_rfc3339()),
            ])
            .send()
            .await?;
        let body: CostResponse = Self::parse_response(response).await?;
        if !body.total_cost.is_finite() || body.total_cost < 0.0 {
            return Err(ConnectorError::InvalidResponse(format!(
                "total_cost must be a non-negative number, got {}",
                body.total_cost
            )));
        }
        Ok(ProviderCostResult {
            provider: self.settings.provider.clone(),
            currency: body.currency,
            total_cost: body.total_cost,
            period: *period,
            breakdown: body.breakdown,
        })
    }

    async fn get_resource_inventory(&self) -> Vec<ResourceRecord> {
        match self.fetch_resources().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    provider = %self.settings.provider,
                    error = %e,
                    "Failed to get resource inventory"
                );
                Vec::new()
            }
        }
    }

    async fn get_utilization_metrics(
        &self,
        resource_id: &str,
        days: u32,
    ) -> Result<UtilizationMetrics, ConnectorError> {
        self.ensure_authenticated().await?;
        let response = self
            .get(&format!("/resources/{resource_id}/metrics"))
            .query(&[("days", days)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn probe_permissions(&self) -> Result<BTreeMap<String, bool>, ConnectorError> {
        self.ensure_authenticated().await?;
        let response = self.get("/permissions").send().await?;
        Self::parse_response(response).await
    }
}

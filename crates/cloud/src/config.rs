//! Connector configuration loaded from the environment.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cloudspend_core::error::CoreError;

use crate::aws::{AwsConnector, AwsSettings, DEFAULT_REGION};
use crate::connector::CloudConnector;
use crate::error::ConnectorError;
use crate::fixture::StaticConnector;
use crate::http::{HttpBillingConnector, HttpBillingSettings};

/// Per-request timeout for billing API calls.
const DEFAULT_BILLING_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Which connectors to build and how.
#[derive(Debug, Clone, Default)]
pub struct ConnectorsConfig {
    pub aws: Option<AwsSettings>,
    pub billing_api: Option<HttpBillingSettings>,
    pub static_file: Option<PathBuf>,
}

impl ConnectorsConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                 | Default      |
    /// |-------------------------|--------------|
    /// | `AWS_ENABLED`           | set when `AWS_ACCESS_KEY_ID` is |
    /// | `AWS_ACCESS_KEY_ID`     | (none)       |
    /// | `AWS_SECRET_ACCESS_KEY` | (none)       |
    /// | `AWS_DEFAULT_REGION`    | `ap-south-1` |
    /// | `BILLING_API_URL`       | (disabled)   |
    /// | `BILLING_API_TOKEN`     | (none)       |
    /// | `BILLING_PROVIDER`      | `billing`    |
    /// | `STATIC_CONNECTOR_FILE` | (disabled)   |
    pub fn from_env() -> Self {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok().filter(|v| !v.is_empty());
        let aws_enabled = std::env::var("AWS_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(access_key_id.is_some());

        let aws = aws_enabled.then(|| AwsSettings {
            region: std::env::var("AWS_DEFAULT_REGION")
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            access_key_id,
        });

        let billing_api = std::env::var("BILLING_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|base_url| HttpBillingSettings {
                provider: std::env::var("BILLING_PROVIDER")
                    .unwrap_or_else(|_| "billing".to_string()),
                base_url,
                token: std::env::var("BILLING_API_TOKEN").ok().filter(|v| !v.is_empty()),
                request_timeout: Duration::from_secs(DEFAULT_BILLING_REQUEST_TIMEOUT_SECS),
            });

        let static_file = std::env::var("STATIC_CONNECTOR_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            aws,
            billing_api,
            static_file,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aws.is_none() && self.billing_api.is_none() && self.static_file.is_none()
    }

    /// Instantiate every configured connector. Nothing is authenticated yet.
    pub fn build(&self) -> Result<Vec<Arc<dyn CloudConnector>>, ConnectorError> {
        let mut connectors: Vec<Arc<dyn CloudConnector>> = Vec::new();
        if let Some(aws) = &self.aws {
            connectors.push(Arc::new(AwsConnector::new(aws.clone())));
        }
        if let Some(billing) = &self.billing_api {
            connectors.push(Arc::new(HttpBillingConnector::new(billing.clone())?));
        }
        if let Some(path) = &self.static_file {
            connectors.push(Arc::new(StaticConnector::from_file(path)?));
        }

        let mut seen = HashSet::new();
        for c in &connectors {
            if !seen.insert(c.provider().to_string()) {
                return Err(CoreError::Configuration(format!(
                    "Duplicate connector provider '{}'",
                    c.provider()
                ))
                .into());
            }
        }
        Ok(connectors)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_builds_nothing() {
        let config = ConnectorsConfig::default();
        assert!(config.is_empty());
        assert!(config.build().unwrap().is_empty());
    }

    #[test]
    fn builds_static_and_billing_connectors() {
        let path = std::env::temp_dir().join(format!("cloudspend-fixture-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"provider": "demo", "daily_costs": {{"Compute": 1.0}}}}"#).unwrap();

        let config = ConnectorsConfig {
            aws: Some(AwsSettings::default()),
            billing_api: Some(HttpBillingSettings {
                provider: "billing".into(),
                base_url: "http://127.0.0.1:9".into(),
                token: None,
                request_timeout: Duration::from_secs(1),
            }),
            static_file: Some(path.clone()),
        };
        let connectors = config.build().unwrap();
        let names: Vec<&str> = connectors.iter().map(|c| c.provider()).collect();
        assert_eq!(names, vec!["aws", "billing", "demo"]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn duplicate_providers_are_rejected() {
        let config = ConnectorsConfig {
            aws: Some(AwsSettings::default()),
            billing_api: Some(HttpBillingSettings {
                provider: "aws".into(),
                base_url: "http://127.0.0.1:9".into(),
                token: None,
                request_timeout: Duration::from_secs(1),
            }),
            static_file: None,
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn missing_fixture_file_is_an_error() {
        let config = ConnectorsConfig {
            static_file: Some(PathBuf::from("/nonexistent/cloudspend.json")),
            ..Default::default()
        };
        assert!(config.build().is_err());
    }
}

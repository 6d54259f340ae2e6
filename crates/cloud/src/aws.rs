//! AWS connector backed by the AWS SDK for Rust.
//!
//! - Costs: Cost Explorer `GetCostAndUsage`, daily `BlendedCost` grouped by
//!   `SERVICE`.
//! - Inventory: EC2 `DescribeInstances` and `DescribeVolumes`.
//! - Utilization: CloudWatch `GetMetricStatistics` for `CPUUtilization`,
//!   hourly `Average` and `Maximum`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_cloudwatch::types::{Dimension, Statistic};
use aws_sdk_costexplorer::types::{DateInterval, Granularity, GroupDefinition, GroupDefinitionType};
use aws_smithy_types::error::display::DisplayErrorContext;
use chrono::{Duration, Utc};
use tokio::sync::OnceCell;

use cloudspend_core::cost::{CostPeriod, ProviderCostResult};
use cloudspend_core::resource::{ResourceKind, ResourceRecord, ResourceState};
use cloudspend_core::types::Timestamp;
use cloudspend_core::utilization::{CpuUtilization, UtilizationMetrics};

use crate::connector::CloudConnector;
use crate::error::ConnectorError;

/// Default region for the AWS connector.
pub const DEFAULT_REGION: &str = "ap-south-1";
/// Cost Explorer metric summed for totals.
const COST_METRIC: &str = "BlendedCost";
/// CloudWatch sample period in seconds.
const METRIC_PERIOD_SECS: i32 = 3600;
/// Cost Explorer reports in USD unless the account says otherwise.
const DEFAULT_COST_UNIT: &str = "USD";

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// Static keys; when absent the default credential chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

struct AwsClients {
    cost: aws_sdk_costexplorer::Client,
    ec2: aws_sdk_ec2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
}

pub struct AwsConnector {
    settings: AwsSettings,
    clients: OnceCell<AwsClients>,
    authenticated: AtomicBool,
}

fn provider_error(e: impl std::error::Error) -> ConnectorError {
    ConnectorError::Provider(DisplayErrorContext(e).to_string())
}

fn to_smithy(ts: Timestamp) -> aws_smithy_types::DateTime {
    aws_smithy_types::DateTime::from_secs(ts.timestamp())
}

fn from_smithy(ts: &aws_smithy_types::DateTime) -> Option<Timestamp> {
    chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Cost Explorer takes `YYYY-MM-DD` dates with an exclusive end.
fn date_interval(period: &CostPeriod) -> Result<DateInterval, ConnectorError> {
    let start = period.start().date_naive();
    let mut end = period.end().date_naive();
    if end <= start {
        end = start + Duration::days(1);
    }
    DateInterval::builder()
        .start(start.format("%Y-%m-%d").to_string())
        .end(end.format("%Y-%m-%d").to_string())
        .build()
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
}

fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|a| a.parse::<f64>().ok()).unwrap_or(0.0)
}

fn tags_to_map<'a>(
    tags: impl IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
) -> BTreeMap<String, String> {
    tags.into_iter()
        .filter_map(|(k, v)| Some((k?.to_string(), v.unwrap_or_default().to_string())))
        .collect()
}

impl AwsConnector {
    pub fn new(settings: AwsSettings) -> Self {
        Self {
            settings,
            clients: OnceCell::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    async fn clients(&self) -> &AwsClients {
        self.clients
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.settings.region.clone()));
                if let (Some(key), Some(secret)) = (
                    self.settings.access_key_id.as_ref(),
                    self.settings.secret_access_key.as_ref(),
                ) {
                    loader = loader.credentials_provider(Credentials::new(
                        key.clone(),
                        secret.clone(),
                        None,
                        None,
                        "cloudspend-env",
                    ));
                }
                let config = loader.load().await;
                AwsClients {
                    cost: aws_sdk_costexplorer::Client::new(&config),
                    ec2: aws_sdk_ec2::Client::new(&config),
                    cloudwatch: aws_sdk_cloudwatch::Client::new(&config),
                }
            })
            .await
    }

    async fn authenticated_clients(&self) -> Result<&AwsClients, ConnectorError> {
        if !self.is_authenticated() && !self.authenticate().await {
            return Err(ConnectorError::NotAuthenticated {
                provider: "aws".to_string(),
            });
        }
        Ok(self.clients().await)
    }

    /// Small Cost Explorer query over the last day.
    async fn test_connection(&self) -> Result<(), ConnectorError> {
        let now = Utc::now();
        let period = CostPeriod::new(now - Duration::days(1), now)?;
        self.clients()
            .await
            .cost
            .get_cost_and_usage()
            .time_period(date_interval(&period)?)
            .granularity(Granularity::Daily)
            .metrics(COST_METRIC)
            .send()
            .await
            .map_err(|e| ConnectorError::Authentication(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }

    async fn fetch_instances(&self) -> Result<Vec<ResourceRecord>, ConnectorError> {
        let clients = self.authenticated_clients().await?;
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = clients
                .ec2
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(provider_error)?;

            for instance in page.reservations().iter().flat_map(|r| r.instances()) {
                let Some(id) = instance.instance_id() else {
                    continue;
                };
                let state = instance
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| ResourceState::from(n.as_str().to_string()))
                    .unwrap_or_else(|| ResourceState::Other("unknown".to_string()));
                out.push(ResourceRecord {
                    id: id.to_string(),
                    kind: ResourceKind::Compute,
                    state,
                    instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
                    attachments: Vec::new(),
                    region: Some(self.settings.region.clone()),
                    created_at: instance.launch_time().and_then(from_smithy),
                    tags: tags_to_map(instance.tags().iter().map(|t| (t.key(), t.value()))),
                    provider: Some("aws".to_string()),
                });
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn fetch_volumes(&self) -> Result<Vec<ResourceRecord>, ConnectorError> {
        let clients = self.authenticated_clients().await?;
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = clients
                .ec2
                .describe_volumes()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(provider_error)?;

            for volume in page.volumes() {
                let Some(id) = volume.volume_id() else {
                    continue;
                };
                let state = volume
                    .state()
                    .map(|s| ResourceState::from(s.as_str().to_string()))
                    .unwrap_or_else(|| ResourceState::Other("unknown".to_string()));
                out.push(ResourceRecord {
                    id: id.to_string(),
                    kind: ResourceKind::BlockStorage,
                    state,
                    instance_type: volume.volume_type().map(|t| t.as_str().to_string()),
                    attachments: volume
                        .attachments()
                        .iter()
                        .filter_map(|a| a.instance_id().map(str::to_string))
                        .collect(),
                    region: Some(self.settings.region.clone()),
                    created_at: volume.create_time().and_then(from_smithy),
                    tags: tags_to_map(volume.tags().iter().map(|t| (t.key(), t.value()))),
                    provider: Some("aws".to_string()),
                });
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CloudConnector for AwsConnector {
    fn provider(&self) -> &str {
        "aws"
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    async fn authenticate(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        match self.test_connection().await {
            Ok(()) => {
                self.authenticated.store(true, Ordering::Release);
                tracing::info!(region = %self.settings.region, "AWS authentication successful");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "AWS authentication failed");
                false
            }
        }
    }

    async fn get_cost_data(
        &self,
        period: &CostPeriod,
    ) -> Result<ProviderCostResult, ConnectorError> {
        let clients = self.authenticated_clients().await?;
        let response = clients
            .cost
            .get_cost_and_usage()
            .time_period(date_interval(period)?)
            .granularity(Granularity::Daily)
            .metrics(COST_METRIC)
            .group_by(
                GroupDefinition::builder()
                    .r#type(GroupDefinitionType::Dimension)
                    .key("SERVICE")
                    .build(),
            )
            .send()
            .await
            .map_err(provider_error)?;

        let mut currency: Option<String> = None;
        let mut total = 0.0;
        let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();

        for day in response.results_by_time() {
            let mut day_total = 0.0;
            for group in day.groups() {
                let Some(metric) = group.metrics().and_then(|m| m.get(COST_METRIC)) else {
                    continue;
                };
                let amount = parse_amount(metric.amount());
                if currency.is_none() {
                    currency = metric.unit().map(str::to_string);
                }
                let service = group
                    .keys()
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Other".to_string());
                *breakdown.entry(service).or_default() += amount;
                day_total += amount;
            }
            // Ungrouped days only carry the total.
            if day.groups().is_empty() {
                if let Some(metric) = day.total().and_then(|t| t.get(COST_METRIC)) {
                    day_total = parse_amount(metric.amount());
                    if currency.is_none() {
                        currency = metric.unit().map(str::to_string);
                    }
                }
            }
            total += day_total;
        }

        tracing::debug!(total, services = breakdown.len(), "Fetched AWS cost data");

        Ok(ProviderCostResult {
            provider: "aws".to_string(),
            currency: currency.unwrap_or_else(|| DEFAULT_COST_UNIT.to_string()),
            total_cost: total,
            period: *period,
            breakdown,
        })
    }

    async fn get_resource_inventory(&self) -> Vec<ResourceRecord> {
        let (instances, volumes) = tokio::join!(self.fetch_instances(), self.fetch_volumes());
        let mut out = Vec::new();
        for (what, result) in [("instances", instances), ("volumes", volumes)] {
            match result {
                Ok(records) => out.extend(records),
                Err(e) => tracing::error!(what, error = %e, "Failed to get resource inventory"),
            }
        }
        out
    }

    async fn get_utilization_metrics(
        &self,
        resource_id: &str,
        days: u32,
    ) -> Result<UtilizationMetrics, ConnectorError> {
        let clients = self.authenticated_clients().await?;
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));

        let dimension = Dimension::builder()
            .name("InstanceId")
            .value(resource_id)
            .build()
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        let response = clients
            .cloudwatch
            .get_metric_statistics()
            .namespace("AWS/EC2")
            .metric_name("CPUUtilization")
            .dimensions(dimension)
            .start_time(to_smithy(start))
            .end_time(to_smithy(end))
            .period(METRIC_PERIOD_SECS)
            .statistics(Statistic::Average)
            .statistics(Statistic::Maximum)
            .send()
            .await
            .map_err(provider_error)?;

        let points = response.datapoints();
        let averages: Vec<f64> = points.iter().filter_map(|p| p.average()).collect();
        let average = if averages.is_empty() {
            0.0
        } else {
            averages.iter().sum::<f64>() / averages.len() as f64
        };
        let maximum = points
            .iter()
            .filter_map(|p| p.maximum())
            .fold(0.0_f64, f64::max);

        Ok(UtilizationMetrics {
            resource_id: resource_id.to_string(),
            period_days: days,
            cpu_utilization: CpuUtilization::new(average, maximum),
        })
    }

    async fn probe_permissions(&self) -> Result<BTreeMap<String, bool>, ConnectorError> {
        let clients = self.authenticated_clients().await?;
        let resource_read = clients
            .ec2
            .describe_instances()
            .max_results(5)
            .send()
            .await
            .is_ok();
        let cost_read = self.test_connection().await.is_ok();
        Ok(BTreeMap::from([
            ("cost_read".to_string(), cost_read),
            ("resource_read".to_string(), resource_read),
            ("resource_modify".to_string(), false),
            ("billing_read".to_string(), cost_read),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn date_interval_uses_calendar_days() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 8, 0, 0).unwrap();
        let interval = date_interval(&CostPeriod::new(start, end).unwrap()).unwrap();
        assert_eq!(interval.start(), "2024-03-01");
        assert_eq!(interval.end(), "2024-03-31");
    }

    #[test]
    fn same_day_interval_is_widened() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let interval = date_interval(&CostPeriod::new(start, end).unwrap()).unwrap();
        assert_eq!(interval.end(), "2024-03-02");
    }

    #[test]
    fn amounts_parse_leniently() {
        assert_eq!(parse_amount(Some("12.5")), 12.5);
        assert_eq!(parse_amount(Some("n/a")), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }

    #[test]
    fn smithy_timestamps_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(from_smithy(&to_smithy(ts)), Some(ts));
    }

    #[test]
    fn tags_skip_missing_keys() {
        let tags = tags_to_map([(Some("env"), Some("prod")), (None, Some("x")), (Some("team"), None)]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["team"], "");
    }

    #[test]
    fn connector_starts_unauthenticated() {
        let conn = AwsConnector::new(AwsSettings::default());
        assert!(!conn.is_authenticated());
        assert_eq!(conn.provider(), "aws");
    }
}

//! Fleet-wide rightsizing scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use cloudspend_core::resource::ResourceRecord;
use cloudspend_core::rightsizing::{RightsizingAction, RightsizingAdvisor};
use cloudspend_core::utilization::UtilizationMetrics;

use crate::connector::CloudConnector;
use crate::error::ConnectorError;

/// Fetch utilization for every running compute resource in `inventory`.
///
/// Resources whose fetch fails or times out are logged and left out of the
/// returned map. Keys are bare ids, so the map covers one provider only.
pub async fn collect_utilization(
    connector: &Arc<dyn CloudConnector>,
    inventory: &[ResourceRecord],
    days: u32,
    timeout: Duration,
) -> HashMap<String, UtilizationMetrics> {
    let fetches = inventory
        .iter()
        .filter(|r| r.is_running_compute())
        .map(|r| async move {
            let result =
                match tokio::time::timeout(timeout, connector.get_utilization_metrics(&r.id, days))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ConnectorError::Timeout(timeout)),
                };
            (r.id.clone(), result)
        });

    let mut out = HashMap::new();
    for (id, result) in join_all(fetches).await {
        match result {
            Ok(metrics) => {
                out.insert(id, metrics);
            }
            Err(e) => tracing::warn!(
                provider = connector.provider(),
                resource_id = %id,
                error = %e,
                "Skipping resource, utilization unavailable"
            ),
        }
    }
    out
}

/// Rightsizing actions for every running compute resource the connector
/// reports. Resources that trigger no rule contribute nothing.
pub async fn get_rightsizing_recommendations(
    connector: &Arc<dyn CloudConnector>,
    advisor: &RightsizingAdvisor,
    days: u32,
    timeout: Duration,
) -> Vec<RightsizingAction> {
    let inventory = connector.get_resource_inventory().await;
    let utilization = collect_utilization(connector, &inventory, days, timeout).await;

    inventory
        .iter()
        .filter(|r| r.is_running_compute())
        .filter_map(|r| utilization.get(&r.id))
        .flat_map(|metrics| advisor.evaluate(metrics).actions)
        .collect()
}

#[cfg(test)]
mod tests {
    use cloudspend_core::rightsizing::RightsizingDirection;

    use super::*;
    use crate::fixture::{StaticConnector, StaticFixture};

    async fn connector() -> Arc<dyn CloudConnector> {
        let fixture: StaticFixture = serde_json::from_value(serde_json::json!({
            "provider": "demo",
            "resources": [
                {"id": "i-idle", "type": "compute", "state": "running", "instance_type": "t3.large"},
                {"id": "i-hot", "type": "compute", "state": "running", "instance_type": "t3.large"},
                {"id": "i-ok", "type": "compute", "state": "running", "instance_type": "t3.large"},
                {"id": "i-nometrics", "type": "compute", "state": "running", "instance_type": "t3.large"},
                {"id": "i-off", "type": "compute", "state": "stopped", "instance_type": "t3.large"},
                {"id": "vol-1", "type": "block_storage", "state": "available"}
            ],
            "metrics": [
                {"resource_id": "i-idle", "period_days": 30, "cpu_utilization": {"average": 8.0, "maximum": 20.0}},
                {"resource_id": "i-hot", "period_days": 30, "cpu_utilization": {"average": 91.0, "maximum": 100.0}},
                {"resource_id": "i-ok", "period_days": 30, "cpu_utilization": {"average": 50.0, "maximum": 70.0}},
                {"resource_id": "i-off", "period_days": 30, "cpu_utilization": {"average": 1.0, "maximum": 2.0}}
            ]
        }))
        .unwrap();
        let conn = StaticConnector::new(fixture);
        conn.authenticate().await;
        Arc::new(conn)
    }

    #[tokio::test]
    async fn scan_covers_running_compute_only() {
        let conn = connector().await;
        let actions = get_rightsizing_recommendations(
            &conn,
            &RightsizingAdvisor::default(),
            30,
            Duration::from_secs(5),
        )
        .await;

        let ids: Vec<&str> = actions.iter().map(|a| a.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["i-idle", "i-hot"]);
        assert!(matches!(actions[0].direction, RightsizingDirection::Downsize { .. }));
        assert!(matches!(actions[1].direction, RightsizingDirection::Upsize { .. }));
    }

    #[tokio::test]
    async fn failed_metric_fetches_are_skipped() {
        let conn = connector().await;
        let inventory = conn.get_resource_inventory().await;
        let metrics = collect_utilization(&conn, &inventory, 30, Duration::from_secs(5)).await;
        assert_eq!(metrics.len(), 3);
        assert!(!metrics.contains_key("i-nometrics"));
        assert!(!metrics.contains_key("i-off"));
    }
}

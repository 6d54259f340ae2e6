//! Handlers for cost analysis and the dashboard summary.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use cloudspend_cloud::service::CostSummary;
use cloudspend_core::cost::{AggregateCostAnalysis, CostPeriod, GroupBy, DEFAULT_TRAILING_DAYS};
use cloudspend_core::types::Timestamp;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::WindowQuery;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /costs`.
///
/// Either an explicit `start`/`end` pair or a trailing `days` window.
#[derive(Debug, Default, Deserialize)]
pub struct CostsQuery {
    pub days: Option<u32>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub start: Option<String>,
    pub end: Option<String>,
    /// Comma-separated: `provider`, `service`.
    pub group_by: Option<String>,
}

/// GET /api/v1/costs
pub async fn get_costs(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<CostsQuery>,
) -> AppResult<Json<DataResponse<AggregateCostAnalysis>>> {
    let period = resolve_period(&query, Utc::now())?;
    let group_by = match query.group_by.as_deref() {
        Some(raw) => GroupBy::parse_list(raw)?,
        None => Vec::new(),
    };

    let analysis = state.service.cost_analysis(&period, &group_by).await;
    Ok(Json(DataResponse { data: analysis }))
}

/// GET /api/v1/summary
///
/// Headline totals over the trailing window (default 30 days).
pub async fn get_summary(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<DataResponse<CostSummary>>> {
    let summary = state
        .service
        .cost_summary(query.days.unwrap_or(DEFAULT_TRAILING_DAYS))
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

fn resolve_period(query: &CostsQuery, now: Timestamp) -> AppResult<CostPeriod> {
    match (query.start.as_deref(), query.end.as_deref()) {
        (Some(start), Some(end)) => {
            if query.days.is_some() {
                return Err(AppError::BadRequest(
                    "Use either days or start/end, not both".into(),
                ));
            }
            Ok(CostPeriod::new(parse_instant(start)?, parse_instant(end)?)?)
        }
        (None, None) => Ok(CostPeriod::trailing_days(
            query.days.unwrap_or(DEFAULT_TRAILING_DAYS),
            now,
        )?),
        _ => Err(AppError::BadRequest(
            "start and end must be given together".into(),
        )),
    }
}

fn parse_instant(raw: &str) -> AppResult<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "'{raw}' is not a valid date (expected YYYY-MM-DD or RFC 3339)"
            ))
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    fn query(days: Option<u32>, start: Option<&str>, end: Option<&str>) -> CostsQuery {
        CostsQuery {
            days,
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            group_by: None,
        }
    }

    #[test]
    fn trailing_window_is_the_default() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let period = resolve_period(&query(None, None, None), now).unwrap();
        assert_eq!(period.end(), now);
        assert_eq!(period.days(), 30);
    }

    #[test]
    fn explicit_dates_are_accepted() {
        let now = Utc::now();
        let period =
            resolve_period(&query(None, Some("2024-01-01"), Some("2024-01-31T00:00:00Z")), now)
                .unwrap();
        assert_eq!(period.days(), 30);
    }

    #[test]
    fn half_open_or_inverted_ranges_are_rejected() {
        let now = Utc::now();
        assert_matches!(
            resolve_period(&query(None, Some("2024-01-01"), None), now),
            Err(AppError::BadRequest(_))
        );
        assert_matches!(
            resolve_period(&query(Some(7), Some("2024-01-01"), Some("2024-01-02")), now),
            Err(AppError::BadRequest(_))
        );
        assert_matches!(
            resolve_period(&query(None, Some("2024-02-01"), Some("2024-01-01")), now),
            Err(AppError::Core(_))
        );
        assert_matches!(
            resolve_period(&query(Some(0), None, None), now),
            Err(AppError::Core(_))
        );
    }

    #[test]
    fn garbage_dates_are_bad_requests() {
        assert_matches!(parse_instant("last tuesday"), Err(AppError::BadRequest(_)));
    }
}

//! Handlers for the `/recommendations` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use cloudspend_cloud::connector::OptimizationOutcome;
use cloudspend_cloud::service::RecommendationReport;
use cloudspend_core::recommendation::SavingsSummary;

use crate::error::AppResult;
use crate::handlers::WindowQuery;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/recommendations
///
/// Regenerates recommendations from live connector data, highest savings first.
pub async fn list_recommendations(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<DataResponse<RecommendationReport>>> {
    let days = query.days.unwrap_or(state.config.analysis.utilization_days);
    let report = state.service.recommendations(days).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/recommendations/summary
pub async fn get_savings_summary(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<DataResponse<SavingsSummary>>> {
    let days = query.days.unwrap_or(state.config.analysis.utilization_days);
    let report = state.service.recommendations(days).await?;
    Ok(Json(DataResponse {
        data: report.summary,
    }))
}

/// POST /api/v1/recommendations/{id}/apply
///
/// Forwards the recommendation to the connector that reported it. 404 when
/// the id is not in the current set.
pub async fn apply_recommendation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<OptimizationOutcome>>> {
    let outcome = state
        .service
        .apply(&id, state.config.analysis.utilization_days)
        .await?;
    tracing::info!(
        user_id = user.user_id,
        recommendation_id = %id,
        provider = %outcome.provider,
        "Optimization requested"
    );
    Ok(Json(DataResponse { data: outcome }))
}

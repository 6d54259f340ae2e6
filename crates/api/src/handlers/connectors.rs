use axum::extract::State;
use axum::Json;
use cloudspend_cloud::service::ConnectorStatus;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/connectors
///
/// Authentication state and permission probe for every configured connector.
pub async fn list_connectors(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<ConnectorStatus>>>> {
    let status = state.service.connector_status().await;
    Ok(Json(DataResponse { data: status }))
}

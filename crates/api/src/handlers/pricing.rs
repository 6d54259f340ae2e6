use axum::Json;
use cloudspend_core::pricing::{pricing_table, PricingTable};

use crate::response::DataResponse;

/// GET /api/v1/pricing
///
/// Subscription tiers in INR. Public.
pub async fn get_pricing() -> Json<DataResponse<PricingTable>> {
    Json(DataResponse {
        data: pricing_table(),
    })
}

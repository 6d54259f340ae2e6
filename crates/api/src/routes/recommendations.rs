//! Route definitions for the `/recommendations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::recommendations;
use crate::state::AppState;

/// Routes mounted at `/recommendations`. All require auth.
///
/// ```text
/// GET  /              -> list_recommendations (?days)
/// GET  /summary       -> get_savings_summary (?days)
/// POST /{id}/apply    -> apply_recommendation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(recommendations::list_recommendations))
        .route("/summary", get(recommendations::get_savings_summary))
        .route("/{id}/apply", post(recommendations::apply_recommendation))
}

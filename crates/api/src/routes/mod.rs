pub mod auth;
pub mod health;
pub mod pages;
pub mod recommendations;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /health                          health check (same payload as root)
///
/// /auth
///     POST /register               create account
///     POST /login                  issue access token
///
/// /pricing                         subscription tiers (public)
/// /pricing/india                   alias of /pricing
///
/// /summary                         headline totals (?days)
/// /costs                           aggregate analysis (?days|start&end, group_by)
///
/// /recommendations                 ranked recommendations (?days)
///     /summary                     savings summary
///     /{id}/apply                  forward to the owning connector (POST)
///
/// /connectors                      connector status and permissions
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        // Authentication (register, login).
        .nest("/auth", auth::router())
        // Public pricing.
        .route("/pricing", get(handlers::pricing::get_pricing))
        .route("/pricing/india", get(handlers::pricing::get_pricing))
        // Cost analysis.
        .route("/summary", get(handlers::costs::get_summary))
        .route("/costs", get(handlers::costs::get_costs))
        // Recommendation engine.
        .nest("/recommendations", recommendations::router())
        // Connector diagnostics.
        .route("/connectors", get(handlers::connectors::list_connectors))
}

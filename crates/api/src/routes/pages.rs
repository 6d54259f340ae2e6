//! HTML page routes, mounted at the root.

use axum::routing::get;
use axum::Router;

use crate::handlers::pages;
use crate::state::AppState;

/// ```text
/// GET       /           -> landing
/// GET|POST  /register   -> register_page / register_submit
/// GET|POST  /login      -> login_page / login_submit
/// GET       /logout     -> logout
/// GET       /dashboard  -> dashboard (cookie auth, redirects to /login)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::landing))
        .route(
            "/register",
            get(pages::register_page).post(pages::register_submit),
        )
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route("/logout", get(pages::logout))
        .route("/dashboard", get(pages::dashboard))
}

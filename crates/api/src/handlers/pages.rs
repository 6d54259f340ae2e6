//! Server-rendered HTML pages: landing, register, login, logout, dashboard.
//!
//! The login form stores the access token in an HTTP-only cookie so the
//! dashboard (and the JSON API) can be used from a plain browser session.

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use cloudspend_core::cost::DEFAULT_TRAILING_DAYS;
use cloudspend_core::pricing::pricing_table;
use cloudspend_core::types::Money;
use serde::Deserialize;

use crate::auth::{ACCESS_TOKEN_COOKIE, MIN_PASSWORD_LENGTH};
use crate::error::AppError;
use crate::handlers::auth::{authenticate, register_user};
use crate::middleware::auth::PageUser;
use crate::state::AppState;

/// Recommendations listed on the dashboard.
const DASHBOARD_TOP_RECOMMENDATIONS: usize = 5;

// ---------------------------------------------------------------------------
// Form types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    #[serde(default)]
    pub registered: Option<u8>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /
pub async fn landing() -> Html<String> {
    let table = pricing_table();
    let tiers: String = table
        .tiers
        .iter()
        .map(|t| {
            let price = match (t.monthly_fee, t.percentage_fee) {
                (Some(fee), _) => format!("{} {}/month", table.currency, format_amount(fee)),
                (None, Some(pct)) => format!("{pct}% of managed spend"),
                (None, None) => "Contact us".to_string(),
            };
            format!("<li><strong>{}</strong>: {}</li>", escape(t.name), escape(&price))
        })
        .collect();

    page(
        "Cloudspend",
        &format!(
            "<h1>Cloud cost optimization</h1>\
             <p>Aggregate spend across providers, normalized to one currency, \
             with ranked rightsizing and commitment recommendations.</p>\
             <h2>Plans</h2><ul>{tiers}</ul>\
             <p><a href=\"/register\">Create an account</a> or <a href=\"/login\">log in</a>.</p>"
        ),
    )
}

/// GET /register
pub async fn register_page() -> Html<String> {
    register_form(None)
}

/// POST /register
pub async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    match register_user(&state, &form.email, &form.password, form.full_name).await {
        Ok(_) => Redirect::to("/login?registered=1").into_response(),
        Err(e) => {
            let (status, _, message) = e.parts();
            (status, register_form(Some(&message))).into_response()
        }
    }
}

/// GET /login
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Html<String> {
    let notice = query
        .registered
        .map(|_| "Account created. Please log in.");
    login_form(None, notice)
}

/// POST /login
///
/// On success stores the access token in the session cookie and redirects to
/// the dashboard.
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match authenticate(&state, &form.email, &form.password).await {
        Ok(auth) => {
            let cookie = format!(
                "{ACCESS_TOKEN_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
                auth.access_token, auth.expires_in
            );
            ([(SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response()
        }
        Err(e) => {
            let (status, _, message) = e.parts();
            (status, login_form(Some(&message), None)).into_response()
        }
    }
}

/// GET /logout
pub async fn logout() -> Response {
    let cookie = format!("{ACCESS_TOKEN_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

/// GET /dashboard
///
/// Cost summary plus the top recommendations. Analysis failures are shown
/// inline rather than failing the page.
pub async fn dashboard(State(state): State<AppState>, PageUser(user): PageUser) -> Response {
    let days = state.config.analysis.utilization_days;
    let (summary, report) = tokio::join!(
        state.service.cost_summary(DEFAULT_TRAILING_DAYS),
        state.service.recommendations(days)
    );

    let summary_html = match summary {
        Ok(s) => {
            let score = s
                .optimization_score
                .map_or_else(|| "n/a".to_string(), |v| format!("{v}/100"));
            let partial = if s.partial {
                format!(
                    "<p class=\"warn\">Partial data: {} did not respond.</p>",
                    escape(&s.failed_providers.join(", "))
                )
            } else {
                String::new()
            };
            format!(
                "<h2>Last {DEFAULT_TRAILING_DAYS} days</h2>{partial}<table>\
                 <tr><th>Total spend</th><td>{cur} {}</td></tr>\
                 <tr><th>Monthly run rate</th><td>{cur} {}</td></tr>\
                 <tr><th>Potential savings</th><td>{cur} {}</td></tr>\
                 <tr><th>Optimization score</th><td>{score}</td></tr>\
                 </table>",
                format_amount(s.total_cost),
                format_amount(s.monthly_cost),
                format_amount(s.potential_savings),
                cur = escape(&s.currency),
            )
        }
        Err(e) => error_block(&AppError::from(e)),
    };

    let recommendations_html = match report {
        Ok(report) if report.recommendations.is_empty() => {
            "<h2>Recommendations</h2><p>No recommendations right now.</p>".to_string()
        }
        Ok(report) => {
            let rows: String = report
                .recommendations
                .iter()
                .take(DASHBOARD_TOP_RECOMMENDATIONS)
                .map(|r| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{} {}</td><td>{}</td></tr>",
                        escape(r.priority.label()),
                        escape(&r.reason),
                        escape(&report.summary.currency),
                        format_amount(r.estimated_monthly_savings),
                        escape(&r.id),
                    )
                })
                .collect();
            format!(
                "<h2>Recommendations</h2>\
                 <p>{} total, {} {} per month.</p>\
                 <table><tr><th>Priority</th><th>Action</th><th>Monthly savings</th><th>Id</th></tr>{rows}</table>",
                report.summary.total_recommendations,
                escape(&report.summary.currency),
                format_amount(report.summary.estimated_monthly_savings),
            )
        }
        Err(e) => error_block(&AppError::from(e)),
    };

    page(
        "Dashboard",
        &format!(
            "<p>Signed in as {} &middot; <a href=\"/logout\">Log out</a></p>{summary_html}{recommendations_html}",
            escape(&user.email)
        ),
    )
    .into_response()
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn register_form(error: Option<&str>) -> Html<String> {
    page(
        "Register",
        &format!(
            "<h1>Create an account</h1>{}\
             <form method=\"post\" action=\"/register\">\
             <label>Full name <input name=\"full_name\"></label>\
             <label>Email <input name=\"email\" type=\"email\" required></label>\
             <label>Password <input name=\"password\" type=\"password\" minlength=\"{MIN_PASSWORD_LENGTH}\" required></label>\
             <button type=\"submit\">Register</button></form>\
             <p>Already registered? <a href=\"/login\">Log in</a>.</p>",
            error.map(error_paragraph).unwrap_or_default()
        ),
    )
}

fn login_form(error: Option<&str>, notice: Option<&str>) -> Html<String> {
    let notice = notice
        .map(|n| format!("<p class=\"notice\">{}</p>", escape(n)))
        .unwrap_or_default();
    page(
        "Log in",
        &format!(
            "<h1>Log in</h1>{notice}{}\
             <form method=\"post\" action=\"/login\">\
             <label>Email <input name=\"email\" type=\"email\" required></label>\
             <label>Password <input name=\"password\" type=\"password\" required></label>\
             <button type=\"submit\">Log in</button></form>\
             <p>No account? <a href=\"/register\">Register</a>.</p>",
            error.map(error_paragraph).unwrap_or_default()
        ),
    )
}

fn error_block(err: &AppError) -> String {
    let (status, _, message) = err.parts();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return error_paragraph("Cost data is unavailable right now.");
    }
    error_paragraph(&message)
}

fn error_paragraph(message: &str) -> String {
    format!("<p class=\"error\">{}</p>", escape(message))
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title></head><body><main>{body}</main></body></html>",
        escape(title)
    ))
}

fn format_amount(value: Money) -> String {
    format!("{value:.2}")
}

/// Minimal HTML escaping for text and attribute content.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

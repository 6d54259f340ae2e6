//! Request extractors.
//!
//! - [`auth::AuthUser`] -- JSON API authentication, rejects with 401.
//! - [`auth::PageUser`] -- HTML page authentication, redirects to `/login`.

pub mod auth;

pub mod auth;
pub mod connectors;
pub mod costs;
pub mod pages;
pub mod pricing;
pub mod recommendations;

use serde::Deserialize;

/// `?days=N` trailing-window query shared by the analysis endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
}

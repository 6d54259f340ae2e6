//! Cloud spend domain logic.
//!
//! Everything in this crate is pure: no network, no database. Connectors,
//! persistence and HTTP live in the `cloud`, `db` and `api` crates and feed
//! plain values into the functions here.

pub mod cost;
pub mod currency;
pub mod engine;
pub mod error;
pub mod instance_sizing;
pub mod pricing;
pub mod recommendation;
pub mod resource;
pub mod rightsizing;
pub mod threshold_validation;
pub mod types;
pub mod utilization;

//! Cloud provider connectors and the I/O-bound parts of the pipeline.
//!
//! Each provider sits behind the [`connector::CloudConnector`] trait. The
//! aggregator and fleet scan fan out over connectors and fold their results
//! into the pure types from `cloudspend-core`.

pub mod aggregator;
pub mod aws;
pub mod config;
pub mod connector;
pub mod error;
pub mod fixture;
pub mod fleet;
pub mod http;
pub mod service;

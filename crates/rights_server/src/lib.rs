//! rights_server: REST surface for the aggregated rights service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metric_client;
pub mod middleware;
pub mod router;

//! Workflow Template Gateway - the read-only client for the external
//! workflow template service.
//!
//! The template service is the system of record for "who must approve which
//! step"; this crate only fetches routes, it never writes them. Every
//! failure - transport, HTTP status, parse - collapses into
//! [`GatewayError::Unavailable`], and callers must treat that as
//! "authorization cannot be confirmed" and refuse to authorize. There is no
//! fail-open path.

use async_trait::async_trait;
use thiserror::Error;

use procura_core::RouteTemplate;

pub mod fixtures;
pub mod http;
pub mod memory;

pub use http::HttpWorkflowGateway;
pub use memory::StaticWorkflowGateway;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("workflow template service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    /// Fetches the ordered steps and assignment lists for a route. Fetched
    /// fresh on every relevant operation; no caching, so callers tolerate
    /// eventual staleness between fetch and commit.
    async fn route(&self, route_id: i64) -> Result<RouteTemplate, GatewayError>;
}

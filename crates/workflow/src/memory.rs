//! In-memory gateway used by tests and local development, with an outage
//! toggle for exercising the fail-closed paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use procura_core::RouteTemplate;

use crate::{GatewayError, WorkflowGateway};

#[derive(Default)]
pub struct StaticWorkflowGateway {
    routes: HashMap<i64, RouteTemplate>,
    unavailable: AtomicBool,
}

impl StaticWorkflowGateway {
    pub fn new(routes: Vec<RouteTemplate>) -> Self {
        Self {
            routes: routes.into_iter().map(|r| (r.route_id, r)).collect(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn single(route: RouteTemplate) -> Self {
        Self::new(vec![route])
    }

    /// Simulates the template service being down; subsequent fetches fail
    /// with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkflowGateway for StaticWorkflowGateway {
    async fn route(&self, route_id: i64) -> Result<RouteTemplate, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("simulated outage".to_string()));
        }

        self.routes
            .get(&route_id)
            .cloned()
            .ok_or_else(|| GatewayError::Unavailable(format!("route {route_id} is not defined")))
    }
}

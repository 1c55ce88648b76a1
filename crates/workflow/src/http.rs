//! HTTP implementation of the gateway against the upstream .NET workflow
//! service, which emits PascalCase JSON; the wire types accept PascalCase
//! and camelCase spellings.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use procura_core::{Assignment, RouteStep, RouteTemplate};

use crate::{GatewayError, WorkflowGateway};

pub struct HttpWorkflowGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowGateway {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("client construction failed: {e}")))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn route_url(&self, route_id: i64) -> String {
        format!("{}/api/WorkflowRoutes/{route_id}/detail", self.base_url)
    }
}

#[async_trait]
impl WorkflowGateway for HttpWorkflowGateway {
    async fn route(&self, route_id: i64) -> Result<RouteTemplate, GatewayError> {
        let url = self.route_url(route_id);

        let response = self.client.get(&url).send().await.map_err(|error| {
            warn!(
                event_name = "workflow.route.transport_error",
                route_id,
                error = %error,
                "workflow route fetch failed"
            );
            GatewayError::Unavailable(format!("transport error: {error}"))
        })?;

        if !response.status().is_success() {
            warn!(
                event_name = "workflow.route.http_error",
                route_id,
                status = %response.status(),
                "workflow route fetch returned non-success status"
            );
            return Err(GatewayError::Unavailable(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let detail: RouteDetailDto = response.json().await.map_err(|error| {
            warn!(
                event_name = "workflow.route.parse_error",
                route_id,
                error = %error,
                "workflow route payload could not be parsed"
            );
            GatewayError::Unavailable(format!("parse error: {error}"))
        })?;

        Ok(detail.into_template(route_id))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouteDetailDto {
    #[serde(alias = "Id")]
    id: i64,
    #[serde(alias = "RouteName", alias = "routeName")]
    route_name: String,
    #[serde(alias = "Steps")]
    steps: Vec<RouteStepDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouteStepDto {
    #[serde(alias = "SequenceNo", alias = "sequenceNo")]
    sequence_no: u32,
    #[serde(alias = "StepName", alias = "stepName")]
    step_name: String,
    #[serde(alias = "Assignments")]
    assignments: Vec<AssignmentDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssignmentDto {
    #[serde(alias = "NId", alias = "nId", alias = "nid")]
    n_id: String,
    #[serde(alias = "EmployeeName", alias = "employeeName")]
    employee_name: String,
}

impl RouteDetailDto {
    fn into_template(self, requested_route_id: i64) -> RouteTemplate {
        RouteTemplate {
            route_id: if self.id != 0 { self.id } else { requested_route_id },
            route_name: self.route_name,
            steps: self
                .steps
                .into_iter()
                .map(|step| RouteStep {
                    sequence: step.sequence_no,
                    step_name: step.step_name,
                    assignments: step
                        .assignments
                        .into_iter()
                        .map(|a| Assignment { actor_id: a.n_id, display_name: a.employee_name })
                        .collect(),
                })
                .collect(),
        }
    }
}

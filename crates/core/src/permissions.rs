//! Live permission flags and the route-with-history timeline shown on the
//! request detail view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{RequestAggregate, RequestStatus};
use crate::domain::route::RouteTemplate;
use crate::domain::step::StepStatus;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_edit: bool,
}

/// Computes what `actor_id` may do with the request right now. A missing
/// route (template service unavailable) yields no approval rights: when
/// authorization cannot be confirmed, it is denied.
pub fn compute(
    aggregate: &RequestAggregate,
    route: Option<&RouteTemplate>,
    actor_id: &str,
) -> Permissions {
    let can_edit = matches!(
        aggregate.request.status,
        RequestStatus::Draft | RequestStatus::Rejected
    ) && aggregate.request.created_by.eq_ignore_ascii_case(actor_id);

    let can_act = aggregate.request.status == RequestStatus::Pending
        && match (route, aggregate.request.current_step) {
            (Some(route), Some(sequence)) => route.is_assigned(sequence, actor_id),
            _ => false,
        };

    Permissions { can_approve: can_act, can_reject: can_act, can_edit }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineAssignment {
    pub actor_id: String,
    pub display_name: String,
    pub is_current_actor: bool,
}

/// One route step merged with whatever actually happened on it for this
/// request. `status` is `None` when the request predates a step added to the
/// template later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub sequence: u32,
    pub step_name: String,
    pub assignments: Vec<TimelineAssignment>,
    pub status: Option<StepStatus>,
    pub acted_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub approver_id: Option<String>,
    pub approver_name: Option<String>,
}

/// Merges the live route template with the request's step history, marking
/// which assignments belong to the current actor.
pub fn merge_timeline(
    route: &RouteTemplate,
    aggregate: &RequestAggregate,
    actor_id: &str,
) -> Vec<TimelineStep> {
    route
        .ordered_steps()
        .into_iter()
        .map(|route_step| {
            let actual = aggregate.step(route_step.sequence);
            TimelineStep {
                sequence: route_step.sequence,
                step_name: route_step.step_name.clone(),
                assignments: route_step
                    .assignments
                    .iter()
                    .map(|a| TimelineAssignment {
                        actor_id: a.actor_id.clone(),
                        display_name: a.display_name.clone(),
                        is_current_actor: a.actor_id.eq_ignore_ascii_case(actor_id),
                    })
                    .collect(),
                status: actual.map(|s| s.status),
                acted_at: actual.and_then(|s| s.acted_at),
                comment: actual.and_then(|s| s.comment.clone()),
                approver_id: actual.and_then(|s| s.approver_id.clone()),
                approver_name: actual.and_then(|s| s.approver_name.clone()),
            }
        })
        .collect()
}

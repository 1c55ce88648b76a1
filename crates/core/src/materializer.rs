//! Expands a workflow route template into per-request approval step rows at
//! creation time.
//!
//! Submitting is itself the step-1 approval act: the creator is deemed to
//! have passed their own step the instant they submit, so the first hand-off
//! goes straight to the second step without a separate approval click.

use chrono::{DateTime, Utc};

use crate::domain::route::RouteTemplate;
use crate::domain::step::{ApprovalStep, StepStatus};
use crate::errors::DomainError;
use crate::RequestStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitIntent {
    /// Keep the document as a work in progress; step 1 stays open.
    Save,
    /// Hand the document off to the approval chain immediately.
    Submit,
}

/// Initial workflow state for a new request: header status, current-step
/// pointer, and the full set of step rows.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterializedRequest {
    pub status: RequestStatus,
    pub current_step: Option<u32>,
    pub steps: Vec<ApprovalStep>,
}

pub fn materialize(
    route: &RouteTemplate,
    intent: SubmitIntent,
    actor_id: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<MaterializedRequest, DomainError> {
    let ordered = route.ordered_steps();
    if ordered.is_empty() {
        return Err(DomainError::EmptyRoute);
    }

    let mut steps: Vec<ApprovalStep> = ordered
        .iter()
        .map(|s| ApprovalStep::not_reached(s.sequence, s.step_name.clone()))
        .collect();

    let first_sequence = steps[0].sequence;
    let second_sequence = steps.get(1).map(|s| s.sequence);

    match intent {
        SubmitIntent::Save => {
            // Step 1 is open for the creator to finish; nothing recorded yet.
            steps[0].status = StepStatus::Pending;
            Ok(MaterializedRequest {
                status: RequestStatus::Draft,
                current_step: Some(first_sequence),
                steps,
            })
        }
        SubmitIntent::Submit => {
            steps[0].record_action(
                StepStatus::Approved,
                now,
                comment.map(str::to_owned),
                actor_id.to_owned(),
                route.display_name_or_id(actor_id),
            );

            match second_sequence {
                Some(next) => {
                    steps[1].status = StepStatus::Pending;
                    Ok(MaterializedRequest {
                        status: RequestStatus::Pending,
                        current_step: Some(next),
                        steps,
                    })
                }
                // Single-step route: submitting fully approves the document.
                None => Ok(MaterializedRequest {
                    status: RequestStatus::Approved,
                    current_step: None,
                    steps,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::route::fixtures::three_step_route;
    use crate::domain::route::{Assignment, RouteStep, RouteTemplate};
    use crate::domain::step::StepStatus;
    use crate::errors::DomainError;
    use crate::RequestStatus;

    use super::{materialize, SubmitIntent};

    fn single_step_route() -> RouteTemplate {
        RouteTemplate {
            route_id: 2,
            route_name: "Self Service".to_string(),
            steps: vec![RouteStep {
                sequence: 1,
                step_name: "Requester".to_string(),
                assignments: vec![Assignment {
                    actor_id: "u100".to_string(),
                    display_name: "Arthit S.".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn save_leaves_step_one_pending_and_request_draft() {
        let route = three_step_route();
        let state = materialize(&route, SubmitIntent::Save, "u100", None, Utc::now())
            .expect("materialize save");

        assert_eq!(state.status, RequestStatus::Draft);
        assert_eq!(state.current_step, Some(1));
        assert_eq!(state.steps[0].status, StepStatus::Pending);
        assert!(state.steps[0].approver_id.is_none());
        assert_eq!(state.steps[1].status, StepStatus::NotReached);
        assert_eq!(state.steps[2].status, StepStatus::NotReached);
    }

    #[test]
    fn submit_approves_step_one_and_activates_step_two() {
        let route = three_step_route();
        let now = Utc::now();
        let state = materialize(&route, SubmitIntent::Submit, "u100", Some("urgent"), now)
            .expect("materialize submit");

        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.current_step, Some(2));

        let step1 = &state.steps[0];
        assert_eq!(step1.status, StepStatus::Approved);
        assert_eq!(step1.acted_at, Some(now));
        assert_eq!(step1.approver_id.as_deref(), Some("u100"));
        assert_eq!(step1.approver_name.as_deref(), Some("Arthit S."));
        assert_eq!(step1.comment.as_deref(), Some("urgent"));

        assert_eq!(state.steps[1].status, StepStatus::Pending);
        assert!(state.steps[1].approver_id.is_none());
        assert_eq!(state.steps[2].status, StepStatus::NotReached);
    }

    #[test]
    fn submit_on_single_step_route_is_fully_approved() {
        let route = single_step_route();
        let state = materialize(&route, SubmitIntent::Submit, "u100", None, Utc::now())
            .expect("materialize submit");

        assert_eq!(state.status, RequestStatus::Approved);
        assert_eq!(state.current_step, None);
        assert_eq!(state.steps[0].status, StepStatus::Approved);
    }

    #[test]
    fn submit_by_unknown_actor_snapshots_raw_id_as_name() {
        let route = three_step_route();
        let state = materialize(&route, SubmitIntent::Submit, "contractor-77", None, Utc::now())
            .expect("materialize submit");

        assert_eq!(state.steps[0].approver_name.as_deref(), Some("contractor-77"));
    }

    #[test]
    fn empty_route_is_rejected() {
        let route = RouteTemplate {
            route_id: 9,
            route_name: "Empty".to_string(),
            steps: Vec::new(),
        };
        let error = materialize(&route, SubmitIntent::Submit, "u100", None, Utc::now())
            .expect_err("empty route must fail");
        assert_eq!(error, DomainError::EmptyRoute);
    }

    #[test]
    fn unsorted_template_steps_are_ordered_before_expansion() {
        let mut route = three_step_route();
        route.steps.reverse();
        let state = materialize(&route, SubmitIntent::Submit, "u100", None, Utc::now())
            .expect("materialize submit");

        let sequences: Vec<u32> = state.steps.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(state.current_step, Some(2));
    }
}

//! The approval state machine.
//!
//! All operations are pure mutations of a [`RequestAggregate`] against an
//! already-fetched [`RouteTemplate`]; fetching the route and persisting the
//! mutated aggregate (atomically, with the concurrency guard) belong to the
//! callers. Authorization is part of every transition: the acting identity
//! must appear, case-insensitively, in the template's assignment list for
//! the step being acted on.

use chrono::{DateTime, Utc};

use crate::domain::request::{RequestAggregate, RequestStatus};
use crate::domain::route::RouteTemplate;
use crate::domain::step::StepStatus;
use crate::errors::DomainError;
use crate::materializer::SubmitIntent;

/// Auditable outcome of an approve/reject transition. `prior_status` is what
/// the acted-on step held before the mutation; the repository re-checks it
/// inside the transaction so a racing double-action loses cleanly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub sequence: u32,
    pub step_name: String,
    pub prior_status: StepStatus,
    pub new_status: RequestStatus,
}

impl RequestAggregate {
    /// Approves the current step and hands the document to the next one, or
    /// fully approves the request when no step remains.
    pub fn approve(
        &mut self,
        route: &RouteTemplate,
        actor_id: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError> {
        let current = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .min_by_key(|s| s.sequence)
            .map(|s| s.sequence)
            .ok_or(DomainError::NoActionableStep)?;

        self.authorize(route, current, actor_id)?;

        let approver_name = route.display_name_or_id(actor_id);
        let step = self.step_mut(current).ok_or(DomainError::NoActionableStep)?;
        let step_name = step.step_name.clone();
        step.record_action(
            StepStatus::Approved,
            now,
            comment,
            actor_id.to_owned(),
            approver_name,
        );

        let next = self
            .steps
            .iter()
            .filter(|s| s.sequence > current)
            .min_by_key(|s| s.sequence)
            .map(|s| s.sequence);

        let new_status = match next {
            Some(next_sequence) => {
                // The hand-off: wake the next step if it has not been
                // reached yet.
                if let Some(next_step) = self.step_mut(next_sequence) {
                    if next_step.status == StepStatus::NotReached {
                        next_step.status = StepStatus::Pending;
                    }
                }
                self.request.current_step = Some(next_sequence);
                RequestStatus::Pending
            }
            None => {
                self.request.current_step = None;
                RequestStatus::Approved
            }
        };
        self.request.status = new_status;

        Ok(Decision { sequence: current, step_name, prior_status: StepStatus::Pending, new_status })
    }

    /// Rejects the step where the document currently sits and cancels every
    /// step downstream of it. The request becomes Rejected immediately.
    ///
    /// The current step here is the lowest sequence that is Pending *or*
    /// NotReached, so a step that was never activated can still be rejected.
    pub fn reject(
        &mut self,
        route: &RouteTemplate,
        actor_id: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Decision, DomainError> {
        let (current, prior_status) = self
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Pending | StepStatus::NotReached))
            .min_by_key(|s| s.sequence)
            .map(|s| (s.sequence, s.status))
            .ok_or(DomainError::NoActionableStep)?;

        self.authorize(route, current, actor_id)?;

        let approver_name = route.display_name_or_id(actor_id);
        let step = self.step_mut(current).ok_or(DomainError::NoActionableStep)?;
        let step_name = step.step_name.clone();
        step.record_action(
            StepStatus::Rejected,
            now,
            comment,
            actor_id.to_owned(),
            approver_name,
        );

        // Nothing downstream of a rejection stays actionable.
        for step in self.steps.iter_mut().filter(|s| s.sequence > current) {
            step.status = StepStatus::Cancelled;
        }

        self.request.status = RequestStatus::Rejected;
        self.request.current_step = None;

        Ok(Decision {
            sequence: current,
            step_name,
            prior_status,
            new_status: RequestStatus::Rejected,
        })
    }

    /// Edit-and-resubmit (or edit-and-save) of a Draft or Rejected request by
    /// its creator. Every step after the first is reset to NotReached,
    /// clearing stale approver data from a prior rejection cycle; submitting
    /// re-approves step 1 and re-activates step 2.
    pub fn resubmit(
        &mut self,
        route: &RouteTemplate,
        actor_id: &str,
        comment: Option<String>,
        intent: SubmitIntent,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !matches!(self.request.status, RequestStatus::Draft | RequestStatus::Rejected) {
            return Err(DomainError::NotEditable { status: self.request.status });
        }
        if !self.request.created_by.eq_ignore_ascii_case(actor_id) {
            return Err(DomainError::NotRequestOwner);
        }

        let first = self
            .steps
            .iter()
            .min_by_key(|s| s.sequence)
            .map(|s| s.sequence)
            .ok_or(DomainError::EmptyRoute)?;

        for step in self.steps.iter_mut().filter(|s| s.sequence > first) {
            step.reset();
        }

        match intent {
            SubmitIntent::Save => {
                let step1 = self.step_mut(first).ok_or(DomainError::EmptyRoute)?;
                step1.reset();
                step1.status = StepStatus::Pending;
                self.request.status = RequestStatus::Draft;
                self.request.current_step = Some(first);
            }
            SubmitIntent::Submit => {
                let approver_name = route.display_name_or_id(actor_id);
                let step1 = self.step_mut(first).ok_or(DomainError::EmptyRoute)?;
                step1.record_action(
                    StepStatus::Approved,
                    now,
                    comment,
                    actor_id.to_owned(),
                    approver_name,
                );

                let next = self
                    .steps
                    .iter()
                    .filter(|s| s.sequence > first)
                    .min_by_key(|s| s.sequence)
                    .map(|s| s.sequence);

                match next {
                    Some(next_sequence) => {
                        if let Some(next_step) = self.step_mut(next_sequence) {
                            next_step.status = StepStatus::Pending;
                        }
                        self.request.status = RequestStatus::Pending;
                        self.request.current_step = Some(next_sequence);
                    }
                    None => {
                        self.request.status = RequestStatus::Approved;
                        self.request.current_step = None;
                    }
                }
            }
        }

        Ok(())
    }

    fn authorize(
        &self,
        route: &RouteTemplate,
        sequence: u32,
        actor_id: &str,
    ) -> Result<(), DomainError> {
        if route.is_assigned(sequence, actor_id) {
            return Ok(());
        }

        let step_name = route
            .step(sequence)
            .map(|s| s.step_name.clone())
            .or_else(|| self.step(sequence).map(|s| s.step_name.clone()))
            .unwrap_or_default();
        Err(DomainError::NotAssigned { sequence, step_name })
    }
}

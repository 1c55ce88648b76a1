//! Application service tying the pieces together: fetch the live route from
//! the workflow gateway, run the in-memory state machine, persist the result
//! atomically.
//!
//! The gateway fetch always happens before any write. When the template
//! service is unreachable, mutating operations fail with
//! [`ApplicationError::Upstream`] rather than proceeding on stale or assumed
//! assignments; read-only views degrade to "no approval rights" instead.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use procura_core::{
    code_prefix, document_code, materialize, permissions, ApplicationError, AttachmentPayload,
    DomainError, NewAttachment, Permissions, PurchaseRequest, Quotation, RequestAggregate,
    RequestId, RequestSummary, RouteTemplate, SubmitIntent, TimelineAssignment, TimelineStep,
};
use procura_db::repositories::{
    QuotationDeltas, RepositoryError, RequestRepository, StatusCounts,
};
use procura_workflow::{GatewayError, WorkflowGateway};

pub struct RequestService {
    repository: Arc<dyn RequestRepository>,
    gateway: Arc<dyn WorkflowGateway>,
    default_route_id: i64,
}

/// Fields accepted when creating a new purchase request.
#[derive(Clone, Debug)]
pub struct CreateRequestCommand {
    pub title: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remark: Option<String>,
    pub comment: Option<String>,
    pub attachments: Vec<NewAttachment>,
}

/// Fields accepted when editing a Draft or Rejected request.
#[derive(Clone, Debug, Default)]
pub struct UpdateRequestCommand {
    pub title: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remark: Option<String>,
    pub comment: Option<String>,
    pub new_attachments: Vec<NewAttachment>,
    pub deleted_quotation_ids: Vec<i64>,
    /// (quotation id, new document type id) pairs.
    pub retyped: Vec<(i64, i64)>,
}

/// Everything the detail view needs in one payload.
#[derive(Clone, Debug, Serialize)]
pub struct RequestDetail {
    pub request: PurchaseRequest,
    pub quotations: Vec<Quotation>,
    pub timeline: Vec<TimelineStep>,
    pub permissions: Permissions,
}

fn from_gateway(error: GatewayError) -> ApplicationError {
    match error {
        GatewayError::Unavailable(message) => ApplicationError::Upstream(message),
    }
}

fn from_repository(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Conflict => ApplicationError::AlreadyProcessed,
        other => ApplicationError::Persistence(other.to_string()),
    }
}

fn build_detail(
    aggregate: RequestAggregate,
    route: Option<&RouteTemplate>,
    actor_id: &str,
) -> RequestDetail {
    let perms = permissions::compute(&aggregate, route, actor_id);
    let timeline = match route {
        Some(route) => permissions::merge_timeline(route, &aggregate, actor_id),
        // Template service down: render history from the stored step rows
        // alone, with no assignment lists.
        None => aggregate
            .steps
            .iter()
            .map(|step| TimelineStep {
                sequence: step.sequence,
                step_name: step.step_name.clone(),
                assignments: Vec::<TimelineAssignment>::new(),
                status: Some(step.status),
                acted_at: step.acted_at,
                comment: step.comment.clone(),
                approver_id: step.approver_id.clone(),
                approver_name: step.approver_name.clone(),
            })
            .collect(),
    };

    RequestDetail {
        request: aggregate.request,
        quotations: aggregate.quotations,
        timeline,
        permissions: perms,
    }
}

impl RequestService {
    pub fn new(
        repository: Arc<dyn RequestRepository>,
        gateway: Arc<dyn WorkflowGateway>,
        default_route_id: i64,
    ) -> Self {
        Self { repository, gateway, default_route_id }
    }

    pub async fn create(
        &self,
        correlation_id: &str,
        actor_id: &str,
        intent: SubmitIntent,
        command: CreateRequestCommand,
    ) -> Result<RequestDetail, ApplicationError> {
        let route = self
            .gateway
            .route(self.default_route_id)
            .await
            .map_err(from_gateway)?;

        if !route.can_initiate(actor_id) {
            let first = route
                .ordered_steps()
                .first()
                .map(|step| (step.sequence, step.step_name.clone()))
                .ok_or(ApplicationError::Domain(DomainError::EmptyRoute))?;
            return Err(DomainError::NotAssigned { sequence: first.0, step_name: first.1 }.into());
        }

        let now = Utc::now();
        let prefix = code_prefix(now.date_naive());
        let existing = self
            .repository
            .count_codes_with_prefix(&prefix)
            .await
            .map_err(from_repository)?;
        let code = document_code(&prefix, existing);

        let materialized =
            materialize(&route, intent, actor_id, command.comment.as_deref(), now)?;

        let aggregate = RequestAggregate {
            request: PurchaseRequest {
                id: RequestId(0),
                code: code.clone(),
                title: command.title,
                vendor_id: command.vendor_id,
                vendor_name: command.vendor_name,
                valid_from: command.valid_from,
                valid_until: command.valid_until,
                remark: command.remark,
                requested_at: now,
                created_by: actor_id.to_owned(),
                route_id: route.route_id,
                status: materialized.status,
                current_step: materialized.current_step,
            },
            steps: materialized.steps,
            quotations: Vec::new(),
        };

        let id = self
            .repository
            .create(&aggregate, &command.attachments)
            .await
            .map_err(from_repository)?;

        info!(
            event_name = "request.created",
            correlation_id,
            request_id = id.0,
            code = %code,
            status = aggregate.request.status.as_str(),
            "purchase request created"
        );

        self.load_detail(id, Some(&route), actor_id).await
    }

    pub async fn update(
        &self,
        correlation_id: &str,
        actor_id: &str,
        id: RequestId,
        intent: SubmitIntent,
        command: UpdateRequestCommand,
    ) -> Result<RequestDetail, ApplicationError> {
        let mut aggregate = self
            .repository
            .find_by_id(id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;

        let route = self
            .gateway
            .route(aggregate.request.route_id)
            .await
            .map_err(from_gateway)?;

        aggregate.resubmit(&route, actor_id, command.comment.clone(), intent, Utc::now())?;

        aggregate.request.title = command.title;
        aggregate.request.vendor_id = command.vendor_id;
        aggregate.request.vendor_name = command.vendor_name;
        aggregate.request.valid_from = command.valid_from;
        aggregate.request.valid_until = command.valid_until;
        aggregate.request.remark = command.remark;

        let deltas = QuotationDeltas {
            new_attachments: command.new_attachments,
            deleted_quotation_ids: command.deleted_quotation_ids,
            retyped: command.retyped,
        };
        self.repository.update_draft(&aggregate, &deltas).await.map_err(from_repository)?;

        info!(
            event_name = "request.updated",
            correlation_id,
            request_id = id.0,
            code = %aggregate.request.code,
            status = aggregate.request.status.as_str(),
            "purchase request updated"
        );

        self.load_detail(id, Some(&route), actor_id).await
    }

    pub async fn approve(
        &self,
        correlation_id: &str,
        actor_id: &str,
        id: RequestId,
        comment: Option<String>,
    ) -> Result<RequestDetail, ApplicationError> {
        let mut aggregate = self
            .repository
            .find_by_id(id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;

        let route = self
            .gateway
            .route(aggregate.request.route_id)
            .await
            .map_err(from_gateway)?;

        let decision = aggregate.approve(&route, actor_id, comment, Utc::now())?;
        self.repository
            .persist_decision(&aggregate, &decision)
            .await
            .map_err(from_repository)?;

        info!(
            event_name = "request.approved",
            correlation_id,
            request_id = id.0,
            code = %aggregate.request.code,
            sequence = decision.sequence,
            step_name = %decision.step_name,
            new_status = decision.new_status.as_str(),
            "approval recorded"
        );

        self.load_detail(id, Some(&route), actor_id).await
    }

    pub async fn reject(
        &self,
        correlation_id: &str,
        actor_id: &str,
        id: RequestId,
        comment: Option<String>,
    ) -> Result<RequestDetail, ApplicationError> {
        let mut aggregate = self
            .repository
            .find_by_id(id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;

        let route = self
            .gateway
            .route(aggregate.request.route_id)
            .await
            .map_err(from_gateway)?;

        let decision = aggregate.reject(&route, actor_id, comment, Utc::now())?;
        self.repository
            .persist_decision(&aggregate, &decision)
            .await
            .map_err(from_repository)?;

        info!(
            event_name = "request.rejected",
            correlation_id,
            request_id = id.0,
            code = %aggregate.request.code,
            sequence = decision.sequence,
            step_name = %decision.step_name,
            "rejection recorded"
        );

        self.load_detail(id, Some(&route), actor_id).await
    }

    pub async fn detail(
        &self,
        correlation_id: &str,
        actor_id: &str,
        id: RequestId,
    ) -> Result<RequestDetail, ApplicationError> {
        let aggregate = self
            .repository
            .find_by_id(id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;

        let route = self.fetch_route_lenient(correlation_id, aggregate.request.route_id).await;
        Ok(build_detail(aggregate, route.as_ref(), actor_id))
    }

    pub async fn detail_by_code(
        &self,
        correlation_id: &str,
        actor_id: &str,
        code: &str,
    ) -> Result<RequestDetail, ApplicationError> {
        let aggregate = self
            .repository
            .find_by_code(code)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;

        let route = self.fetch_route_lenient(correlation_id, aggregate.request.route_id).await;
        Ok(build_detail(aggregate, route.as_ref(), actor_id))
    }

    pub async fn my_requests(
        &self,
        actor_id: &str,
    ) -> Result<Vec<RequestSummary>, ApplicationError> {
        self.repository.list_mine(actor_id).await.map_err(from_repository)
    }

    /// Pending documents waiting on a step the actor is assigned to.
    /// Assignments are resolved against each document's own stored route id,
    /// so requests created under an earlier default route still land in the
    /// right queue. Needs live routes; when the template service is down
    /// there is no way to confirm assignments, so the whole listing is
    /// refused.
    pub async fn pending_approvals(
        &self,
        actor_id: &str,
    ) -> Result<Vec<RequestSummary>, ApplicationError> {
        let route_ids = self.repository.pending_route_ids().await.map_err(from_repository)?;

        let mut results = Vec::new();
        for route_id in route_ids {
            let route = self.gateway.route(route_id).await.map_err(from_gateway)?;

            let sequences: Vec<u32> = route
                .ordered_steps()
                .into_iter()
                .filter(|step| route.is_assigned(step.sequence, actor_id))
                .map(|step| step.sequence)
                .collect();
            if sequences.is_empty() {
                continue;
            }

            results.extend(
                self.repository
                    .list_pending_for_steps(route_id, &sequences)
                    .await
                    .map_err(from_repository)?,
            );
        }

        results.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(results)
    }

    pub async fn approved_requests(&self) -> Result<Vec<RequestSummary>, ApplicationError> {
        self.repository.list_approved().await.map_err(from_repository)
    }

    pub async fn attachment(
        &self,
        quotation_id: procura_core::QuotationId,
    ) -> Result<AttachmentPayload, ApplicationError> {
        self.repository
            .read_attachment(quotation_id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)
    }

    pub async fn dashboard(&self) -> Result<StatusCounts, ApplicationError> {
        self.repository.status_counts().await.map_err(from_repository)
    }

    async fn load_detail(
        &self,
        id: RequestId,
        route: Option<&RouteTemplate>,
        actor_id: &str,
    ) -> Result<RequestDetail, ApplicationError> {
        let aggregate = self
            .repository
            .find_by_id(id)
            .await
            .map_err(from_repository)?
            .ok_or(ApplicationError::NotFound)?;
        Ok(build_detail(aggregate, route, actor_id))
    }

    /// Route fetch for read-only views: a gateway failure degrades to `None`
    /// (no approval rights shown) instead of failing the whole view.
    async fn fetch_route_lenient(
        &self,
        correlation_id: &str,
        route_id: i64,
    ) -> Option<RouteTemplate> {
        match self.gateway.route(route_id).await {
            Ok(route) => Some(route),
            Err(error) => {
                warn!(
                    event_name = "workflow.route_fetch_degraded",
                    correlation_id,
                    route_id,
                    error = %error,
                    "route unavailable; rendering detail without assignments"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use procura_core::{
        ApplicationError, DomainError, QuotationId, RequestStatus, StepStatus, SubmitIntent,
        DOCUMENT_TYPE_OTHER,
    };
    use procura_db::repositories::SqlRequestRepository;
    use procura_db::{connect_with_settings, migrations};
    use procura_workflow::fixtures::{purchase_route, single_step_route};
    use procura_workflow::StaticWorkflowGateway;

    use super::{CreateRequestCommand, RequestService, UpdateRequestCommand};

    async fn setup() -> (RequestService, Arc<StaticWorkflowGateway>) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let gateway = Arc::new(StaticWorkflowGateway::single(purchase_route()));
        let route_id = purchase_route().route_id;
        let service = RequestService::new(
            Arc::new(SqlRequestRepository::new(pool)),
            gateway.clone(),
            route_id,
        );
        (service, gateway)
    }

    fn create_command() -> CreateRequestCommand {
        CreateRequestCommand {
            title: "Ergonomic chairs, floor 4".to_string(),
            vendor_id: 42,
            vendor_name: "Initech Supply".to_string(),
            valid_from: None,
            valid_until: None,
            remark: None,
            comment: Some("please expedite".to_string()),
            attachments: Vec::new(),
        }
    }

    fn update_command() -> UpdateRequestCommand {
        UpdateRequestCommand {
            title: "Ergonomic chairs, floors 4 and 5".to_string(),
            vendor_id: 42,
            vendor_name: "Initech Supply".to_string(),
            comment: Some("revised quantity".to_string()),
            ..UpdateRequestCommand::default()
        }
    }

    #[tokio::test]
    async fn submit_materializes_steps_and_numbers_the_document() {
        let (service, _) = setup().await;

        let detail = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        assert!(detail.request.code.starts_with("QC-"));
        assert!(detail.request.code.ends_with("-001"));
        assert_eq!(detail.request.status, RequestStatus::Pending);
        assert_eq!(detail.request.current_step, Some(2));
        assert_eq!(detail.timeline.len(), 3);
        assert_eq!(detail.timeline[0].status, Some(StepStatus::Approved));
        assert_eq!(detail.timeline[0].approver_name.as_deref(), Some("Arthit S."));
        assert_eq!(detail.timeline[1].status, Some(StepStatus::Pending));
        assert_eq!(detail.timeline[2].status, Some(StepStatus::NotReached));

        // Creator of a submitted request can neither approve nor edit it.
        assert!(!detail.permissions.can_approve);
        assert!(!detail.permissions.can_edit);

        let second = service
            .create("t-2", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("second create");
        assert!(second.request.code.ends_with("-002"), "running number increments");
    }

    #[tokio::test]
    async fn save_keeps_the_document_as_an_editable_draft() {
        let (service, _) = setup().await;

        let detail = service
            .create("t-1", "u100", SubmitIntent::Save, create_command())
            .await
            .expect("create");

        assert_eq!(detail.request.status, RequestStatus::Draft);
        assert_eq!(detail.request.current_step, Some(1));
        assert_eq!(detail.timeline[0].status, Some(StepStatus::Pending));
        assert!(detail.permissions.can_edit);
        assert!(!detail.permissions.can_approve);
    }

    #[tokio::test]
    async fn submitting_on_a_single_step_route_fully_approves() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let service = RequestService::new(
            Arc::new(SqlRequestRepository::new(pool)),
            Arc::new(StaticWorkflowGateway::single(single_step_route(5))),
            5,
        );

        let detail = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        assert_eq!(detail.request.status, RequestStatus::Approved);
        assert_eq!(detail.request.current_step, None);
        assert_eq!(detail.request.route_id, 5);

        let queue = service.pending_approvals("u100").await.expect("queue");
        assert!(queue.is_empty(), "nothing waits on an already-approved document");
    }

    #[tokio::test]
    async fn approvals_walk_the_chain_to_full_approval() {
        let (service, _) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");
        let id = created.request.id;

        let after_manager = service
            .approve("t-2", "u200", id, Some("within budget".to_string()))
            .await
            .expect("manager approves");
        assert_eq!(after_manager.request.status, RequestStatus::Pending);
        assert_eq!(after_manager.request.current_step, Some(3));
        assert_eq!(after_manager.timeline[1].status, Some(StepStatus::Approved));
        assert_eq!(after_manager.timeline[1].approver_name.as_deref(), Some("Benjamas K."));
        assert_eq!(after_manager.timeline[2].status, Some(StepStatus::Pending));

        let after_head = service
            .approve("t-3", "u300", id, None)
            .await
            .expect("head approves");
        assert_eq!(after_head.request.status, RequestStatus::Approved);
        assert_eq!(after_head.request.current_step, None);
    }

    #[tokio::test]
    async fn unassigned_actor_cannot_approve() {
        let (service, _) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        let error = service
            .approve("t-2", "u999", created.request.id, None)
            .await
            .expect_err("stranger denied");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NotAssigned { sequence: 2, .. })
        ));

        // Denied action must leave the stored request untouched.
        let detail = service.detail("t-3", "u100", created.request.id).await.expect("detail");
        assert_eq!(detail.request.current_step, Some(2));
        assert_eq!(detail.timeline[1].status, Some(StepStatus::Pending));
    }

    #[tokio::test]
    async fn rejection_cancels_every_downstream_step() {
        let (service, _) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        let rejected = service
            .reject("t-2", "u200", created.request.id, Some("over budget".to_string()))
            .await
            .expect("manager rejects");

        assert_eq!(rejected.request.status, RequestStatus::Rejected);
        assert_eq!(rejected.request.current_step, None);
        assert_eq!(rejected.timeline[1].status, Some(StepStatus::Rejected));
        assert_eq!(rejected.timeline[1].comment.as_deref(), Some("over budget"));
        assert_eq!(rejected.timeline[2].status, Some(StepStatus::Cancelled));
    }

    #[tokio::test]
    async fn creator_can_edit_and_resubmit_a_rejected_request() {
        let (service, _) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");
        let id = created.request.id;

        service.reject("t-2", "u200", id, None).await.expect("reject");

        let resubmitted = service
            .update("t-3", "u100", id, SubmitIntent::Submit, update_command())
            .await
            .expect("resubmit");

        assert_eq!(resubmitted.request.title, "Ergonomic chairs, floors 4 and 5");
        assert_eq!(resubmitted.request.status, RequestStatus::Pending);
        assert_eq!(resubmitted.request.current_step, Some(2));
        assert_eq!(resubmitted.timeline[1].status, Some(StepStatus::Pending));
        assert_eq!(resubmitted.timeline[1].approver_name, None, "stale approver cleared");
        assert_eq!(resubmitted.timeline[2].status, Some(StepStatus::NotReached));

        // And the chain is fully traversable again.
        service.approve("t-4", "u200", id, None).await.expect("manager approves");
        let done = service.approve("t-5", "u300", id, None).await.expect("head approves");
        assert_eq!(done.request.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn actor_outside_the_first_step_cannot_create() {
        let (service, _) = setup().await;

        let error = service
            .create("t-1", "u999", SubmitIntent::Submit, create_command())
            .await
            .expect_err("not an initiator");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NotAssigned { sequence: 1, .. })
        ));
    }

    #[tokio::test]
    async fn only_the_creator_may_edit() {
        let (service, _) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Save, create_command())
            .await
            .expect("create");

        let error = service
            .update("t-2", "u200", created.request.id, SubmitIntent::Save, update_command())
            .await
            .expect_err("non-owner denied");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NotRequestOwner)
        ));
    }

    #[tokio::test]
    async fn mutations_refuse_when_the_template_service_is_down() {
        let (service, gateway) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        gateway.set_unavailable(true);

        let error = service
            .approve("t-2", "u200", created.request.id, None)
            .await
            .expect_err("fail closed");
        assert!(matches!(error, ApplicationError::Upstream(_)));

        let error = service
            .create("t-3", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect_err("create also refuses");
        assert!(matches!(error, ApplicationError::Upstream(_)));

        // Detail still renders, with every action denied.
        let detail = service.detail("t-4", "u200", created.request.id).await.expect("detail");
        assert!(!detail.permissions.can_approve);
        assert!(!detail.permissions.can_reject);
        assert!(detail.timeline.iter().all(|step| step.assignments.is_empty()));
    }

    #[tokio::test]
    async fn pending_approvals_lists_only_documents_on_my_step() {
        let (service, gateway) = setup().await;
        let created = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");
        service.create("t-2", "u100", SubmitIntent::Save, create_command()).await.expect("draft");

        let manager_queue = service.pending_approvals("u200").await.expect("manager queue");
        assert_eq!(manager_queue.len(), 1);
        assert_eq!(manager_queue[0].id, created.request.id);
        assert_eq!(manager_queue[0].requester_name.as_deref(), Some("Arthit S."));

        let head_queue = service.pending_approvals("u300").await.expect("head queue");
        assert!(head_queue.is_empty(), "step 3 not reached yet");

        gateway.set_unavailable(true);
        let error = service.pending_approvals("u200").await.expect_err("fail closed");
        assert!(matches!(error, ApplicationError::Upstream(_)));
    }

    #[tokio::test]
    async fn pending_queue_resolves_assignments_per_stored_route() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let mut legacy_route = purchase_route();
        legacy_route.route_id = 9;
        legacy_route.steps[1].assignments = vec![procura_core::Assignment {
            actor_id: "u500".to_string(),
            display_name: "Ekkachai T.".to_string(),
        }];

        let service = RequestService::new(
            Arc::new(SqlRequestRepository::new(pool.clone())),
            Arc::new(StaticWorkflowGateway::new(vec![purchase_route(), legacy_route])),
            1,
        );

        let current = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");
        let moved = service
            .create("t-2", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("create");

        // A document created before the default route changed keeps its
        // original route id.
        sqlx::query("UPDATE purchase_request SET route_id = 9 WHERE id = ?")
            .bind(moved.request.id.0)
            .execute(&pool)
            .await
            .expect("rewrite route");

        let manager_queue = service.pending_approvals("u200").await.expect("u200 queue");
        assert_eq!(manager_queue.len(), 1);
        assert_eq!(manager_queue[0].id, current.request.id);

        let legacy_queue = service.pending_approvals("u500").await.expect("u500 queue");
        assert_eq!(legacy_queue.len(), 1);
        assert_eq!(legacy_queue[0].id, moved.request.id);
    }

    #[tokio::test]
    async fn attachments_round_trip_and_unknown_ids_are_not_found() {
        let (service, _) = setup().await;
        let mut command = create_command();
        command.attachments.push(procura_core::NewAttachment {
            file_name: "initech-quote.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            document_type_id: DOCUMENT_TYPE_OTHER,
            data: b"%PDF-1.4 sample".to_vec(),
        });

        let detail = service
            .create("t-1", "u100", SubmitIntent::Submit, command)
            .await
            .expect("create");
        assert_eq!(detail.quotations.len(), 1);

        let payload = service.attachment(detail.quotations[0].id).await.expect("download");
        assert_eq!(payload.file_name, "initech-quote.pdf");
        assert_eq!(payload.data, b"%PDF-1.4 sample".to_vec());

        let error = service.attachment(QuotationId(9999)).await.expect_err("unknown id");
        assert!(matches!(error, ApplicationError::NotFound));
    }

    #[tokio::test]
    async fn lists_and_dashboard_reflect_request_states() {
        let (service, _) = setup().await;
        let submitted = service
            .create("t-1", "u100", SubmitIntent::Submit, create_command())
            .await
            .expect("submitted");
        service.create("t-2", "u100", SubmitIntent::Save, create_command()).await.expect("draft");

        let mine = service.my_requests("U100").await.expect("mine");
        assert_eq!(mine.len(), 2, "creator match ignores case");

        service.approve("t-3", "u200", submitted.request.id, None).await.expect("manager");
        service.approve("t-4", "u300", submitted.request.id, None).await.expect("head");

        let approved = service.approved_requests().await.expect("approved");
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, submitted.request.id);

        let counts = service.dashboard().await.expect("dashboard");
        assert_eq!(counts.approved, 1);
        assert_eq!(counts.draft, 1);
        assert_eq!(counts.pending, 0);
    }

    #[tokio::test]
    async fn unknown_request_id_is_not_found() {
        let (service, _) = setup().await;
        let error = service
            .detail("t-1", "u100", procura_core::RequestId(404))
            .await
            .expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound));
    }
}

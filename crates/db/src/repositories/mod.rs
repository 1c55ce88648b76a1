use async_trait::async_trait;
use thiserror::Error;

use procura_core::{
    AttachmentPayload, Decision, NewAttachment, QuotationId, RequestAggregate, RequestId,
    RequestSummary,
};

pub mod request;

pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("step is no longer in its expected status")]
    Conflict,
}

/// Attachment changes arriving with a draft update.
#[derive(Clone, Debug, Default)]
pub struct QuotationDeltas {
    pub new_attachments: Vec<NewAttachment>,
    pub deleted_quotation_ids: Vec<i64>,
    /// (quotation id, new document type id) pairs.
    pub retyped: Vec<(i64, i64)>,
}

/// Per-status document counts for the dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub draft: i64,
    pub pending: i64,
    pub approved: i64,
    pub completed: i64,
    pub rejected: i64,
    pub cancelled: i64,
}

/// Persistence for the Request aggregate (request + steps + quotations +
/// attachment blobs). Every mutating method is one transaction; partial
/// application is never observable.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn create(
        &self,
        aggregate: &RequestAggregate,
        attachments: &[NewAttachment],
    ) -> Result<RequestId, RepositoryError>;

    async fn find_by_id(&self, id: RequestId)
        -> Result<Option<RequestAggregate>, RepositoryError>;

    async fn find_by_code(&self, code: &str)
        -> Result<Option<RequestAggregate>, RepositoryError>;

    /// Count of document codes sharing a prefix, feeding the running number.
    async fn count_codes_with_prefix(&self, prefix: &str) -> Result<u32, RepositoryError>;

    /// Persists an approve/reject outcome. Inside the transaction the
    /// acted-on step is re-checked against `decision.prior_status` via a
    /// guarded UPDATE; if another transaction got there first, the whole
    /// write rolls back with [`RepositoryError::Conflict`].
    async fn persist_decision(
        &self,
        aggregate: &RequestAggregate,
        decision: &Decision,
    ) -> Result<(), RepositoryError>;

    /// Rewrites an edited draft: header fields, step rows, and quotation
    /// deltas (deletes, retypes, new uploads) in one transaction.
    async fn update_draft(
        &self,
        aggregate: &RequestAggregate,
        deltas: &QuotationDeltas,
    ) -> Result<(), RepositoryError>;

    async fn list_mine(&self, actor_id: &str) -> Result<Vec<RequestSummary>, RepositoryError>;

    /// Distinct route ids carried by pending documents. Requests created
    /// under an earlier default route keep their own id, so the approval
    /// queue resolves assignments per route.
    async fn pending_route_ids(&self) -> Result<Vec<i64>, RepositoryError>;

    /// Pending documents on `route_id` whose current step is one of
    /// `sequences`.
    async fn list_pending_for_steps(
        &self,
        route_id: i64,
        sequences: &[u32],
    ) -> Result<Vec<RequestSummary>, RepositoryError>;

    async fn list_approved(&self) -> Result<Vec<RequestSummary>, RepositoryError>;

    async fn read_attachment(
        &self,
        quotation_id: QuotationId,
    ) -> Result<Option<AttachmentPayload>, RepositoryError>;

    async fn status_counts(&self) -> Result<StatusCounts, RepositoryError>;
}

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod materializer;
pub mod permissions;

pub use domain::quotation::{
    AttachmentPayload, NewAttachment, Quotation, QuotationId, DOCUMENT_TYPE_OTHER,
};
pub use domain::request::{
    code_prefix, document_code, PurchaseRequest, RequestAggregate, RequestId, RequestStatus,
    RequestSummary,
};
pub use domain::route::{Assignment, RouteStep, RouteTemplate};
pub use domain::step::{ApprovalStep, StepStatus};
pub use engine::Decision;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use materializer::{materialize, MaterializedRequest, SubmitIntent};
pub use permissions::{Permissions, TimelineAssignment, TimelineStep};

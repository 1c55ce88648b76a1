use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::Quotation;
use crate::domain::step::{ApprovalStep, StepStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub i64);

/// Status of the purchase request document as a whole.
///
/// `Completed` is a downstream milestone (document generation); the state
/// machine reads it as final but never writes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Completed,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Document is still moving through the workflow.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }

    pub fn is_final(&self) -> bool {
        !self.is_active()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    /// Human-readable document number, e.g. `QC-20250830-003`.
    pub code: String,
    pub title: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remark: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub created_by: String,
    /// Workflow route this request was created against. Fixed per request at
    /// creation time; authorization always consults this route.
    pub route_id: i64,
    pub status: RequestStatus,
    /// Sequence number of the step whose turn it is, `None` once no
    /// actionable step remains (terminal).
    pub current_step: Option<u32>,
}

/// The consistency unit: request header plus its approval steps and attached
/// quotations. Loaded and persisted as one transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestAggregate {
    pub request: PurchaseRequest,
    pub steps: Vec<ApprovalStep>,
    pub quotations: Vec<Quotation>,
}

impl RequestAggregate {
    /// Step currently awaiting action: lowest sequence with status Pending.
    pub fn pending_step(&self) -> Option<&ApprovalStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .min_by_key(|s| s.sequence)
    }

    pub fn step(&self, sequence: u32) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.sequence == sequence)
    }

    pub fn step_mut(&mut self, sequence: u32) -> Option<&mut ApprovalStep> {
        self.steps.iter_mut().find(|s| s.sequence == sequence)
    }
}

/// Summary row for list endpoints; approval steps and attachments are not
/// hydrated here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub code: String,
    pub title: String,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub current_step: Option<u32>,
    pub vendor_name: String,
    /// Name recorded on step 1, i.e. whoever submitted the document.
    pub requester_name: Option<String>,
}

/// Document-number prefix for a given day: `QC-<yyyymmdd>-`.
pub fn code_prefix(date: NaiveDate) -> String {
    format!("QC-{}-", date.format("%Y%m%d"))
}

/// Formats the running number for a new document. `existing` is the count of
/// codes already sharing the prefix; uniqueness is best-effort
/// (count-then-format, not a reserved sequence).
pub fn document_code(prefix: &str, existing: u32) -> String {
    format!("{prefix}{:03}", existing + 1)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{code_prefix, document_code, RequestStatus};

    #[test]
    fn code_prefix_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 30).expect("valid date");
        assert_eq!(code_prefix(date), "QC-20250830-");
    }

    #[test]
    fn document_code_zero_pads_running_number() {
        assert_eq!(document_code("QC-20250830-", 0), "QC-20250830-001");
        assert_eq!(document_code("QC-20250830-", 2), "QC-20250830-003");
        assert_eq!(document_code("QC-20250830-", 99), "QC-20250830-100");
        assert_eq!(document_code("QC-20250830-", 999), "QC-20250830-1000");
    }

    #[test]
    fn active_and_final_statuses_partition() {
        assert!(RequestStatus::Draft.is_active());
        assert!(RequestStatus::Pending.is_active());
        assert!(RequestStatus::Approved.is_final());
        assert!(RequestStatus::Completed.is_final());
        assert!(RequestStatus::Rejected.is_final());
        assert!(RequestStatus::Cancelled.is_final());
    }
}

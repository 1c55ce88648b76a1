use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single approval step, distinct from the request-level status.
/// `NotReached` means the workflow has not arrived at this step yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotReached,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReached => "not_reached",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One row per workflow-template step, scoped to one request. Approver
/// identity is recorded only at the moment of action, never pre-assigned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// 1-based, matches the template's sequence number.
    pub sequence: u32,
    pub step_name: String,
    pub status: StepStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub approver_id: Option<String>,
    pub approver_name: Option<String>,
}

impl ApprovalStep {
    pub fn not_reached(sequence: u32, step_name: impl Into<String>) -> Self {
        Self {
            sequence,
            step_name: step_name.into(),
            status: StepStatus::NotReached,
            acted_at: None,
            comment: None,
            approver_id: None,
            approver_name: None,
        }
    }

    /// Drops any action data left over from a prior cycle and returns the
    /// step to `NotReached`. Used when a rejected document is edited and
    /// re-enters the pipeline.
    pub fn reset(&mut self) {
        self.status = StepStatus::NotReached;
        self.acted_at = None;
        self.comment = None;
        self.approver_id = None;
        self.approver_name = None;
    }

    pub fn record_action(
        &mut self,
        status: StepStatus,
        acted_at: DateTime<Utc>,
        comment: Option<String>,
        approver_id: String,
        approver_name: String,
    ) {
        self.status = status;
        self.acted_at = Some(acted_at);
        self.comment = comment;
        self.approver_id = Some(approver_id);
        self.approver_name = Some(approver_name);
    }
}

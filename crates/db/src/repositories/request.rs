use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Row};

use procura_core::{
    ApprovalStep, AttachmentPayload, Decision, NewAttachment, PurchaseRequest, Quotation,
    QuotationId, RequestAggregate, RequestId, RequestStatus, RequestSummary, StepStatus,
};

use super::{QuotationDeltas, RepositoryError, RequestRepository, StatusCounts};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_request_status(s: &str) -> RequestStatus {
    match s {
        "pending" => RequestStatus::Pending,
        "approved" => RequestStatus::Approved,
        "completed" => RequestStatus::Completed,
        "rejected" => RequestStatus::Rejected,
        "cancelled" => RequestStatus::Cancelled,
        _ => RequestStatus::Draft,
    }
}

fn parse_step_status(s: &str) -> StepStatus {
    match s {
        "pending" => StepStatus::Pending,
        "approved" => StepStatus::Approved,
        "rejected" => StepStatus::Rejected,
        "cancelled" => StepStatus::Cancelled,
        _ => StepStatus::NotReached,
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>, RepositoryError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| RepositoryError::Decode(format!("bad date `{s}`: {e}")))
    })
    .transpose()
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let code: String = decode(row.try_get("code"))?;
    let title: String = decode(row.try_get("title"))?;
    let vendor_id: i64 = decode(row.try_get("vendor_id"))?;
    let vendor_name: String = decode(row.try_get("vendor_name"))?;
    let valid_from: Option<String> = decode(row.try_get("valid_from"))?;
    let valid_until: Option<String> = decode(row.try_get("valid_until"))?;
    let remark: Option<String> = decode(row.try_get("remark"))?;
    let requested_at: String = decode(row.try_get("requested_at"))?;
    let created_by: String = decode(row.try_get("created_by"))?;
    let route_id: i64 = decode(row.try_get("route_id"))?;
    let status: String = decode(row.try_get("status"))?;
    let current_step: Option<i64> = decode(row.try_get("current_step"))?;

    Ok(PurchaseRequest {
        id: RequestId(id),
        code,
        title,
        vendor_id,
        vendor_name,
        valid_from: parse_date(valid_from)?,
        valid_until: parse_date(valid_until)?,
        remark,
        requested_at: parse_datetime(&requested_at)?,
        created_by,
        route_id,
        status: parse_request_status(&status),
        current_step: current_step.map(|s| s as u32),
    })
}

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let sequence: i64 = decode(row.try_get("sequence"))?;
    let step_name: String = decode(row.try_get("step_name"))?;
    let status: String = decode(row.try_get("status"))?;
    let acted_at: Option<String> = decode(row.try_get("acted_at"))?;
    let comment: Option<String> = decode(row.try_get("comment"))?;
    let approver_id: Option<String> = decode(row.try_get("approver_id"))?;
    let approver_name: Option<String> = decode(row.try_get("approver_name"))?;

    Ok(ApprovalStep {
        sequence: sequence as u32,
        step_name,
        status: parse_step_status(&status),
        acted_at: acted_at.as_deref().map(parse_datetime).transpose()?,
        comment,
        approver_id,
        approver_name,
    })
}

fn row_to_quotation(row: &sqlx::sqlite::SqliteRow) -> Result<Quotation, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let file_name: String = decode(row.try_get("file_name"))?;
    let content_type: String = decode(row.try_get("content_type"))?;
    let file_size: i64 = decode(row.try_get("file_size"))?;
    let document_type_id: i64 = decode(row.try_get("document_type_id"))?;
    let uploaded_at: String = decode(row.try_get("uploaded_at"))?;

    Ok(Quotation {
        id: QuotationId(id),
        file_name,
        content_type,
        file_size,
        document_type_id,
        uploaded_at: parse_datetime(&uploaded_at)?,
    })
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<RequestSummary, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let code: String = decode(row.try_get("code"))?;
    let title: String = decode(row.try_get("title"))?;
    let requested_at: String = decode(row.try_get("requested_at"))?;
    let status: String = decode(row.try_get("status"))?;
    let current_step: Option<i64> = decode(row.try_get("current_step"))?;
    let vendor_name: String = decode(row.try_get("vendor_name"))?;
    let requester_name: Option<String> = decode(row.try_get("requester_name"))?;

    Ok(RequestSummary {
        id: RequestId(id),
        code,
        title,
        requested_at: parse_datetime(&requested_at)?,
        status: parse_request_status(&status),
        current_step: current_step.map(|s| s as u32),
        vendor_name,
        requester_name,
    })
}

const SUMMARY_SELECT: &str = "SELECT r.id, r.code, r.title, r.requested_at, r.status, \
                              r.current_step, r.vendor_name, \
                              (SELECT s.approver_name FROM approval_step s \
                               WHERE s.request_id = r.id AND s.sequence = 1) AS requester_name \
                              FROM purchase_request r";

async fn write_step(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request_id: i64,
    step: &ApprovalStep,
    expected_prior: Option<StepStatus>,
) -> Result<u64, RepositoryError> {
    let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
        "UPDATE approval_step SET status = ",
    );
    builder.push_bind(step.status.as_str());
    builder.push(", acted_at = ");
    builder.push_bind(step.acted_at.map(|dt| dt.to_rfc3339()));
    builder.push(", comment = ");
    builder.push_bind(step.comment.as_deref());
    builder.push(", approver_id = ");
    builder.push_bind(step.approver_id.as_deref());
    builder.push(", approver_name = ");
    builder.push_bind(step.approver_name.as_deref());
    builder.push(" WHERE request_id = ");
    builder.push_bind(request_id);
    builder.push(" AND sequence = ");
    builder.push_bind(step.sequence as i64);
    if let Some(prior) = expected_prior {
        builder.push(" AND status = ");
        builder.push_bind(prior.as_str());
    }

    let result = builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

async fn insert_quotation(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request_id: i64,
    attachment: &NewAttachment,
    uploaded_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let file_id = sqlx::query("INSERT INTO attachment_file (data) VALUES (?)")
        .bind(attachment.data.as_slice())
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

    sqlx::query(
        "INSERT INTO quotation (request_id, attachment_file_id, file_name, content_type, \
                                file_size, document_type_id, uploaded_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(request_id)
    .bind(file_id)
    .bind(&attachment.file_name)
    .bind(&attachment.content_type)
    .bind(attachment.data.len() as i64)
    .bind(attachment.document_type_id)
    .bind(uploaded_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn update_request_header(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request: &PurchaseRequest,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE purchase_request SET title = ?, vendor_id = ?, vendor_name = ?, valid_from = ?, \
                                     valid_until = ?, remark = ?, status = ?, current_step = ? \
         WHERE id = ?",
    )
    .bind(&request.title)
    .bind(request.vendor_id)
    .bind(&request.vendor_name)
    .bind(request.valid_from.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(request.valid_until.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(request.remark.as_deref())
    .bind(request.status.as_str())
    .bind(request.current_step.map(|s| s as i64))
    .bind(request.id.0)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn create(
        &self,
        aggregate: &RequestAggregate,
        attachments: &[NewAttachment],
    ) -> Result<RequestId, RepositoryError> {
        let request = &aggregate.request;
        let mut tx = self.pool.begin().await?;

        let request_id = sqlx::query(
            "INSERT INTO purchase_request (code, title, vendor_id, vendor_name, valid_from, \
                                           valid_until, remark, requested_at, created_by, \
                                           route_id, status, current_step) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.code)
        .bind(&request.title)
        .bind(request.vendor_id)
        .bind(&request.vendor_name)
        .bind(request.valid_from.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(request.valid_until.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(request.remark.as_deref())
        .bind(request.requested_at.to_rfc3339())
        .bind(&request.created_by)
        .bind(request.route_id)
        .bind(request.status.as_str())
        .bind(request.current_step.map(|s| s as i64))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for step in &aggregate.steps {
            sqlx::query(
                "INSERT INTO approval_step (request_id, sequence, step_name, status, acted_at, \
                                            comment, approver_id, approver_name) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(request_id)
            .bind(step.sequence as i64)
            .bind(&step.step_name)
            .bind(step.status.as_str())
            .bind(step.acted_at.map(|dt| dt.to_rfc3339()))
            .bind(step.comment.as_deref())
            .bind(step.approver_id.as_deref())
            .bind(step.approver_name.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        for attachment in attachments {
            insert_quotation(&mut tx, request_id, attachment, request.requested_at).await?;
        }

        tx.commit().await?;
        Ok(RequestId(request_id))
    }

    async fn find_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<RequestAggregate>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, code, title, vendor_id, vendor_name, valid_from, valid_until, remark, \
                    requested_at, created_by, route_id, status, current_step \
             FROM purchase_request WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let request = match row {
            Some(ref r) => row_to_request(r)?,
            None => return Ok(None),
        };

        let step_rows = sqlx::query(
            "SELECT sequence, step_name, status, acted_at, comment, approver_id, approver_name \
             FROM approval_step WHERE request_id = ? ORDER BY sequence ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        let steps =
            step_rows.iter().map(row_to_step).collect::<Result<Vec<_>, RepositoryError>>()?;

        let quotation_rows = sqlx::query(
            "SELECT id, file_name, content_type, file_size, document_type_id, uploaded_at \
             FROM quotation WHERE request_id = ? ORDER BY id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;
        let quotations = quotation_rows
            .iter()
            .map(row_to_quotation)
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(RequestAggregate { request, steps, quotations }))
    }

    async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<RequestAggregate>, RepositoryError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM purchase_request WHERE code = ?")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.find_by_id(RequestId(id)).await,
            None => Ok(None),
        }
    }

    async fn count_codes_with_prefix(&self, prefix: &str) -> Result<u32, RepositoryError> {
        let pattern = format!("{prefix}%");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchase_request WHERE code LIKE ?")
                .bind(pattern)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u32)
    }

    async fn persist_decision(
        &self,
        aggregate: &RequestAggregate,
        decision: &Decision,
    ) -> Result<(), RepositoryError> {
        let request_id = aggregate.request.id.0;
        let acted_step = aggregate
            .step(decision.sequence)
            .ok_or_else(|| RepositoryError::Decode(format!("step {} missing", decision.sequence)))?;

        let mut tx = self.pool.begin().await?;

        // Guard: the acted-on step must still hold its pre-action status.
        // Zero rows means another transaction processed it first.
        let affected =
            write_step(&mut tx, request_id, acted_step, Some(decision.prior_status)).await?;
        if affected == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict);
        }

        for step in aggregate.steps.iter().filter(|s| s.sequence != decision.sequence) {
            write_step(&mut tx, request_id, step, None).await?;
        }

        update_request_header(&mut tx, &aggregate.request).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_draft(
        &self,
        aggregate: &RequestAggregate,
        deltas: &QuotationDeltas,
    ) -> Result<(), RepositoryError> {
        let request_id = aggregate.request.id.0;
        let mut tx = self.pool.begin().await?;

        update_request_header(&mut tx, &aggregate.request).await?;

        for step in &aggregate.steps {
            write_step(&mut tx, request_id, step, None).await?;
        }

        for quotation_id in &deltas.deleted_quotation_ids {
            let file_id: Option<i64> = sqlx::query_scalar(
                "SELECT attachment_file_id FROM quotation WHERE id = ? AND request_id = ?",
            )
            .bind(quotation_id)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(file_id) = file_id {
                sqlx::query("DELETE FROM quotation WHERE id = ? AND request_id = ?")
                    .bind(quotation_id)
                    .bind(request_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM attachment_file WHERE id = ?")
                    .bind(file_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (quotation_id, document_type_id) in &deltas.retyped {
            sqlx::query(
                "UPDATE quotation SET document_type_id = ? WHERE id = ? AND request_id = ?",
            )
            .bind(document_type_id)
            .bind(quotation_id)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        }

        for attachment in &deltas.new_attachments {
            insert_quotation(&mut tx, request_id, attachment, Utc::now()).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_mine(&self, actor_id: &str) -> Result<Vec<RequestSummary>, RepositoryError> {
        let sql = format!(
            "{SUMMARY_SELECT} WHERE LOWER(r.created_by) = LOWER(?) ORDER BY r.requested_at DESC"
        );
        let rows = sqlx::query(&sql).bind(actor_id).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn pending_route_ids(&self) -> Result<Vec<i64>, RepositoryError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT route_id FROM purchase_request \
             WHERE status = 'pending' ORDER BY route_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_pending_for_steps(
        &self,
        route_id: i64,
        sequences: &[u32],
    ) -> Result<Vec<RequestSummary>, RepositoryError> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(SUMMARY_SELECT);
        builder.push(" WHERE r.status = 'pending' AND r.route_id = ");
        builder.push_bind(route_id);
        builder.push(" AND r.current_step IN (");
        let mut separated = builder.separated(", ");
        for sequence in sequences {
            separated.push_bind(*sequence as i64);
        }
        builder.push(") ORDER BY r.requested_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn list_approved(&self) -> Result<Vec<RequestSummary>, RepositoryError> {
        let sql = format!(
            "{SUMMARY_SELECT} WHERE r.status IN ('approved', 'completed') \
             ORDER BY r.requested_at DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn read_attachment(
        &self,
        quotation_id: QuotationId,
    ) -> Result<Option<AttachmentPayload>, RepositoryError> {
        let row = sqlx::query(
            "SELECT q.file_name, q.content_type, f.data \
             FROM quotation q JOIN attachment_file f ON f.id = q.attachment_file_id \
             WHERE q.id = ?",
        )
        .bind(quotation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let file_name: String = decode(row.try_get("file_name"))?;
                let content_type: String = decode(row.try_get("content_type"))?;
                let data: Vec<u8> = decode(row.try_get("data"))?;
                Ok(Some(AttachmentPayload { file_name, content_type, data }))
            }
            None => Ok(None),
        }
    }

    async fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        let rows =
            sqlx::query("SELECT status, COUNT(*) AS count FROM purchase_request GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = decode(row.try_get("status"))?;
            let count: i64 = decode(row.try_get("count"))?;
            match parse_request_status(&status) {
                RequestStatus::Draft => counts.draft += count,
                RequestStatus::Pending => counts.pending += count,
                RequestStatus::Approved => counts.approved += count,
                RequestStatus::Completed => counts.completed += count,
                RequestStatus::Rejected => counts.rejected += count,
                RequestStatus::Cancelled => counts.cancelled += count,
            }
        }
        Ok(counts)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document type for "other" when the uploader did not classify the file.
pub const DOCUMENT_TYPE_OTHER: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub i64);

/// An attached vendor document. The binary payload lives in a separate
/// attachment row so list and detail queries never hydrate file bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub document_type_id: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// A file arriving with a create/update command, bytes included.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: String,
    pub document_type_id: i64,
    pub data: Vec<u8>,
}

/// Binary content handed back to download callers.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentPayload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

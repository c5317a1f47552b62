use std::borrow::Cow;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Lifecycle state reported by the remote pipeline for a document.
///
/// The initial post-upload state is spelled `pending` by the current service;
/// `uploaded` is accepted as a synonym. Unknown values pass through verbatim
/// so a server-side vocabulary change degrades gracefully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Other(Cow<'static, str>),
}

impl DocumentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Other(value) => value.as_ref(),
        }
    }

    pub fn label_zh(&self) -> &str {
        match self {
            DocumentStatus::Pending => "待处理",
            DocumentStatus::Processing => "处理中",
            DocumentStatus::Completed => "已完成",
            DocumentStatus::Failed => "已失败",
            DocumentStatus::Other(value) => value.as_ref(),
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "pending" | "uploaded" => DocumentStatus::Pending,
            "processing" => DocumentStatus::Processing,
            "completed" => DocumentStatus::Completed,
            "failed" => DocumentStatus::Failed,
            other => DocumentStatus::Other(Cow::Owned(other.to_string())),
        }
    }
}

impl Serialize for DocumentStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DocumentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(DocumentStatus::from_str(&value))
    }
}

/// Token payload returned by the credential-exchange endpoint. The wire also
/// carries `token_type`, which is always `bearer` and therefore dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Authenticated identity as reported by the remote service. Extra account
/// flags on the wire are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self.email.clone(),
        }
    }
}

/// Acknowledgement returned by a successful upload (HTTP 201).
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub document_id: i64,
    pub task_id: String,
    pub message: String,
}

/// Row of the paginated document listing.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentListItem {
    pub id: i64,
    pub original_filename: String,
    pub file_size: i64,
    pub page_count: Option<i64>,
    pub status: DocumentStatus,
    pub created_at: NaiveDateTime,
    pub has_summary: bool,
}

/// Full document representation with the embedded summary once present.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: i64,
    pub original_filename: String,
    pub file_size: i64,
    pub page_count: Option<i64>,
    pub status: DocumentStatus,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub summary: Option<Summary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub content: String,
    pub word_count: Option<i64>,
    pub processing_time: Option<f64>,
    pub email_sent: bool,
    pub email_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Summary as returned by the summary endpoints, which also name the source
/// document.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryDetail {
    #[serde(flatten)]
    pub summary: Summary,
    pub pdf_document: SummarySource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarySource {
    pub original_filename: String,
}

/// Canonical `{message}` acknowledgement payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values() {
        assert_eq!(DocumentStatus::from_str("processing"), DocumentStatus::Processing);
        assert_eq!(DocumentStatus::from_str("completed"), DocumentStatus::Completed);
        assert_eq!(DocumentStatus::from_str("failed"), DocumentStatus::Failed);
    }

    #[test]
    fn status_treats_uploaded_as_pending() {
        assert_eq!(DocumentStatus::from_str("uploaded"), DocumentStatus::Pending);
        assert_eq!(DocumentStatus::from_str("pending"), DocumentStatus::Pending);
    }

    #[test]
    fn status_passes_unknown_values_through() {
        let status = DocumentStatus::from_str("archived");
        assert_eq!(status.as_str(), "archived");
        assert_eq!(status.label_zh(), "archived");
    }

    #[test]
    fn document_deserializes_naive_timestamps() {
        let payload = r#"{
            "id": 7,
            "original_filename": "thesis.pdf",
            "file_size": 12345,
            "page_count": 10,
            "status": "completed",
            "created_at": "2024-05-01T08:30:00.123456",
            "summary": {
                "id": 3,
                "content": "overview",
                "word_count": 120,
                "processing_time": 4.2,
                "email_sent": true,
                "email_sent_at": "2024-05-01T08:35:00",
                "created_at": "2024-05-01T08:34:00"
            }
        }"#;

        let document: Document = serde_json::from_str(payload).expect("document payload");
        assert_eq!(document.status, DocumentStatus::Completed);
        let summary = document.summary.expect("summary present");
        assert_eq!(summary.word_count, Some(120));
        assert!(summary.email_sent);
    }

    #[test]
    fn summary_detail_flattens_summary_fields() {
        let payload = r#"{
            "id": 3,
            "content": "overview",
            "word_count": null,
            "processing_time": null,
            "email_sent": false,
            "email_sent_at": null,
            "created_at": "2024-05-01T08:34:00",
            "pdf_document": {"filename": "abc_thesis.pdf", "original_filename": "thesis.pdf"}
        }"#;

        let detail: SummaryDetail = serde_json::from_str(payload).expect("summary payload");
        assert_eq!(detail.summary.id, 3);
        assert_eq!(detail.pdf_document.original_filename, "thesis.pdf");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user: User = serde_json::from_str(
            r#"{"id": "11111111-2222-3333-4444-555555555555", "email": "a@b.com"}"#,
        )
        .expect("user payload");
        assert_eq!(user.display_name(), "a@b.com");
    }
}

//! Wire types exchanged with the ingestion backend.
//!
//! The backend owns these definitions; the dashboard only reads them. Open
//! key-value fields (`config`, `payload`, `metadata`) are kept as JSON maps
//! because the backend accepts arbitrary additional keys. Timestamps are kept
//! as the strings the backend sent and parsed only for display (see
//! [`crate::format`]), since the backend emits both offset and naive forms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Open, schema-less key-value map.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A watched filesystem location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub config: JsonMap,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSource {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<JsonMap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// `done` and `failed` never change again. Polling does not stop on them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous backend task, e.g. a source scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Open string; the backend currently emits `scan_source`, `index_doc`, `reindex_all`.
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    /// Fraction in `[0, 1]`.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub payload: JsonMap,
    pub created_at: String,
    pub updated_at: String,
}

/// An ingested file owned by a [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_id: String,
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub mtime: Option<String>,
    #[serde(default)]
    pub doc_hash: Option<String>,
    #[serde(default)]
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A unit of searchable text belonging to a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub chunk_index: i64,
    pub text: String,
    #[serde(default)]
    pub start_offset: i64,
    #[serde(default)]
    pub end_offset: i64,
    #[serde(default)]
    pub chunk_hash: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: u32,
}

/// One ranked chunk returned by `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: String,
    pub chunk_id: String,
    /// Relevance in `[0, 1]`.
    pub score: f64,
    pub text: String,
    #[serde(default)]
    pub metadata: JsonMap,
    #[serde(default)]
    pub doc_title: Option<String>,
    #[serde(default)]
    pub doc_uri: Option<String>,
    #[serde(default)]
    pub score_breakdown: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SearchResult {
    /// Title shown on a result card: metadata first, then the backend's own fields.
    pub fn display_title(&self) -> Option<&str> {
        let meta = |k: &str| {
            self.metadata
                .get(k)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        };
        meta("title")
            .or_else(|| meta("uri"))
            .or(self.doc_title.as_deref().filter(|s| !s.is_empty()))
            .or(self.doc_uri.as_deref())
    }

    /// Link target for "Open Document".
    pub fn link(&self) -> Option<&str> {
        self.metadata
            .get("uri")
            .and_then(|v| v.as_str())
            .or(self.doc_uri.as_deref())
    }
}

/// Response of the backend's root `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub config_loaded: bool,
}

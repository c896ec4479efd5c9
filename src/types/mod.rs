use serde::{Deserialize, Serialize};

/// Answer returned when retrieval finds nothing usable or the model says nothing.
pub const UNKNOWN_ANSWER: &str = "I don't know.";

/// Answer returned for a blank question.
pub const EMPTY_QUESTION_ANSWER: &str = "Please enter a question.";

// ============= Document Types =============

/// A document handed to ingestion: a name plus its already-extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Build a document from extracted pages, joined in page order with a blank line.
    pub fn from_pages(name: impl Into<String>, mut pages: Vec<PageText>) -> Self {
        pages.sort_by_key(|p| p.page);
        let raw_text = pages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            name: name.into(),
            raw_text,
        }
    }
}

/// Text of one extracted page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    #[serde(default)]
    pub page: u32,
    pub text: String,
}

/// A window of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source_name: String,
    /// 0-based position among the chunks of the same document.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// 1-based position shown to users.
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

// ============= Index Types =============

/// Metadata stored next to each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    pub source: String,
    pub chunk_index: usize,
    pub preview: String,
    #[serde(default)]
    pub text: String,
}

impl ChunkPayload {
    pub fn position(&self) -> usize {
        self.chunk_index + 1
    }

    /// `"<source>#p<position>"` as reported in answers.
    pub fn source_label(&self) -> String {
        format!("{}#p{}", self.source, self.position())
    }
}

/// A point written to the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A point returned by similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

// ============= Answer Types =============

/// Result of the query path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub top_k: usize,
    pub cached: bool,
}

impl Answer {
    pub fn unknown(top_k: usize) -> Self {
        Self {
            text: UNKNOWN_ANSWER.to_string(),
            sources: vec![],
            top_k,
            cached: false,
        }
    }
}

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub top_k: usize,
    pub cached: bool,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            sources: answer.sources,
            top_k: answer.top_k,
            cached: answer.cached,
        }
    }
}

/// One document in a JSON ingestion request. Either `text` or `pages` is used.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageText>,
}

impl From<DocumentInput> for Document {
    fn from(input: DocumentInput) -> Self {
        match input.text {
            Some(text) => Document::new(input.name, text),
            None => Document::from_pages(input.name, input.pages),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestDocumentsRequest {
    pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub indexed: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<usize>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a caller may reasonably retry the failed request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ModelUnavailable(_) | AppError::StoreUnavailable(_) | AppError::Timeout(_)
        )
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ModelUnavailable(_) | AppError::StoreUnavailable(_) | AppError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InvalidConfiguration(_)
            | AppError::DimensionMismatch { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

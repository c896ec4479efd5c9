use crate::{
    types::{
        AppError, Document, DocumentListResponse, IngestDocumentsRequest, Result, UploadResponse,
    },
    AppState,
};
use axum::{
    extract::{Multipart, State},
    Json,
};

/// Multipart field carrying uploaded files
const FILES_FIELD: &str = "files";

/// Upload one or more UTF-8 text files and index them
///
/// Every part named `files` becomes a document named after its filename.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read '{}': {}", name, e)))?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
            AppError::InvalidInput(format!("'{}' is not UTF-8 text", name))
        })?;

        documents.push(Document::new(name, text));
    }

    index_documents(&state, documents).await
}

/// Index documents whose text was extracted elsewhere
pub async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestDocumentsRequest>,
) -> Result<Json<UploadResponse>> {
    let documents = payload.documents.into_iter().map(Document::from).collect();
    index_documents(&state, documents).await
}

/// List indexed document names in ingestion order
pub async fn list(State(state): State<AppState>) -> Json<DocumentListResponse> {
    Json(DocumentListResponse {
        documents: state.pipeline.documents(),
    })
}

async fn index_documents(
    state: &AppState,
    documents: Vec<Document>,
) -> Result<Json<UploadResponse>> {
    if documents.is_empty() {
        return Err(AppError::InvalidInput("No documents provided".to_string()));
    }

    state.pipeline.ingest_many(&documents).await.into_result()?;

    Ok(Json(UploadResponse {
        ok: true,
        indexed: state.pipeline.documents(),
    }))
}

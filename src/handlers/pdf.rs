use crate::{
    db::{AccessMetadata, NewBlob},
    models::{ApiError, ErrorResponse, PdfInfoResponse, UploadResponse, ViewerQuery},
    state::AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Upload a PDF from the multipart field `file`
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let (filename, content_type, content) = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                error!("Upload request without a file field");
                return Err(ErrorResponse::with_status(StatusCode::BAD_REQUEST, "No file uploaded"));
            }
            Err(e) => {
                error!("Failed to read multipart body: {}", e);
                return Err(ErrorResponse::with_status(e.status(), e.body_text()));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        info!("Starting upload for file: {}", filename);

        if content_type != PDF_CONTENT_TYPE {
            error!("Invalid file type: {}", content_type);
            return Err(ErrorResponse::with_status(StatusCode::BAD_REQUEST, "Only PDF files are allowed"));
        }

        let content = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read upload of '{}': {}", filename, e);
                return Err(ErrorResponse::with_status(e.status(), e.body_text()));
            }
        };
        break (filename, content_type, content);
    };

    if content.is_empty() {
        error!("Empty file uploaded");
        return Err(ErrorResponse::with_status(StatusCode::BAD_REQUEST, "Empty file"));
    }
    info!("File read successfully: {}, size: {} bytes", filename, content.len());

    let metadata = NewBlob {
        filename: filename.clone(),
        content_type,
    };
    let pdf_id = match state.blobs.put(content.to_vec(), metadata).await {
        Ok(id) => id,
        Err(e) => {
            error!("Blob store upload error: {}", e);
            return Err(ErrorResponse::from_store(&e, "PDF not found"));
        }
    };
    info!("File uploaded successfully with ID: {}", pdf_id);

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: "PDF uploaded successfully".to_string(),
            pdf_id,
            filename,
        }),
    ))
}

/// Stream a stored PDF and record the visit in the access history
pub async fn get_pdf(
    State(state): State<Arc<AppState>>,
    Path(pdf_id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Response, ApiError> {
    let (content, metadata) = match state.blobs.get(&pdf_id).await {
        Ok(blob) => blob,
        Err(e) => {
            error!("Error retrieving PDF '{}': {}", pdf_id, e);
            return Err(ErrorResponse::from_store(&e, "PDF not found"));
        }
    };

    let user_id = viewer
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| state.config.default_user_id.clone());
    let access = AccessMetadata {
        filename: metadata.filename.clone(),
    };
    if let Err(e) = state.history.upsert_increment(&pdf_id, &user_id, access).await {
        warn!("Failed to record access to '{}' by '{}': {}", pdf_id, user_id, e);
    }

    let disposition = format!("inline; filename=\"{}\"", header_safe_filename(&metadata.filename));
    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

/// Stored metadata of a PDF. Does not count as a visit.
pub async fn get_pdf_info(
    State(state): State<Arc<AppState>>,
    Path(pdf_id): Path<String>,
) -> Result<Json<PdfInfoResponse>, ApiError> {
    let metadata = state.blobs.metadata(&pdf_id).await.map_err(|e| {
        error!("Error retrieving metadata of PDF '{}': {}", pdf_id, e);
        ErrorResponse::from_store(&e, "PDF not found")
    })?;

    Ok(Json(PdfInfoResponse {
        pdf_id,
        filename: metadata.filename,
        content_type: metadata.content_type,
        size: metadata.size,
        uploaded_at: metadata.uploaded_at,
    }))
}

/// Keep a filename usable inside a quoted header parameter.
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

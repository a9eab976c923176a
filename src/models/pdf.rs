use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Response for a successful upload
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub pdf_id: String,
    pub filename: String,
}

/// Who is viewing the document, for the access history
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewerQuery {
    pub user_id: Option<String>,
}

/// Multipart upload form
#[derive(Deserialize, ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Stored metadata of a PDF, without its content
#[derive(Serialize, Deserialize, ToSchema)]
pub struct PdfInfoResponse {
    pub pdf_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

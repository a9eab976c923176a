use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Batch of highlights saved by the viewer
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SaveHighlightsRequest {
    pub pdf_id: String,
    pub user_id: String,
    /// Highlight objects (position, text, color, timestamp, ...)
    pub highlights: Vec<Value>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SaveHighlightsResponse {
    pub message: String,
    pub count: usize,
}

/// All highlights stored for one document
#[derive(Serialize, Deserialize, ToSchema)]
pub struct PdfHighlightsResponse {
    pub pdf_id: String,
    pub highlights: Vec<Value>,
}

/// A single highlight with its geometry
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightRequest {
    pub pdf_id: String,
    pub user_id: String,
    /// `{x, y, width, height}`
    pub coordinates: Value,
    pub text: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightSavedResponse {
    pub message: String,
    pub highlight_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightsResponse {
    pub highlights: Vec<Value>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightsUpdatedResponse {
    pub updated: u64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightsDeletedResponse {
    pub deleted: u64,
}

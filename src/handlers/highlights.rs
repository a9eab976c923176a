use crate::{
    db::{HighlightFilter, HighlightRecord, NewHighlight},
    models::{
        ApiError, ErrorResponse, HighlightRequest, HighlightSavedResponse, HighlightsDeletedResponse,
        HighlightsResponse, HighlightsUpdatedResponse, PdfHighlightsResponse, SaveHighlightsRequest,
        SaveHighlightsResponse,
    },
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Save a batch of highlights for a PDF
pub async fn save_highlights(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveHighlightsRequest>,
) -> Result<(StatusCode, Json<SaveHighlightsResponse>), ApiError> {
    if let Some(bad) = request.highlights.iter().find(|h| !h.is_object()) {
        return Err(ErrorResponse::with_status(
            StatusCode::BAD_REQUEST,
            format!("Highlights must be JSON objects, got {}", bad),
        ));
    }

    let count = request.highlights.len();
    for highlight in request.highlights {
        let record = NewHighlight {
            user_id: request.user_id.clone(),
            highlight,
        };
        if let Err(e) = state.highlights.insert(&request.pdf_id, record).await {
            error!("Error saving highlights for '{}': {}", request.pdf_id, e);
            return Err(ErrorResponse::from_store(&e, "PDF not found"));
        }
    }
    info!("Saved {} highlights for pdf {}", count, request.pdf_id);

    Ok((
        StatusCode::OK,
        Json(SaveHighlightsResponse {
            message: "Highlights saved successfully".to_string(),
            count,
        }),
    ))
}

/// Retrieve all highlights for a given PDF
pub async fn get_pdf_highlights(
    State(state): State<Arc<AppState>>,
    Path(pdf_id): Path<String>,
) -> Result<Json<PdfHighlightsResponse>, ApiError> {
    let records = state.highlights.query(&pdf_id).await.map_err(|e| {
        error!("Error retrieving highlights for '{}': {}", pdf_id, e);
        ErrorResponse::from_store(&e, "No highlights found")
    })?;

    Ok(Json(PdfHighlightsResponse {
        pdf_id,
        highlights: records.into_iter().map(|r| r.highlight).collect(),
    }))
}

/// Merge a patch into the highlights of a PDF carrying `timestamp`
pub async fn update_highlight(
    State(state): State<Arc<AppState>>,
    Path((pdf_id, timestamp)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<HighlightsUpdatedResponse>, ApiError> {
    let filter = HighlightFilter::Timestamp(timestamp);
    let updated = state
        .highlights
        .update_matching(&pdf_id, &filter, &patch)
        .await
        .map_err(|e| {
            error!("Error updating highlight of '{}': {}", pdf_id, e);
            ErrorResponse::from_store(&e, "Highlight not found")
        })?;

    if updated == 0 {
        return Err(ErrorResponse::with_status(StatusCode::NOT_FOUND, "Highlight not found"));
    }
    Ok(Json(HighlightsUpdatedResponse { updated }))
}

/// Delete the highlights of a PDF carrying `timestamp`
pub async fn delete_highlight(
    State(state): State<Arc<AppState>>,
    Path((pdf_id, timestamp)): Path<(String, String)>,
) -> Result<Json<HighlightsDeletedResponse>, ApiError> {
    let filter = HighlightFilter::Timestamp(timestamp);
    let deleted = state
        .highlights
        .delete_matching(&pdf_id, &filter)
        .await
        .map_err(|e| {
            error!("Error deleting highlight of '{}': {}", pdf_id, e);
            ErrorResponse::from_store(&e, "Highlight not found")
        })?;

    if deleted == 0 {
        return Err(ErrorResponse::with_status(StatusCode::NOT_FOUND, "Highlight not found"));
    }
    info!("Deleted {} highlights from pdf {}", deleted, pdf_id);
    Ok(Json(HighlightsDeletedResponse { deleted }))
}

/// Save one highlight with its geometry
pub async fn add_highlight(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HighlightRequest>,
) -> Result<(StatusCode, Json<HighlightSavedResponse>), ApiError> {
    let record = NewHighlight {
        user_id: request.user_id,
        highlight: json!({
            "coordinates": request.coordinates,
            "text": request.text,
            "color": request.color,
        }),
    };
    let id = state
        .highlights
        .insert(&request.pdf_id, record)
        .await
        .map_err(|e| {
            error!("Error saving highlight for '{}': {}", request.pdf_id, e);
            ErrorResponse::from_store(&e, "PDF not found")
        })?;

    Ok((
        StatusCode::OK,
        Json(HighlightSavedResponse {
            message: "Highlight saved".to_string(),
            highlight_id: id.to_string(),
        }),
    ))
}

/// Highlights of a PDF with their owner; 404 when there are none
pub async fn get_highlights(
    State(state): State<Arc<AppState>>,
    Path(pdf_id): Path<String>,
) -> Result<Json<HighlightsResponse>, ApiError> {
    let records = state.highlights.query(&pdf_id).await.map_err(|e| {
        error!("Error retrieving highlights for '{}': {}", pdf_id, e);
        ErrorResponse::from_store(&e, "No highlights found")
    })?;

    if records.is_empty() {
        return Err(ErrorResponse::with_status(StatusCode::NOT_FOUND, "No highlights found"));
    }
    Ok(Json(HighlightsResponse {
        highlights: records.into_iter().map(with_owner).collect(),
    }))
}

/// Flatten a record into its highlight object plus `pdf_id` and `user_id`.
fn with_owner(record: HighlightRecord) -> Value {
    let mut highlight = record.highlight;
    if let Value::Object(fields) = &mut highlight {
        fields.insert("pdf_id".to_string(), Value::String(record.pdf_id));
        fields.insert("user_id".to_string(), Value::String(record.user_id));
    }
    highlight
}

use crate::{
    models::{ApiError, ClearHistoryResponse, ErrorResponse, RecentPdf, RecentPdfsResponse, RecentQuery},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

const MAX_RECENT_LIMIT: i64 = 100;

/// Recently viewed PDFs of a user, most recent first
pub async fn recent_pdfs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentPdfsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.recent_limit)
        .clamp(1, MAX_RECENT_LIMIT);

    let records = state.history.query_recent(&user_id, limit).await.map_err(|e| {
        error!("Error fetching recent PDFs for '{}': {}", user_id, e);
        ErrorResponse::from_store(&e, "No history found")
    })?;

    Ok(Json(RecentPdfsResponse {
        recent_pdfs: records
            .into_iter()
            .map(|r| RecentPdf {
                pdf_id: r.pdf_id,
                filename: r.filename,
                last_accessed: r.last_accessed,
                access_count: r.access_count,
            })
            .collect(),
    }))
}

/// Forget every PDF a user has viewed
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let deleted_count = state.history.clear(&user_id).await.map_err(|e| {
        error!("Error clearing history for '{}': {}", user_id, e);
        ErrorResponse::from_store(&e, "No history found")
    })?;
    info!("Cleared {} history entries for '{}'", deleted_count, user_id);

    Ok(Json(ClearHistoryResponse {
        message: "History cleared".to_string(),
        deleted_count,
    }))
}

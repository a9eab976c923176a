use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// One entry of a user's recently viewed documents
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct RecentPdf {
    pub pdf_id: String,
    pub filename: String,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RecentPdfsResponse {
    pub recent_pdfs: Vec<RecentPdf>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ClearHistoryResponse {
    pub message: String,
    pub deleted_count: u64,
}

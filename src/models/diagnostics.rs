use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Realtime load and host resource usage
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    pub service: String,
    /// Open realtime connections across all documents
    pub n_conn: u32,
    /// Documents with at least one viewer
    pub n_documents: u32,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}

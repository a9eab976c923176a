use crate::{models::DiagnosticsResponse, state::AppState};
use axum::{extract::State, Json};
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static HOST: OnceLock<Mutex<System>> = OnceLock::new();

#[derive(Default)]
struct HostUsage {
    cpu: f32,
    used: u64,
    free: u64,
    total: u64,
}

fn sample_host() -> HostUsage {
    let host = HOST.get_or_init(|| Mutex::new(System::new_all()));
    let Ok(mut sys) = host.lock() else {
        return HostUsage::default();
    };
    sys.refresh_cpu();
    sys.refresh_memory();
    HostUsage {
        cpu: sys.global_cpu_info().cpu_usage(),
        used: sys.used_memory(),
        free: sys.free_memory(),
        total: sys.total_memory(),
    }
}

/// Realtime connection counts and host resource usage
pub async fn diagnostics(State(state): State<Arc<AppState>>) -> Json<DiagnosticsResponse> {
    let stats = state.registry.stats();
    let host = sample_host();

    info!(
        "Diagnostics: {} viewers on {} documents, CPU {:.2}%, Mem {}/{} MB",
        stats.connections,
        stats.documents,
        host.cpu,
        host.used / 1024 / 1024,
        host.total / 1024 / 1024,
    );

    Json(DiagnosticsResponse {
        service: state.config.service_name.clone(),
        n_conn: stats.connections as u32,
        n_documents: stats.documents as u32,
        cpu_usage: host.cpu,
        memory_alloc: host.used,
        memory_total: host.total,
        memory_free: host.free,
    })
}

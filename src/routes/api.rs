use crate::{handlers, state::AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Create all HTTP and realtime routes
pub fn create_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(state.config.cors_origins.as_deref());

    Router::<Arc<AppState>>::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        // Stored PDFs and access history
        .route("/pdfs/upload/", post(handlers::upload_pdf))
        .route("/pdfs/upload", post(handlers::upload_pdf))
        .route("/pdfs/pdf/:pdf_id", get(handlers::get_pdf))
        .route("/pdfs/info/:pdf_id", get(handlers::get_pdf_info))
        .route("/pdfs/recent/:user_id", get(handlers::recent_pdfs))
        .route("/pdfs/recent/clear/:user_id", delete(handlers::clear_history))
        // Highlight batches as saved by the viewer
        .route("/pdfs/highlights/", post(handlers::save_highlights))
        .route("/pdfs/highlights", post(handlers::save_highlights))
        .route("/pdfs/highlights/:pdf_id", get(handlers::get_pdf_highlights))
        .route(
            "/pdfs/highlights/:pdf_id/:timestamp",
            patch(handlers::update_highlight).delete(handlers::delete_highlight),
        )
        // Single highlights
        .route("/highlights/", post(handlers::add_highlight))
        .route("/highlights", post(handlers::add_highlight))
        .route("/highlights/:pdf_id", get(handlers::get_highlights))
        // Realtime channel
        .route("/realtime/ws/:pdf_id", get(handlers::realtime_ws))
        .route("/api/v1/diagnostics", get(handlers::diagnostics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// `None` or `*` allows any origin; otherwise a comma separated allow-list.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins.map(str::trim) {
        None | Some("") | Some("*") => base.allow_origin(Any),
        Some(list) => {
            let parsed: Vec<HeaderValue> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| HeaderValue::from_str(s).ok())
                .collect();
            base.allow_origin(AllowOrigin::list(parsed))
        }
    }
}

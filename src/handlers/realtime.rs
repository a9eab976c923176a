use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::{state::AppState, ws::session::run_session};

/// Open the realtime highlight channel for one PDF
pub async fn realtime_ws(
    Path(pdf_id): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!("New realtime connection attempt for pdf {}", pdf_id);
    ws.on_upgrade(move |socket| run_session(socket, pdf_id, state))
}

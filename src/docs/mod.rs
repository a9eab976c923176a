use utoipa::OpenApi;
use crate::models::*;

/// API banner
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = RootResponse)
    )
)]
#[allow(dead_code)]
pub async fn root_doc() {}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Upload a PDF
#[utoipa::path(
    post,
    path = "/pdfs/upload/",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Multipart form with a `file` field"),
    responses(
        (status = 200, description = "PDF stored", body = UploadResponse),
        (status = 400, description = "Not a PDF or empty file", body = ErrorResponse),
        (status = 413, description = "File too large")
    )
)]
#[allow(dead_code)]
pub async fn upload_pdf_doc() {}

/// Download a PDF and record the visit
#[utoipa::path(
    get,
    path = "/pdfs/pdf/{pdf_id}",
    params(
        ("pdf_id" = String, Path, description = "Identifier returned by the upload"),
        ViewerQuery
    ),
    responses(
        (status = 200, description = "PDF content", content_type = "application/pdf"),
        (status = 404, description = "PDF not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_pdf_doc() {}

/// Stored metadata of a PDF
#[utoipa::path(
    get,
    path = "/pdfs/info/{pdf_id}",
    params(
        ("pdf_id" = String, Path, description = "Identifier returned by the upload")
    ),
    responses(
        (status = 200, description = "PDF metadata", body = PdfInfoResponse),
        (status = 404, description = "PDF not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_pdf_info_doc() {}

/// Recently viewed PDFs of a user
#[utoipa::path(
    get,
    path = "/pdfs/recent/{user_id}",
    params(
        ("user_id" = String, Path, description = "Viewer"),
        RecentQuery
    ),
    responses(
        (status = 200, description = "Most recent first", body = RecentPdfsResponse)
    )
)]
#[allow(dead_code)]
pub async fn recent_pdfs_doc() {}

/// Clear a user's access history
#[utoipa::path(
    delete,
    path = "/pdfs/recent/clear/{user_id}",
    params(("user_id" = String, Path, description = "Viewer")),
    responses(
        (status = 200, description = "History cleared", body = ClearHistoryResponse)
    )
)]
#[allow(dead_code)]
pub async fn clear_history_doc() {}

/// Save a batch of highlights
#[utoipa::path(
    post,
    path = "/pdfs/highlights/",
    request_body = SaveHighlightsRequest,
    responses(
        (status = 200, description = "Highlights saved", body = SaveHighlightsResponse),
        (status = 400, description = "A highlight is not a JSON object", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn save_highlights_doc() {}

/// All highlights of a PDF
#[utoipa::path(
    get,
    path = "/pdfs/highlights/{pdf_id}",
    params(("pdf_id" = String, Path, description = "PDF identifier")),
    responses(
        (status = 200, description = "Highlights, possibly empty", body = PdfHighlightsResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_pdf_highlights_doc() {}

/// Patch the highlights carrying a timestamp
#[utoipa::path(
    patch,
    path = "/pdfs/highlights/{pdf_id}/{timestamp}",
    params(
        ("pdf_id" = String, Path, description = "PDF identifier"),
        ("timestamp" = String, Path, description = "Highlight timestamp")
    ),
    responses(
        (status = 200, description = "Highlights updated", body = HighlightsUpdatedResponse),
        (status = 404, description = "No matching highlight", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn update_highlight_doc() {}

/// Delete the highlights carrying a timestamp
#[utoipa::path(
    delete,
    path = "/pdfs/highlights/{pdf_id}/{timestamp}",
    params(
        ("pdf_id" = String, Path, description = "PDF identifier"),
        ("timestamp" = String, Path, description = "Highlight timestamp")
    ),
    responses(
        (status = 200, description = "Highlights deleted", body = HighlightsDeletedResponse),
        (status = 404, description = "No matching highlight", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn delete_highlight_doc() {}

/// Save one highlight
#[utoipa::path(
    post,
    path = "/highlights/",
    request_body = HighlightRequest,
    responses(
        (status = 200, description = "Highlight saved", body = HighlightSavedResponse)
    )
)]
#[allow(dead_code)]
pub async fn add_highlight_doc() {}

/// Highlights of a PDF with their owners
#[utoipa::path(
    get,
    path = "/highlights/{pdf_id}",
    params(("pdf_id" = String, Path, description = "PDF identifier")),
    responses(
        (status = 200, description = "Highlights", body = HighlightsResponse),
        (status = 404, description = "No highlights found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_highlights_doc() {}

/// Realtime connection diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Connection counts and host usage", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        root_doc,
        health_check_doc,
        upload_pdf_doc,
        get_pdf_doc,
        get_pdf_info_doc,
        recent_pdfs_doc,
        clear_history_doc,
        save_highlights_doc,
        get_pdf_highlights_doc,
        update_highlight_doc,
        delete_highlight_doc,
        add_highlight_doc,
        get_highlights_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            RootResponse,
            HealthResponse,
            ErrorResponse,
            UploadForm,
            UploadResponse,
            PdfInfoResponse,
            RecentPdf,
            RecentPdfsResponse,
            ClearHistoryResponse,
            SaveHighlightsRequest,
            SaveHighlightsResponse,
            PdfHighlightsResponse,
            HighlightRequest,
            HighlightSavedResponse,
            HighlightsResponse,
            HighlightsUpdatedResponse,
            HighlightsDeletedResponse,
            DiagnosticsResponse,
        )
    ),
    tags(
        (name = "api", description = "PDF storage, highlights and access history")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_documented_as_a_multipart_file() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let form = &doc["paths"]["/pdfs/upload/"]["post"]["requestBody"]["content"]["multipart/form-data"];
        assert!(form.is_object());
        assert_eq!(
            doc["components"]["schemas"]["UploadForm"]["properties"]["file"]["format"],
            "binary"
        );
    }

    #[test]
    fn every_route_family_is_documented() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in [
            "/pdfs/pdf/{pdf_id}",
            "/pdfs/info/{pdf_id}",
            "/pdfs/recent/{user_id}",
            "/pdfs/highlights/{pdf_id}",
            "/api/v1/diagnostics",
        ] {
            assert!(doc["paths"][path].is_object(), "{path} missing from the OpenAPI document");
        }
    }
}

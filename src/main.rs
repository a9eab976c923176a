use axum::Router;
use pdf_colab::config::Config;
use pdf_colab::db::Stores;
use pdf_colab::docs::ApiDoc;
use pdf_colab::routes::create_routes;
use pdf_colab::state::AppState;
use pdf_colab::ws::{CloseReason, ConnectionRegistry};
use std::panic;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration first so LOG_LEVEL can shape the filter
    let loaded = Config::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"))
        }))
        .init();

    match loaded {
        Ok(_) => info!("✅ Configuration loaded successfully"),
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            warn!("Using default configuration");
        }
    }
    info!(
        "Starting {} in {} mode",
        config.service_name, config.environment
    );

    // Connect the stores, falling back to memory without a database
    let stores = match &config.db_url {
        Some(db_url) => match Stores::postgres(db_url).await {
            Ok(stores) => {
                info!("Database initialized successfully");
                stores
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Falling back to in-memory stores; uploads will not survive a restart");
                Stores::in_memory()
            }
        },
        None => {
            warn!("No database URL configured - using in-memory stores");
            Stores::in_memory()
        }
    };

    let address = config.server_address();
    let state = Arc::new(AppState::new(config, stores));
    let registry = state.registry.clone();

    // Combine all routes
    let app_routes = Router::new()
        .merge(create_routes(state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", address);
    info!("📡 Realtime channel available at ws://{}/realtime/ws/{{pdf_id}}", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app_routes)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Server stopped");
}

/// Wait for Ctrl-C or SIGTERM, then close every realtime connection so their
/// tasks wind down with the server.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    registry.close_all(CloseReason::ServerShutdown);
}

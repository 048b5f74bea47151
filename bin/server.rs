// PayNotify - Ingestion Server
// REST API with Axum: notifications and OCR text in, transactions out

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use paynotify::{
    AppConfig, LogSink, NotificationPipeline, OcrDocument, PipelineOutcome, PipelineStats, RawEvent,
    RuleSpec,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    pipeline: Arc<NotificationPipeline>,
    rules: Arc<Vec<RuleSpec>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn err(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

/// Rule listing (patterns omitted)
#[derive(Serialize)]
struct RuleResponse {
    source: String,
    bank_name: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/rules - Configured extraction rules
async fn get_rules(State(state): State<AppState>) -> impl IntoResponse {
    let rules: Vec<RuleResponse> = state
        .rules
        .iter()
        .map(|spec| RuleResponse {
            source: spec.source.to_string(),
            bank_name: spec.bank_name.clone(),
        })
        .collect();

    Json(ApiResponse::ok(rules))
}

/// GET /api/stats - Pipeline counters
async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<PipelineStats>> {
    Json(ApiResponse::ok(state.pipeline.stats()))
}

/// POST /api/notifications - Run one notification through the pipeline
async fn post_notification(
    State(state): State<AppState>,
    Json(event): Json<RawEvent>,
) -> impl IntoResponse {
    respond(state.pipeline.handle_notification(event))
}

/// POST /api/ocr - Run recognized screen text through the pipeline
async fn post_ocr(
    State(state): State<AppState>,
    Json(doc): Json<OcrDocument>,
) -> impl IntoResponse {
    respond(state.pipeline.handle_ocr(&doc))
}

// Drops are normal results; only rate limiting and sink failures are errors
fn respond(outcome: PipelineOutcome) -> (StatusCode, Json<ApiResponse<PipelineOutcome>>) {
    let failure = match &outcome {
        PipelineOutcome::RateLimited => {
            Some((StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded".to_string()))
        }
        PipelineOutcome::DispatchFailed { error } => Some((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("dispatch failed: {}", error),
        )),
        _ => None,
    };

    match failure {
        Some((status, message)) => (status, Json(ApiResponse::err(outcome, message))),
        None => (StatusCode::OK, Json(ApiResponse::ok(outcome))),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paynotify=info,paynotify_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🌐 PayNotify - Ingestion Server");

    let config_path = std::env::var("PAYNOTIFY_CONFIG").ok().map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let pipeline = NotificationPipeline::from_config(&config, Box::new(LogSink))?;

    // Create shared state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        rules: Arc::new(config.rules.clone()),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/rules", get(get_rules))
        .route("/stats", get(get_stats))
        .route("/notifications", post(post_notification))
        .route("/ocr", post(post_ocr))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = std::env::var("PAYNOTIFY_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server running on http://{}", addr);
    tracing::info!("   POST /api/notifications, POST /api/ocr");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

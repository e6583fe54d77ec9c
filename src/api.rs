use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    http::{header, HeaderValue, Method},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::error::AnalysisError;
use crate::handlers::AnalysisHandler;
use crate::models::AnalysisRequest;

pub const ANALYSIS_ROUTE: &str = "/api/foodTextAnalysis";

pub fn create_router(handler: Arc<AnalysisHandler>, config: &Config) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health_check))
        .route(ANALYSIS_ROUTE, post(analysis_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_allowed_origins))
        .with_state(handler)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn analysis_handler(
    State(handler): State<Arc<AnalysisHandler>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Rejections go through the same {"error"} envelope as everything else
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return AnalysisError::PayloadTooLarge(rejection.body_text()).into_response();
        }
        Err(rejection) => {
            return AnalysisError::Validation(rejection.body_text()).into_response();
        }
    };

    log::info!("🔔 Analysis request received ({} bytes)", body.len());

    let request: AnalysisRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return AnalysisError::Validation(format!("Invalid JSON body: {}", e)).into_response();
        }
    };

    match handler.analyze(request).await {
        Ok(result) => {
            log::info!("✅ Analysis returned via {}", handler.provider_name());
            Json(result).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health_check() -> &'static str {
    "OK"
}

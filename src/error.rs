use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::services::ProviderError;

pub const MISSING_INPUT_MESSAGE: &str = "No imageBase64 received";

/// Everything the analysis route can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AnalysisError {
    pub fn missing_input() -> Self {
        AnalysisError::Validation(MISSING_INPUT_MESSAGE.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AnalysisError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AnalysisError::Validation(message) | AnalysisError::PayloadTooLarge(message) => {
                log::warn!("⚠️ Rejected analysis request: {}", message)
            }
            AnalysisError::Provider(e) => log::error!("❌ Food analysis failed: {}", e),
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_validation_maps_to_400_with_error_field() {
        let response = AnalysisError::missing_input().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "error": "No imageBase64 received" }));
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_500_with_reason() {
        let err = AnalysisError::from(ProviderError::Transport {
            provider: "gemini",
            message: "connection refused".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "gemini request failed: connection refused");
    }
}

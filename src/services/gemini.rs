use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::GEMINI_API_KEY_ENV;
use crate::models::FoodInput;
use crate::services::ai_service::{NutritionProvider, ProviderError};

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Google Generative Language API (`generateContent`)
pub struct GeminiService {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(input: &FoodInput, prompt: &str) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];

        if let FoodInput::Image { data, mime_type } = input {
            parts.push(Part::InlineData {
                inline_data: Blob {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            });
        }

        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                candidate_count: 1,
            },
        }
    }

    fn extract_text(response: GenerateResponse) -> Result<String, ProviderError> {
        if let Some(error) = response.error {
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                message: error.message,
            });
        }

        let candidate = response.candidates.unwrap_or_default().into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

        let text = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| match p {
                        Part::Text { text } => Some(text),
                        Part::InlineData { .. } => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let message = match finish_reason {
                Some(reason) => format!("no text in first candidate (finishReason: {})", reason),
                None => "no text in first candidate".to_string(),
            };
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                message,
            });
        }

        Ok(text)
    }

    /// Prefer the `error.message` inside a JSON error body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<GenerateResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map(|e| e.message)
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait::async_trait]
impl NutritionProvider for GeminiService {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, input: &FoodInput, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey(GEMINI_API_KEY_ENV))?;

        let request = Self::build_request(input, prompt);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        log::info!("🤖 Sending {} analysis to Gemini with model: {}", input.kind(), self.model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        let body = response.text().await.map_err(|e| ProviderError::Transport {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            log::error!("❌ Gemini API error response: {}", body);
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: Self::error_message(&body),
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let text = Self::extract_text(parsed)?;
        log::info!(
            "💬 Gemini answered in {} ms ({} chars)",
            start.elapsed().as_millis(),
            text.len()
        );

        Ok(text)
    }
}

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::OPENAI_API_KEY_ENV;
use crate::models::FoodInput;
use crate::services::ai_service::{NutritionProvider, ProviderError};

const PROVIDER: &str = "openai";
const MAX_TOKENS: u32 = 500;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageData },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenAI Chat Completions (also works against OpenRouter-style gateways)
pub struct OpenAiService {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiService {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, input: &FoodInput, prompt: &str) -> ChatRequest {
        let mut content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];

        if let Some(url) = input.data_url() {
            log::debug!("🖼️ Image data URL created: {} bytes", url.len());
            content.push(ContentPart::ImageUrl {
                image_url: ImageData { url },
            });
        }

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: MAX_TOKENS,
        }
    }

    fn error_message(body: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait::async_trait]
impl NutritionProvider for OpenAiService {
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
            .ok_or(ProviderError::MissingApiKey(OPENAI_API_KEY_ENV))?;

        let request = self.build_request(input, prompt);

        log::info!("🤖 Sending {} analysis to OpenAI with model: {}", input.kind(), self.model);
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        log::debug!("📥 OpenAI response status: {}", status);

        let body = response.text().await.map_err(|e| ProviderError::Transport {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            log::error!("❌ OpenAI API error response: {}", body);
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: Self::error_message(&body),
            });
        }

        let chat_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER,
                message: "empty choices array".to_string(),
            })?;

        log::info!(
            "💬 OpenAI answered in {} ms ({} chars)",
            start.elapsed().as_millis(),
            content.len()
        );

        Ok(content)
    }
}

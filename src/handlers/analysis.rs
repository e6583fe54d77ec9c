use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::models::{
    AnalysisRequest, AnalysisResult, FoodInput, NutritionEstimate, ResponseShape, DEFAULT_MIME_TYPE,
};
use crate::services::{NutritionProvider, PromptTemplate, ProviderError};

// Browsers and providers disagree on trailing `=`; accept both.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The one relay handler: provider, prompts and answer shape are fixed at startup.
pub struct AnalysisHandler {
    provider: Arc<dyn NutritionProvider>,
    prompts: PromptTemplate,
    shape: ResponseShape,
}

impl AnalysisHandler {
    pub fn new(
        provider: Arc<dyn NutritionProvider>,
        prompts: PromptTemplate,
        shape: ResponseShape,
    ) -> Self {
        Self {
            provider,
            prompts,
            shape,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        if request.height.is_some() || request.weight.is_some() {
            log::debug!(
                "📏 Body metrics attached - height: {:?}, weight: {:?}",
                request.height,
                request.weight
            );
        }

        let input = validate(request)?;
        let prompt = self.prompts.render(&input);

        log::info!(
            "🍽️ Analyzing {} input via {} ({}), shape={}",
            input.kind(),
            self.provider.name(),
            self.provider.model(),
            self.shape
        );

        let text = self.provider.analyze(&input, &prompt).await?;

        match self.shape {
            ResponseShape::Text => Ok(AnalysisResult::text(text)),
            ResponseShape::Json => {
                let estimate = parse_structured(self.provider.name(), &text)?;
                log::info!(
                    "✅ Estimate: {} kcal, P {} g, F {} g, C {} g",
                    estimate.calories,
                    estimate.protein,
                    estimate.fat,
                    estimate.carbs
                );
                Ok(AnalysisResult::Structured(estimate))
            }
        }
    }
}

/// Turn the wire request into a provider input. The image wins over a food name.
pub fn validate(request: AnalysisRequest) -> Result<FoodInput, AnalysisError> {
    let image = request
        .image_base64
        .as_deref()
        .map(str::trim)
        .map(strip_data_uri_prefix)
        .map(|(mime, payload)| (mime, payload.split_whitespace().collect::<String>()))
        .filter(|(_, data)| !data.is_empty());

    if let Some((header_mime, data)) = image {
        let decoded = BASE64_LENIENT
            .decode(&data)
            .map_err(|_| AnalysisError::Validation("imageBase64 is not valid base64".to_string()))?;
        log::debug!("📊 Image payload: {} base64 chars, {} bytes", data.len(), decoded.len());

        let mime_type = header_mime
            .map(str::to_string)
            .or(request.mime_type.filter(|m| !m.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        return Ok(FoodInput::Image { data, mime_type });
    }

    match request.food_name.map(|f| f.trim().to_string()) {
        Some(food_name) if !food_name.is_empty() => Ok(FoodInput::Text { food_name }),
        _ => Err(AnalysisError::missing_input()),
    }
}

/// Split `data:image/png;base64,AAAA` into (`Some("image/png")`, `AAAA`).
///
/// Anything up to and including the first comma is dropped, data URI or not.
pub fn strip_data_uri_prefix(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .strip_prefix("data:")
                .and_then(|h| h.split(';').next())
                .map(str::trim)
                .filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, raw),
    }
}

/// Read the provider's JSON answer, tolerating Markdown fences and chatter around it.
pub fn parse_structured(provider: &'static str, text: &str) -> Result<NutritionEstimate, ProviderError> {
    let start = text.find('{');
    let end = text.rfind('}');

    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(ProviderError::Malformed {
                provider,
                message: format!("expected a JSON object, got: {}", text.trim()),
            })
        }
    };

    serde_json::from_str(json).map_err(|e| ProviderError::Malformed {
        provider,
        message: format!("nutrition JSON did not match schema: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeProvider;

    fn handler(provider: Arc<FakeProvider>, shape: ResponseShape) -> AnalysisHandler {
        AnalysisHandler::new(provider, PromptTemplate::for_shape(shape), shape)
    }

    #[test]
    fn test_strip_prefix_keeps_only_suffix() {
        let (mime, payload) = strip_data_uri_prefix("data:image/jpeg;base64,/9j/4AAQ");
        assert_eq!(mime, Some("image/jpeg"));
        assert_eq!(payload, "/9j/4AAQ");

        assert_eq!(strip_data_uri_prefix("/9j/4AAQ"), (None, "/9j/4AAQ"));
    }

    #[test]
    fn test_validate_uses_header_mime() {
        let input = validate(AnalysisRequest::image("data:image/png;base64,aGVsbG8=", "image/jpeg")).unwrap();

        assert_eq!(
            input,
            FoodInput::Image {
                data: "aGVsbG8=".to_string(),
                mime_type: "image/png".to_string()
            }
        );
    }

    #[test]
    fn test_validate_defaults_to_jpeg() {
        let request = AnalysisRequest {
            image_base64: Some("aGVsbG8=".to_string()),
            ..AnalysisRequest::default()
        };

        match validate(request).unwrap() {
            FoodInput::Image { mime_type, .. } => assert_eq!(mime_type, "image/jpeg"),
            other => panic!("unexpected input: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_missing_and_blank_fields() {
        assert!(matches!(validate(AnalysisRequest::default()), Err(AnalysisError::Validation(_))));
        assert!(matches!(validate(AnalysisRequest::food("   ")), Err(AnalysisError::Validation(_))));
        assert!(matches!(
            validate(AnalysisRequest::image("data:image/jpeg;base64,", "image/jpeg")),
            Err(AnalysisError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_image_falls_back_to_food_name() {
        let request = AnalysisRequest {
            image_base64: Some("data:image/jpeg;base64,".to_string()),
            food_name: Some("pizza".to_string()),
            ..AnalysisRequest::default()
        };

        assert_eq!(
            validate(request).unwrap(),
            FoodInput::Text {
                food_name: "pizza".to_string()
            }
        );
    }

    #[test]
    fn test_validate_accepts_unpadded_base64() {
        match validate(AnalysisRequest::image("aGVsbG8", "image/jpeg")).unwrap() {
            FoodInput::Image { data, .. } => assert_eq!(data, "aGVsbG8"),
            other => panic!("unexpected input: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_garbage_base64() {
        let err = validate(AnalysisRequest::image("not base64!!", "image/jpeg")).unwrap_err();
        assert_eq!(err.to_string(), "imageBase64 is not valid base64");
    }

    #[test]
    fn test_image_wins_over_food_name() {
        let request = AnalysisRequest {
            image_base64: Some("aGVsbG8=".to_string()),
            food_name: Some("pizza".to_string()),
            ..AnalysisRequest::default()
        };

        assert_eq!(validate(request).unwrap().kind(), "image");
    }

    #[test]
    fn test_parse_structured_strips_code_fence() {
        let text = "```json\n{\"calories\": 200, \"protein\": \"10g\", \"fat\": 5, \"carbs\": 30}\n```";
        let estimate = parse_structured("gemini", text).unwrap();

        assert_eq!(estimate.calories, 200.0);
        assert_eq!(estimate.protein, 10.0);
    }

    #[test]
    fn test_parse_structured_rejects_prose() {
        let err = parse_structured("gemini", "Roughly 200 calories.").unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[tokio::test]
    async fn test_text_shape_passes_through_verbatim() {
        let provider = Arc::new(FakeProvider::replying("Calories: 200"));
        let result = handler(provider.clone(), ResponseShape::Text)
            .analyze(AnalysisRequest::image("data:image/jpeg;base64,aGVsbG8=", "image/jpeg"))
            .await
            .unwrap();

        assert_eq!(result, AnalysisResult::text("Calories: 200"));

        let (input, prompt) = provider.last_call().unwrap();
        assert_eq!(
            input,
            FoodInput::Image {
                data: "aGVsbG8=".to_string(),
                mime_type: "image/jpeg".to_string()
            }
        );
        assert_eq!(prompt, "Analyze this food image and give calories, protein, fat, carbs.");
    }

    #[tokio::test]
    async fn test_json_shape_returns_structured_estimate() {
        let provider = Arc::new(FakeProvider::replying(
            r#"{"food": "Pizza", "calories": 650, "protein": 25, "fat": 20, "carbs": 80, "advice": "Add a salad."}"#,
        ));
        let result = handler(provider, ResponseShape::Json)
            .analyze(AnalysisRequest::food("pizza"))
            .await
            .unwrap();

        match result {
            AnalysisResult::Structured(estimate) => {
                assert_eq!(estimate.calories, 650.0);
                assert_eq!(estimate.food.as_deref(), Some("Pizza"));
                assert_eq!(estimate.advice.as_deref(), Some("Add a salad."));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_shape_with_prose_is_provider_error() {
        let provider = Arc::new(FakeProvider::replying("I think about 300 kcal"));
        let err = handler(provider, ResponseShape::Json)
            .analyze(AnalysisRequest::food("toast"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Provider(ProviderError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_missing_input_never_reaches_provider() {
        let provider = Arc::new(FakeProvider::replying("unused"));
        let err = handler(provider.clone(), ResponseShape::Text)
            .analyze(AnalysisRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No imageBase64 received");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_propagated() {
        let provider = Arc::new(FakeProvider::failing("quota exhausted"));
        let err = handler(provider.clone(), ResponseShape::Text)
            .analyze(AnalysisRequest::food("rice"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Provider(_)));
        assert!(err.to_string().contains("quota exhausted"));
        assert_eq!(provider.calls(), 1);
    }
}

//! Relay client: the browser form's contract, usable from Rust.
//!
//! Mirrors `static/index.html`: local BMI, base64 image encoding, one request
//! in flight at a time, and a terse message for every failure.

use base64::{engine::general_purpose, Engine};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::ANALYSIS_ROUTE;
use crate::models::{AnalysisRequest, AnalysisResult, FoodInput, DEFAULT_MIME_TYPE};

pub const WORKOUT_TIPS: [&str; 3] = [
    "🏃 Cardio: 20–30 min",
    "🏋️ Strength: Pushups, Squats",
    "🧠 Tip: Sleep & hydrate well",
];

const FAILURE_MESSAGE: &str = "Failed to analyze food. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Please upload a food image or enter a food name first")]
    EmptyInput,

    #[error("An analysis is already in progress")]
    Busy,

    #[error("Could not read image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not reach relay: {0}")]
    Network(String),

    #[error("Relay responded {status}: {message}")]
    Relay { status: u16, message: String },

    #[error("Could not read relay response: {0}")]
    Decode(String),
}

impl ClientError {
    /// What the end user gets to see.
    pub fn user_message(&self) -> &str {
        match self {
            ClientError::EmptyInput => "Please upload a food image first",
            ClientError::Busy => "Analysis already running, please wait.",
            ClientError::ImageRead { .. } => "Could not read that image file.",
            ClientError::Network(_) | ClientError::Relay { .. } | ClientError::Decode(_) => {
                FAILURE_MESSAGE
            }
        }
    }
}

/// `weight / (height/100)^2`, rounded to two decimals.
pub fn bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if !(height_cm.is_finite() && weight_kg.is_finite()) || height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }

    let h = height_cm / 100.0;
    Some((weight_kg / (h * h) * 100.0).round() / 100.0)
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Read an image file into a bare base64 `FoodInput`.
pub fn encode_image_file(path: &Path) -> Result<FoodInput, ClientError> {
    let bytes = std::fs::read(path).map_err(|source| ClientError::ImageRead {
        path: path.display().to_string(),
        source,
    })?;

    log::debug!("📊 Image file size: {} bytes", bytes.len());

    Ok(FoodInput::Image {
        data: general_purpose::STANDARD.encode(&bytes),
        mime_type: mime_type_for(path).to_string(),
    })
}

/// Clears the loading flag on every exit path.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RelayClient {
    endpoint: String,
    loading: AtomicBool,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), ANALYSIS_ROUTE),
            loading: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<LoadingGuard<'_>, ClientError> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| LoadingGuard(&self.loading))
            .map_err(|_| ClientError::Busy)
    }

    pub async fn analyze(&self, input: &FoodInput) -> Result<AnalysisResult, ClientError> {
        let request = match input {
            FoodInput::Image { data, mime_type } if !data.is_empty() => {
                AnalysisRequest::image(data.clone(), mime_type.clone())
            }
            FoodInput::Text { food_name } if !food_name.trim().is_empty() => {
                AnalysisRequest::food(food_name.trim())
            }
            _ => return Err(ClientError::EmptyInput),
        };

        let _guard = self.begin()?;
        log::info!("📤 Sending {} analysis to {}", input.kind(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            log::error!("❌ Relay error ({}): {}", status, message);
            return Err(ClientError::Relay {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Both panels of the form as plain text.
pub fn render_report(bmi: Option<f64>, outcome: &Result<AnalysisResult, ClientError>) -> String {
    let mut out = String::new();

    if let Some(bmi) = bmi {
        out.push_str(&format!("BMI: {:.2}\n\n", bmi));
    }

    out.push_str("Workout Plan\n");
    for tip in WORKOUT_TIPS {
        out.push_str(tip);
        out.push('\n');
    }
    out.push('\n');

    match outcome {
        Ok(result) => {
            out.push_str("Analysis Complete\n");
            out.push_str(&result.to_string());
        }
        Err(e) => out.push_str(e.user_message()),
    }

    out
}

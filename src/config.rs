use anyhow::Result;
use std::env;

use crate::models::ResponseShape;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "openai" | "openrouter" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// `None` is allowed at startup; calls then fail with a clear error.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
    pub response_shape: ResponseShape,
    pub image_prompt: Option<String>,
    pub text_prompt: Option<String>,
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            gemini: ProviderSettings {
                api_key: None,
                model: DEFAULT_GEMINI_MODEL.to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            },
            openai: ProviderSettings {
                api_key: None,
                model: DEFAULT_OPENAI_MODEL.to_string(),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            },
            response_shape: ResponseShape::Text,
            image_prompt: None,
            text_prompt: None,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let provider = match get("AI_PROVIDER") {
            Some(raw) => ProviderKind::from_string(&raw).ok_or_else(|| {
                anyhow::anyhow!("Unknown AI_PROVIDER '{}' (expected 'gemini' or 'openai')", raw)
            })?,
            None => defaults.provider,
        };

        let response_shape = match get("RESPONSE_SHAPE") {
            Some(raw) => ResponseShape::from_string(&raw).ok_or_else(|| {
                anyhow::anyhow!("Unknown RESPONSE_SHAPE '{}' (expected 'text' or 'json')", raw)
            })?,
            None => defaults.response_shape,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", raw, e))?,
            None => defaults.port,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid MAX_BODY_BYTES '{}': {}", raw, e))?,
            None => defaults.max_body_bytes,
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            provider,
            gemini: ProviderSettings {
                api_key: get(GEMINI_API_KEY_ENV),
                model: get("GEMINI_MODEL").unwrap_or(defaults.gemini.model),
                base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini.base_url),
            },
            openai: ProviderSettings {
                api_key: get(OPENAI_API_KEY_ENV),
                model: get("OPENAI_MODEL").unwrap_or(defaults.openai.model),
                base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
            },
            response_shape,
            image_prompt: get("ANALYSIS_PROMPT_IMAGE"),
            text_prompt: get("ANALYSIS_PROMPT_TEXT"),
            host: get("HOST").unwrap_or(defaults.host),
            port,
            cors_allowed_origins,
            max_body_bytes,
        })
    }

    pub fn active_provider(&self) -> &ProviderSettings {
        match self.provider {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self.provider {
            ProviderKind::Gemini => GEMINI_API_KEY_ENV,
            ProviderKind::OpenAi => OPENAI_API_KEY_ENV,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.response_shape, ResponseShape::Text);
        assert_eq!(config.port, 5000);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.gemini.api_key.is_none());
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_openai_selection_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("AI_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("RESPONSE_SHAPE", "json"),
            ("PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:5173, https://fit.example.com,"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.active_provider().api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.active_provider().model, "gpt-4o");
        assert_eq!(config.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(config.response_shape, ResponseShape::Json);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:5173", "https://fit.example.com"]
        );
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_unknown_provider_fails_fast() {
        let err = Config::from_lookup(lookup(&[("AI_PROVIDER", "claude")])).unwrap_err();
        assert!(err.to_string().contains("Unknown AI_PROVIDER"));
    }

    #[test]
    fn test_invalid_port_fails_fast() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
    }
}

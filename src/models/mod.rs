use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Body of `POST /api/foodTextAnalysis` as sent by the browser form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    // The form posts body metrics along with the photo; numbers or strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<serde_json::Value>,
}

impl AnalysisRequest {
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            image_base64: Some(data.into()),
            mime_type: Some(mime_type.into()),
            ..Self::default()
        }
    }

    pub fn food(name: impl Into<String>) -> Self {
        Self {
            food_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// What actually gets sent to the provider, after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FoodInput {
    /// Bare base64 payload, data-URI header already removed.
    Image { data: String, mime_type: String },
    Text { food_name: String },
}

impl FoodInput {
    pub fn kind(&self) -> &'static str {
        match self {
            FoodInput::Image { .. } => "image",
            FoodInput::Text { .. } => "text",
        }
    }

    /// `data:<mime>;base64,<payload>` form used by OpenAI-style APIs.
    pub fn data_url(&self) -> Option<String> {
        match self {
            FoodInput::Image { data, mime_type } => {
                Some(format!("data:{};base64,{}", mime_type, data))
            }
            FoodInput::Text { .. } => None,
        }
    }
}

/// Canonical nutrition schema for the structured response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEstimate {
    #[serde(deserialize_with = "deserialize_amount")]
    pub calories: f64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub protein: f64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub fat: f64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub carbs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

/// Relay answer: verbatim text under `result`, or the spread estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Text { result: String },
    Structured(NutritionEstimate),
}

impl AnalysisResult {
    pub fn text(result: impl Into<String>) -> Self {
        AnalysisResult::Text {
            result: result.into(),
        }
    }
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisResult::Text { result } => write!(f, "{}", result),
            AnalysisResult::Structured(n) => {
                if let Some(food) = &n.food {
                    writeln!(f, "Food: {}", food)?;
                }
                writeln!(f, "Calories: {} kcal", n.calories)?;
                writeln!(f, "Protein: {} g", n.protein)?;
                writeln!(f, "Fat: {} g", n.fat)?;
                write!(f, "Carbs: {} g", n.carbs)?;
                if let Some(advice) = &n.advice {
                    write!(f, "\nAdvice: {}", advice)?;
                }
                Ok(())
            }
        }
    }
}

/// Which of the two answer forms the relay produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    #[default]
    Text,
    Json,
}

impl ResponseShape {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(ResponseShape::Text),
            "json" => Some(ResponseShape::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResponseShape::Text => "text",
            ResponseShape::Json => "json",
        };
        write!(f, "{}", s)
    }
}

/// Models answer `25`, `"25"`, `"25g"` or `"1,250 kcal"` interchangeably.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => parse_amount(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a nutrient amount: {:?}", s))),
    }
}

/// Pull the first number out of `"~1,250 kcal"`, `"12,5 g"` or `"-3"`.
///
/// A comma followed by exactly three digits groups thousands; any other comma
/// is a decimal comma.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let chars: Vec<char> = raw.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;
    let negative = start > 0 && chars[start - 1] == '-';

    let mut cleaned = String::new();
    if negative {
        cleaned.push('-');
    }

    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() || c == '.' => cleaned.push(c),
            ',' => {
                let digits = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
                if digits != 3 {
                    if digits == 0 || cleaned.contains('.') {
                        break;
                    }
                    cleaned.push('.');
                }
            }
            _ => break,
        }
        i += 1;
    }

    cleaned.parse::<f64>().ok()
}

pub mod ai_service; // Provider trait + factory
pub mod gemini;
pub mod openai; // OpenAI-compatible chat completions
pub mod prompt;

pub use ai_service::{create_provider, NutritionProvider, ProviderError};
pub use gemini::GeminiService;
pub use openai::OpenAiService;
pub use prompt::PromptTemplate;

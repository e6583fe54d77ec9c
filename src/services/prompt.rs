use crate::models::{FoodInput, ResponseShape};

const TEXT_IMAGE_PROMPT: &str = "Analyze this food image and give calories, protein, fat, carbs.";
const TEXT_FOOD_PROMPT: &str = "Analyze this food: {food}. Give calories, protein, fat, carbs.";

const JSON_IMAGE_PROMPT: &str = "Analyze this food image. Return a JSON object with keys: \
calories, protein, fat, carbs. Use plain numbers (kcal for calories, grams for the rest). \
Provide only the JSON.";
const JSON_FOOD_PROMPT: &str = "Analyze this food: {food}. Return a JSON object with keys: \
food, calories, protein, fat, carbs, advice. Use plain numbers (kcal for calories, grams for \
protein, fat and carbs) and keep advice to one sentence. Provide only the JSON.";

/// Instruction text sent with every provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub image: String,
    /// `{food}` is replaced with the submitted food name.
    pub text: String,
}

impl PromptTemplate {
    pub fn for_shape(shape: ResponseShape) -> Self {
        let (image, text) = match shape {
            ResponseShape::Text => (TEXT_IMAGE_PROMPT, TEXT_FOOD_PROMPT),
            ResponseShape::Json => (JSON_IMAGE_PROMPT, JSON_FOOD_PROMPT),
        };

        Self {
            image: image.to_string(),
            text: text.to_string(),
        }
    }

    pub fn with_overrides(mut self, image: Option<String>, text: Option<String>) -> Self {
        if let Some(image) = image {
            self.image = image;
        }
        if let Some(text) = text {
            self.text = text;
        }
        self
    }

    pub fn render(&self, input: &FoodInput) -> String {
        match input {
            FoodInput::Image { .. } => self.image.clone(),
            FoodInput::Text { food_name } => self.text.replace("{food}", food_name),
        }
    }
}

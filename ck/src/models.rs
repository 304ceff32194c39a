use serde::{Deserialize, Serialize};

/// A complete generated recipe. Produced atomically by one generation call
/// and immutable afterwards; the session owns it for the lifetime of one
/// user query.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub title: String,
    /// Short blurb, conventionally under 20 words. Not enforced.
    pub description: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<RecipeStep>,
}

/// One instruction unit of a recipe. Step order is significant: later
/// steps' illustration context is built from all earlier instructions.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RecipeStep {
    /// Free text, possibly containing `<<name|quantity>>` markup.
    pub instruction: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Absent and explicit null are both treated as "no insight".
    #[serde(default)]
    pub insight: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepType {
    Prep,
    Cook,
    Timing,
}

/// A creative use for ingredients left over after cooking the current
/// recipe. Regenerated per recipe, never persisted.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LeftoverSuggestion {
    pub title: String,
    pub description: String,
    #[serde(rename = "matchingIngredients")]
    pub matching_ingredients: Vec<String>,
}

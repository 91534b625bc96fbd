//! Static model metadata tables
//!
//! Enrichment is pure and total: the same id always yields the same record and
//! unknown ids fall back to the table's default profile.

use regex::Regex;
use tracing::warn;

use crate::models::Model;

/// Metadata applied to every model whose id matches a rule
#[derive(Debug, Clone, Copy)]
pub struct ModelProfile {
    pub input_cost: f64,
    pub output_cost: f64,
    pub context_window: u64,
    pub max_output: u64,
    pub images: bool,
    pub tools: bool,
    pub reasoning: bool,
    pub streaming: bool,
    pub categories: &'static [&'static str],
}

impl ModelProfile {
    pub const fn chat(
        input_cost: f64,
        output_cost: f64,
        context_window: u64,
        max_output: u64,
    ) -> Self {
        Self {
            input_cost,
            output_cost,
            context_window,
            max_output,
            images: false,
            tools: true,
            reasoning: false,
            streaming: true,
            categories: &["chat"],
        }
    }

    pub const fn with_images(mut self) -> Self {
        self.images = true;
        self
    }

    pub const fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }

    pub const fn without_tools(mut self) -> Self {
        self.tools = false;
        self
    }

    pub const fn with_categories(mut self, categories: &'static [&'static str]) -> Self {
        self.categories = categories;
        self
    }

    fn apply(&self, mut model: Model, rule: &str) -> Model {
        model.cost_per_million_input_units = self.input_cost.max(0.0);
        model.cost_per_million_output_units = self.output_cost.max(0.0);
        model.context_window = self.context_window;
        model.max_output_units = self.max_output;
        model.supports_images = self.images;
        model.supports_tools = self.tools;
        model.can_reason = self.reasoning;
        model.can_stream = self.streaming;
        model
            .categories
            .extend(self.categories.iter().map(|c| c.to_string()));
        model
            .capabilities
            .insert("profile".to_string(), rule.to_string());
        model
    }
}

/// Ordered id-pattern rules plus a fallback; the first match wins
pub struct EnrichmentTable {
    rules: Vec<(Regex, &'static str, ModelProfile)>,
    fallback: ModelProfile,
}

impl EnrichmentTable {
    /// Build a table from `(pattern, profile)` pairs
    ///
    /// Patterns are matched case-insensitively against the model id. A pattern
    /// that fails to compile is dropped with a warning.
    pub fn new(rules: &[(&'static str, ModelProfile)], fallback: ModelProfile) -> Self {
        let rules = rules
            .iter()
            .filter_map(|(pattern, profile)| match Regex::new(&format!("(?i){}", pattern)) {
                Ok(regex) => Some((regex, *pattern, *profile)),
                Err(err) => {
                    warn!("Dropping invalid enrichment pattern '{}': {}", pattern, err);
                    None
                }
            })
            .collect();
        Self { rules, fallback }
    }

    /// Fill cost, limits, flags and categories for `model`
    pub fn enrich(&self, model: Model) -> Model {
        let matched = self
            .rules
            .iter()
            .find(|(regex, _, _)| regex.is_match(&model.id));
        match matched {
            Some((_, rule, profile)) => profile.apply(model, rule),
            None => self.fallback.apply(model, "default"),
        }
    }
}

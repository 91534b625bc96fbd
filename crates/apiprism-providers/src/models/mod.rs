//! Data models for providers

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub mod endpoint;

pub use endpoint::{
    Endpoint, EndpointCache, EndpointList, EndpointOutcome, EndpointStatus, HttpMethod,
};

/// A remote capability discovered from a provider (chat model, embedding model, voice, ...)
///
/// Built fresh on every discovery call and never mutated afterwards; it is a
/// point-in-time snapshot, not a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Vendor-stable identifier, unique within a provider, never empty
    pub id: String,
    /// Display label
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Creation time reported by the vendor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Cost per million input units (tokens, characters, seconds); zero when not billed that way
    #[serde(default)]
    pub cost_per_million_input_units: f64,
    /// Cost per million output units
    #[serde(default)]
    pub cost_per_million_output_units: f64,
    /// Maximum context window
    #[serde(default)]
    pub context_window: u64,
    /// Maximum output units per request
    #[serde(default)]
    pub max_output_units: u64,
    /// Accepts image input
    #[serde(default)]
    pub supports_images: bool,
    /// Supports tool/function calling
    #[serde(default)]
    pub supports_tools: bool,
    /// Exposes a reasoning mode
    #[serde(default)]
    pub can_reason: bool,
    /// Supports streamed responses
    #[serde(default)]
    pub can_stream: bool,
    /// Ordered vendor-defined tags
    #[serde(default)]
    pub categories: Vec<String>,
    /// Free-form capability descriptors
    #[serde(default)]
    pub capabilities: HashMap<String, String>,
}

impl Model {
    /// Create a model with the given id; the display name defaults to the id
    pub fn new(id: impl Into<String>) -> Result<Self, ProviderError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProviderError::InvalidModel(
                "model id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name: id.clone(),
            id,
            description: String::new(),
            created_at: None,
            cost_per_million_input_units: 0.0,
            cost_per_million_output_units: 0.0,
            context_window: 0,
            max_output_units: 0,
            supports_images: false,
            supports_tools: false,
            can_reason: false,
            can_stream: false,
            categories: Vec::new(),
            capabilities: HashMap::new(),
        })
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the vendor creation timestamp from unix seconds
    pub fn with_created_unix(mut self, seconds: i64) -> Self {
        self.created_at = DateTime::<Utc>::from_timestamp(seconds, 0);
        self
    }

    /// Set costs per million units; negative or non-finite inputs are stored as zero
    pub fn with_costs(mut self, input: f64, output: f64) -> Self {
        self.cost_per_million_input_units = non_negative(input);
        self.cost_per_million_output_units = non_negative(output);
        self
    }

    /// Set the context window and output limit
    pub fn with_limits(mut self, context_window: u64, max_output_units: u64) -> Self {
        self.context_window = context_window;
        self.max_output_units = max_output_units;
        self
    }

    /// Append a category tag
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Add a free-form capability descriptor
    pub fn with_capability(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.capabilities.insert(key.into(), value.into());
        self
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Provider-level description of what a backend supports
///
/// A pure function of the provider's identity; never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub chat: bool,
    pub fim: bool,
    pub embeddings: bool,
    pub fine_tuning: bool,
    pub agents: bool,
    pub file_upload: bool,
    pub streaming: bool,
    pub json_mode: bool,
    pub vision: bool,
    pub audio: bool,
    /// Request fields the vendor accepts, in vendor documentation order
    pub supported_parameters: Vec<String>,
    /// Free-form security labels (TLS, key scoping, ...)
    pub security_features: Vec<String>,
    pub max_requests_per_minute: u32,
    pub max_tokens_per_request: u32,
}

impl ProviderCapabilities {
    /// Replace the supported parameter list
    pub fn with_parameters(mut self, parameters: &[&str]) -> Self {
        self.supported_parameters = parameters.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Replace the security feature list
    pub fn with_security_features(mut self, features: &[&str]) -> Self {
        self.security_features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Whether the vendor accepts `parameter` in requests
    pub fn supports_parameter(&self, parameter: &str) -> bool {
        self.supported_parameters.iter().any(|p| p == parameter)
    }
}

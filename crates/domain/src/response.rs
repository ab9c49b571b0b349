use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::AddAssign;

/// `source` value for responses produced by the synthesizer.
pub const SYNTHESIZED_SOURCE: &str = "synthesized";

/// An opaque citation record exactly as the upstream returned it
/// (usually a URL string, sometimes an object with url/title/snippet).
pub type Citation = Value;

/// Token usage for a completion.
///
/// All three counters are always present. Upstreams that omit a counter
/// report 0; `total_tokens` is taken as-is and is not recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Field-wise sum. Counters come from upstream JSON, so the sum saturates.
impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// The normalized result of one upstream call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text. Empty when the upstream produced nothing.
    pub content: String,
    /// Id of the provider that produced this response, or
    /// [`SYNTHESIZED_SOURCE`].
    pub source: String,
    pub usage: Usage,
    /// Provider-specific extras (model, finish reason, safety ratings, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Only set by retrieval-capable providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl ProviderResponse {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            usage: Usage::default(),
            metadata: Map::new(),
            citations: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = Some(citations);
        self
    }

    /// The model name recorded in metadata, if any.
    pub fn model(&self) -> Option<&str> {
        self.metadata.get("model").and_then(|v| v.as_str())
    }
}

//! Synthesizer: merges labeled responses into one answer using the
//! reasoning provider as summarizer.

use crate::hybrid::HybridResponses;
use crate::registry::ProviderRegistry;
use crate::router::LlmRouter;
use crate::traits::{ProviderClient, RequestOptions};
use pa_domain::config::{LlmConfig, ProviderKind};
use pa_domain::error::{Error, Result};
use pa_domain::response::{Citation, ProviderResponse, Usage, SYNTHESIZED_SOURCE};
use pa_domain::trace::TraceEvent;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_SYNTHESIS_INSTRUCTION: &str =
    "Synthesize the following information into a comprehensive response:";

pub const SYNTHESIS_SYSTEM_DIRECTIVE: &str = "You are an expert at synthesizing information from \
     multiple sources. Provide a comprehensive, well-structured response that combines the best \
     insights from all sources.";

/// Build the combined prompt: the instruction, then one
/// `From {label}:\n{content}` block per response.
pub fn combined_prompt(responses: &HybridResponses, instruction: &str) -> String {
    let blocks: Vec<String> = responses
        .iter()
        .map(|(label, resp)| format!("From {label}:\n{}", resp.content))
        .collect();
    format!("{instruction}\n\n{}", blocks.join("\n\n"))
}

/// Merges hybrid results through a single provider.
#[derive(Clone)]
pub struct Synthesizer {
    provider: Arc<dyn ProviderClient>,
    default_instruction: String,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            provider,
            default_instruction: DEFAULT_SYNTHESIS_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.default_instruction = instruction.into();
        self
    }

    /// Pick the synthesis provider: `llm.synthesis.provider` if set,
    /// otherwise the first initialized reasoning provider.
    pub fn from_config(config: &LlmConfig, registry: &ProviderRegistry) -> Option<Self> {
        let provider = match config.synthesis.provider {
            Some(ref id) => registry.get(id),
            None => config
                .providers
                .iter()
                .filter(|p| p.kind == ProviderKind::Google)
                .find_map(|p| registry.get(&p.id)),
        }?;

        let mut synthesizer = Self::new(provider);
        if let Some(ref instruction) = config.synthesis.instruction {
            synthesizer = synthesizer.with_instruction(instruction.clone());
        }
        Some(synthesizer)
    }

    pub fn provider_id(&self) -> &str {
        self.provider.provider_id()
    }

    /// Merge `responses` into one `synthesized` response.
    ///
    /// Citations are concatenated in order with duplicates kept; the list
    /// is always present, empty when no input carried any. Usage is the sum of every
    /// input plus the synthesis call. Errors from the synthesis call are
    /// returned unchanged.
    pub async fn synthesize(
        &self,
        responses: &HybridResponses,
        instruction: Option<&str>,
    ) -> Result<ProviderResponse> {
        let instruction = instruction.unwrap_or(self.default_instruction.as_str());
        let prompt = combined_prompt(responses, instruction);

        let mut usage = Usage::default();
        let mut citations: Vec<Citation> = Vec::new();
        for (_, resp) in responses.iter() {
            usage += &resp.usage;
            citations.extend(resp.citations.iter().flatten().cloned());
        }

        let opts = RequestOptions::default().with_system_instruction(SYNTHESIS_SYSTEM_DIRECTIVE);
        let merged = self.provider.generate(&prompt, &opts).await?;
        usage += &merged.usage;

        let sources: Vec<String> = responses
            .labels()
            .iter()
            .map(|l| l.as_str().to_string())
            .collect();
        let synthesis_model = merged
            .model()
            .map(|m| Value::String(m.to_string()))
            .unwrap_or(Value::Null);

        TraceEvent::SynthesisCompleted {
            sources: sources.clone(),
            citations: citations.len(),
            total_tokens: usage.total_tokens,
        }
        .emit();
        tracing::info!(
            provider = %self.provider_id(),
            sources_count = sources.len(),
            "response synthesis completed"
        );

        let mut out = ProviderResponse::new(SYNTHESIZED_SOURCE, merged.content)
            .with_usage(usage)
            .with_metadata("sources", sources)
            .with_metadata("synthesis_model", synthesis_model);
        out.citations = Some(citations);
        Ok(out)
    }
}

impl LlmRouter {
    /// Merge hybrid results with the configured synthesizer.
    pub async fn synthesize(
        &self,
        responses: &HybridResponses,
        instruction: Option<&str>,
    ) -> Result<ProviderResponse> {
        let synthesizer = self
            .synthesizer()
            .ok_or_else(|| Error::Config("no synthesis provider configured".into()))?;
        synthesizer.synthesize(responses, instruction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::HybridLabel;

    #[test]
    fn combined_prompt_layout() {
        let responses: HybridResponses = [
            (HybridLabel::Search, ProviderResponse::new("perplexity", "S")),
            (HybridLabel::Reasoning, ProviderResponse::new("gemini", "R")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            combined_prompt(&responses, "Merge:"),
            "Merge:\n\nFrom search:\nS\n\nFrom reasoning:\nR"
        );
    }

    #[test]
    fn combined_prompt_with_no_responses_is_just_the_instruction() {
        assert_eq!(
            combined_prompt(&HybridResponses::new(), DEFAULT_SYNTHESIS_INSTRUCTION),
            format!("{DEFAULT_SYNTHESIS_INSTRUCTION}\n\n")
        );
    }
}

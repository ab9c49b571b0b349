use serde::Serialize;

/// Structured trace events emitted by the routing layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        category: String,
        duration_ms: u64,
        success: bool,
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
    },
    LlmFallback {
        category: String,
        from_provider: String,
        to_provider: String,
        reason: String,
    },
    HybridCompleted {
        requested: Vec<String>,
        succeeded: Vec<String>,
        duration_ms: u64,
    },
    SynthesisCompleted {
        sources: Vec<String>,
        citations: usize,
        total_tokens: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pa_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_event_is_tagged() {
        let ev = TraceEvent::LlmFallback {
            category: "analysis".into(),
            from_provider: "gemini".into(),
            to_provider: "perplexity".into(),
            reason: "HTTP 503".into(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "LlmFallback");
        assert_eq!(v["to_provider"], "perplexity");
    }
}

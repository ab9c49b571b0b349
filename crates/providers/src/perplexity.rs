//! Perplexity Sonar adapter (the search-capable provider).
//!
//! Speaks the OpenAI-style `/chat/completions` wire format plus Perplexity's
//! retrieval extras (`return_citations`, `return_images`,
//! `search_domain_filter`) and the top-level `citations` array.

use crate::traits::{ProviderClient, RequestOptions};
use crate::util::{counter, from_reqwest, read_json, resolve_api_key, HttpHandle};
use pa_domain::category::RequestCategory;
use pa_domain::config::{ProviderConfig, ProviderKind};
use pa_domain::error::{Error, Result};
use pa_domain::response::{ProviderResponse, Usage};
use pa_domain::stream::{BoxStream, StreamEvent};
use serde_json::Value;
use std::time::Duration;

const FACT_CHECK_SYSTEM: &str = "You are a fact-checker. Analyze the statement and provide:
1. Verification status (True/False/Partially True/Unverifiable)
2. Supporting evidence with citations
3. Contradicting evidence if any
4. Confidence level
5. Additional context or nuances";

/// Build the user prompt for a fact-check request.
pub fn fact_check_prompt(statement: &str, context: Option<&str>) -> String {
    let mut prompt = format!("Fact-check this statement: {statement}");
    if let Some(context) = context {
        prompt.push_str("\n\nContext: ");
        prompt.push_str(context);
    }
    prompt
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider adapter for the Perplexity chat completions API.
pub struct PerplexityProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
    http: HttpHandle,
}

impl PerplexityProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let http = HttpHandle::new(&cfg.id, Duration::from_millis(cfg.effective_timeout_ms()))?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.effective_base_url(),
            api_key,
            default_model: cfg.effective_model(),
            temperature: cfg.effective_temperature(),
            max_tokens: cfg.effective_max_tokens(),
            http,
        })
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
    }

    // ── Internal: build the JSON body ─────────────────────────────

    fn effective_model(&self, opts: &RequestOptions) -> String {
        opts.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_body(&self, prompt: &str, opts: &RequestOptions, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref si) = opts.system_instruction {
            messages.push(serde_json::json!({"role": "system", "content": si}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let mut body = serde_json::json!({
            "model": self.effective_model(opts),
            "messages": messages,
            "temperature": opts.temperature.unwrap_or(self.temperature),
            "max_tokens": opts.max_tokens.unwrap_or(self.max_tokens),
            "return_citations": opts.return_citations.unwrap_or(true),
            "return_images": false,
        });

        if !opts.search_domain_filter.is_empty() {
            body["search_domain_filter"] = serde_json::json!(opts.search_domain_filter);
        }
        if stream {
            body["stream"] = Value::Bool(true);
        }

        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let client = self.http.client()?;
        self.authed_post(&client)
            .json(body)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.id, e))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize a chat completions response. Missing message content is
/// malformed; a missing `citations` array becomes an empty list.
fn parse_chat_response(body: &Value, provider: &str, model: &str) -> Result<ProviderResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::upstream(provider, "malformed response: no choices"))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::upstream(provider, "malformed response: no message content"))?;

    let finish_reason = choice
        .get("finish_reason")
        .cloned()
        .unwrap_or(Value::Null);

    let citations = body
        .get("citations")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(ProviderResponse::new(provider, content)
        .with_usage(parse_usage(body.get("usage")))
        .with_metadata("model", model)
        .with_metadata("finish_reason", finish_reason)
        .with_citations(citations))
}

fn parse_usage(v: Option<&Value>) -> Usage {
    Usage::new(
        counter(v, "prompt_tokens"),
        counter(v, "completion_tokens"),
        counter(v, "total_tokens"),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a single SSE data payload, handling the `[DONE]` sentinel.
/// Chunks that are not valid JSON are skipped.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed perplexity stream chunk");
            return Vec::new();
        }
    };

    let text = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    if text.is_empty() {
        Vec::new()
    } else {
        vec![Ok(StreamEvent::Token {
            text: text.to_string(),
        })]
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderClient for PerplexityProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn supported_categories(&self) -> &[RequestCategory] {
        ProviderKind::Perplexity.supported_categories()
    }

    async fn generate(&self, prompt: &str, opts: &RequestOptions) -> Result<ProviderResponse> {
        let model = self.effective_model(opts);
        let body = self.build_body(prompt, opts, false);

        tracing::debug!(provider = %self.id, model = %model, "perplexity chat request");

        let resp = self.send(&body).await?;
        let json = read_json(&self.id, resp).await?;
        let parsed = parse_chat_response(&json, &self.id, &model)?;

        tracing::info!(
            provider = %self.id,
            tokens_used = parsed.usage.total_tokens,
            citations_count = parsed.citations.as_ref().map_or(0, Vec::len),
            finish_reason = ?parsed.metadata.get("finish_reason"),
            "perplexity search completed"
        );

        Ok(parsed)
    }

    async fn fact_check(&self, statement: &str, context: Option<&str>) -> Result<ProviderResponse> {
        let opts = RequestOptions {
            return_citations: Some(true),
            ..Default::default()
        }
        .with_system_instruction(FACT_CHECK_SYSTEM);

        let resp = self
            .generate(&fact_check_prompt(statement, context), &opts)
            .await?;

        tracing::info!(
            provider = %self.id,
            statement_length = statement.len(),
            "fact-check completed"
        );

        Ok(resp
            .with_metadata("statement", statement)
            .with_metadata("checked_at", chrono::Utc::now().to_rfc3339()))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_body(prompt, opts, true);

        tracing::debug!(provider = %self.id, "perplexity stream request");

        let resp = self.send(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(|e| from_reqwest(&self.id, e))?;
            return Err(Error::upstream(
                &self.id,
                format!("HTTP {} - {}", status.as_u16(), err_text),
            ));
        }

        Ok(crate::sse::sse_response_stream(
            self.id.clone(),
            resp,
            parse_sse_data,
        ))
    }

    fn close(&self) -> bool {
        let released = self.http.close();
        if released {
            tracing::debug!(provider = %self.id, "perplexity client closed");
        }
        released
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pa_domain::config::{AuthConfig, ProviderKind};

    fn provider() -> PerplexityProvider {
        let mut cfg = ProviderConfig::with_env_key("perplexity", ProviderKind::Perplexity, "UNUSED");
        cfg.auth = AuthConfig {
            key: Some("pplx-secret".into()),
            ..Default::default()
        };
        PerplexityProvider::from_config(&cfg).unwrap()
    }

    #[test]
    fn body_defaults() {
        let body = provider().build_body("q", &RequestOptions::default(), false);
        assert_eq!(body["model"], "sonar-pro");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["return_citations"], true);
        assert_eq!(body["return_images"], false);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("search_domain_filter").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn body_with_system_filter_and_stream() {
        let opts = RequestOptions {
            search_domain_filter: vec!["arxiv.org".into()],
            return_citations: Some(false),
            ..Default::default()
        }
        .with_system_instruction("be precise");
        let body = provider().build_body("q", &opts, true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be precise");
        assert_eq!(body["messages"][1]["content"], "q");
        assert_eq!(body["search_domain_filter"], serde_json::json!(["arxiv.org"]));
        assert_eq!(body["return_citations"], false);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn parse_response_with_citations() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "Paris"}, "finish_reason": "stop"}],
            "citations": ["https://a.example", {"url": "https://b.example"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        });
        let resp = parse_chat_response(&body, "perplexity", "sonar-pro").unwrap();
        assert_eq!(resp.content, "Paris");
        assert_eq!(resp.usage, Usage::new(3, 1, 4));
        assert_eq!(resp.metadata["finish_reason"], "stop");
        assert_eq!(resp.citations.unwrap().len(), 2);
    }

    #[test]
    fn parse_response_without_citations_or_usage() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "x"}}]
        });
        let resp = parse_chat_response(&body, "perplexity", "sonar-pro").unwrap();
        assert_eq!(resp.citations, Some(Vec::new()));
        assert_eq!(resp.usage, Usage::default());
        assert_eq!(resp.metadata["finish_reason"], Value::Null);
    }

    #[test]
    fn parse_response_without_content_is_malformed() {
        let body = serde_json::json!({"choices": [{"message": {}}]});
        let err = parse_chat_response(&body, "perplexity", "m").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("malformed"));

        let err = parse_chat_response(&serde_json::json!({}), "perplexity", "m").unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn sse_done_sentinel() {
        let events = parse_sse_data("[DONE]");
        assert!(matches!(events[0], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn sse_delta_and_garbage() {
        let events = parse_sse_data(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Token { text: "Hel".into() }
        );
        assert!(parse_sse_data("{oops").is_empty());
        assert!(parse_sse_data(r#"{"choices":[{"delta":{}}]}"#).is_empty());
    }

    #[test]
    fn fact_check_prompt_format() {
        assert_eq!(
            fact_check_prompt("The sky is green", None),
            "Fact-check this statement: The sky is green"
        );
        assert_eq!(
            fact_check_prompt("X", Some("as of 2024")),
            "Fact-check this statement: X\n\nContext: as of 2024"
        );
    }
}

//! Google Gemini adapter (the reasoning-capable provider).
//!
//! Implements the Gemini `generateContent` and `streamGenerateContent` APIs.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use crate::traits::{ProviderClient, RequestOptions};
use crate::util::{counter, from_reqwest, read_json, resolve_api_key, HttpHandle};
use pa_domain::category::RequestCategory;
use pa_domain::config::{ProviderConfig, ProviderKind};
use pa_domain::error::{Error, Result};
use pa_domain::response::{ProviderResponse, Usage};
use pa_domain::stream::{BoxStream, StreamEvent};
use serde_json::Value;
use std::time::Duration;

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

const TOP_P: f32 = 0.8;
const TOP_K: u32 = 40;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider adapter for the Google Gemini API.
pub struct GoogleProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
    http: HttpHandle,
}

impl GoogleProvider {
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

    // ── Internal helpers ───────────────────────────────────────────

    fn effective_model(&self, opts: &RequestOptions) -> String {
        opts.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        )
    }

    fn build_body(&self, prompt: &str, opts: &RequestOptions) -> Value {
        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}],
            }],
            "generationConfig": {
                "temperature": opts.temperature.unwrap_or(self.temperature),
                "maxOutputTokens": opts.max_tokens.unwrap_or(self.max_tokens),
                "topP": TOP_P,
                "topK": TOP_K,
            },
            "safetySettings": safety_settings(),
        });

        if let Some(ref si) = opts.system_instruction {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": si}]
            });
        }

        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let client = self.http.client()?;
        client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.id, e))
    }
}

fn safety_settings() -> Value {
    Value::Array(
        SAFETY_CATEGORIES
            .iter()
            .map(|category| {
                serde_json::json!({
                    "category": category,
                    "threshold": "BLOCK_MEDIUM_AND_ABOVE",
                })
            })
            .collect(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize a `generateContent` response.
///
/// A response without candidates (e.g. a blocked prompt) is not an error:
/// it yields empty content with finish reason `UNKNOWN`.
fn parse_gemini_response(body: &Value, provider: &str, model: &str) -> Result<ProviderResponse> {
    if !body.is_object() {
        return Err(Error::upstream(provider, "malformed response: expected a JSON object"));
    }

    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let content = candidate.map(candidate_text).unwrap_or_default();

    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|v| v.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();

    let safety_ratings = candidate
        .and_then(|c| c.get("safetyRatings"))
        .and_then(|v| v.as_array())
        .filter(|a| !a.is_empty())
        .map(|ratings| {
            Value::Array(
                ratings
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "category": r.get("category").cloned().unwrap_or(Value::Null),
                            "probability": r.get("probability").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect(),
            )
        })
        .unwrap_or(Value::Null);

    let mut resp = ProviderResponse::new(provider, content)
        .with_usage(parse_gemini_usage(body.get("usageMetadata")))
        .with_metadata("model", model)
        .with_metadata("finish_reason", finish_reason)
        .with_metadata("safety_ratings", safety_ratings);

    if let Some(reason) = body
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|v| v.as_str())
    {
        resp = resp.with_metadata("block_reason", reason);
    }

    Ok(resp)
}

fn candidate_text(candidate: &Value) -> String {
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_gemini_usage(v: Option<&Value>) -> Usage {
    Usage::new(
        counter(v, "promptTokenCount"),
        counter(v, "candidatesTokenCount"),
        counter(v, "totalTokenCount"),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a single Gemini streaming SSE data payload.
fn parse_gemini_sse_data(provider: &str, data: &str) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::upstream(
                provider,
                format!("malformed stream chunk: {e}"),
            )));
            return events;
        }
    };

    let candidate = match v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    {
        Some(c) => c,
        None => return events,
    };

    let text = candidate_text(candidate);
    if !text.is_empty() {
        events.push(Ok(StreamEvent::Token { text }));
    }

    if let Some(fr) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        events.push(Ok(StreamEvent::Done {
            usage: Some(parse_gemini_usage(v.get("usageMetadata"))),
            finish_reason: Some(fr.to_string()),
        }));
    }

    events
}

/// Redact API key from URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderClient for GoogleProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn supported_categories(&self) -> &[RequestCategory] {
        ProviderKind::Google.supported_categories()
    }

    async fn generate(&self, prompt: &str, opts: &RequestOptions) -> Result<ProviderResponse> {
        let model = self.effective_model(opts);
        let url = self.generate_url(&model);
        let body = self.build_body(prompt, opts);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "gemini generate request");

        let resp = self.post(&url, &body).await?;
        let json = read_json(&self.id, resp).await?;
        let parsed = parse_gemini_response(&json, &self.id, &model)?;

        tracing::info!(
            provider = %self.id,
            tokens_used = parsed.usage.total_tokens,
            finish_reason = ?parsed.metadata.get("finish_reason"),
            "gemini generation completed"
        );

        Ok(parsed)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let model = self.effective_model(opts);
        let url = self.stream_url(&model);
        let body = self.build_body(prompt, opts);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "gemini stream request");

        let resp = self.post(&url, &body).await?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(|e| from_reqwest(&self.id, e))?;
            return Err(Error::upstream(
                provider_id,
                format!("HTTP {} - {}", status.as_u16(), err_text),
            ));
        }

        let parser_id = provider_id.clone();
        Ok(crate::sse::sse_response_stream(provider_id, resp, move |data| {
            parse_gemini_sse_data(&parser_id, data)
        }))
    }

    fn close(&self) -> bool {
        let released = self.http.close();
        if released {
            tracing::debug!(provider = %self.id, "gemini client closed");
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

    fn provider() -> GoogleProvider {
        let mut cfg = ProviderConfig::with_env_key("gemini", ProviderKind::Google, "UNUSED");
        cfg.auth = AuthConfig {
            key: Some("secret".into()),
            ..Default::default()
        };
        GoogleProvider::from_config(&cfg).unwrap()
    }

    #[test]
    fn body_carries_generation_and_safety_config() {
        let p = provider();
        let body = p.build_body("hello", &RequestOptions::default());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn body_includes_system_instruction_and_overrides() {
        let p = provider();
        let opts = RequestOptions {
            max_tokens: Some(64),
            ..Default::default()
        }
        .with_system_instruction("be brief");
        let body = p.build_body("hello", &opts);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn parse_full_response() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "probability": "NEGLIGIBLE", "blocked": false}
                ]
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 9}
        });
        let resp = parse_gemini_response(&body, "gemini", "gemini-2.5-flash").unwrap();
        assert_eq!(resp.content, "Hello, world");
        assert_eq!(resp.source, "gemini");
        // Upstream total is trusted as-is.
        assert_eq!(resp.usage, Usage::new(4, 2, 9));
        assert_eq!(resp.metadata["finish_reason"], "STOP");
        assert_eq!(resp.metadata["model"], "gemini-2.5-flash");
        assert_eq!(
            resp.metadata["safety_ratings"],
            serde_json::json!([{"category": "HARM_CATEGORY_HARASSMENT", "probability": "NEGLIGIBLE"}])
        );
        assert!(resp.citations.is_none());
    }

    #[test]
    fn parse_without_candidates_is_empty_not_error() {
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let resp = parse_gemini_response(&body, "gemini", "m").unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.usage, Usage::default());
        assert_eq!(resp.metadata["finish_reason"], "UNKNOWN");
        assert_eq!(resp.metadata["safety_ratings"], Value::Null);
        assert_eq!(resp.metadata["block_reason"], "SAFETY");
    }

    #[test]
    fn parse_non_object_is_malformed() {
        let err = parse_gemini_response(&serde_json::json!([1, 2]), "gemini", "m").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn sse_chunk_with_finish_reason_emits_token_then_done() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]},"finishReason":"STOP"}],
                      "usageMetadata":{"promptTokenCount":1,"candidatesTokenCount":1,"totalTokenCount":2}}"#;
        let events: Vec<StreamEvent> = parse_gemini_sse_data("gemini", data)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Token { text: "hi".into() },
                StreamEvent::Done {
                    usage: Some(Usage::new(1, 1, 2)),
                    finish_reason: Some("STOP".into()),
                },
            ]
        );
    }

    #[test]
    fn sse_chunk_invalid_json_is_upstream_error() {
        let events = parse_gemini_sse_data("gemini", "{not json");
        assert_eq!(events.len(), 1);
        assert!(events[0].as_ref().unwrap_err().is_retryable());
    }

    #[test]
    fn redact_hides_key() {
        let url = "https://x/v1beta/models/m:streamGenerateContent?key=abc123&alt=sse";
        assert_eq!(
            redact_url_key(url),
            "https://x/v1beta/models/m:streamGenerateContent?key=[REDACTED]&alt=sse"
        );
        assert_eq!(redact_url_key("https://x/no-key"), "https://x/no-key");
    }

    #[test]
    fn supports_only_reasoning_categories() {
        let p = provider();
        assert!(p.supports(RequestCategory::Reasoning));
        assert!(p.supports(RequestCategory::Analysis));
        assert!(!p.supports(RequestCategory::Search));
        assert!(!p.supports(RequestCategory::FactCheck));
    }
}

use pa_domain::category::RequestCategory;
use pa_domain::error::{Error, Result};
use pa_domain::response::ProviderResponse;
use pa_domain::stream::{BoxStream, StreamEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call options. Unset fields fall back to the provider's configured
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// System-level directive sent alongside the prompt.
    pub system_instruction: Option<String>,
    /// Model identifier override.
    pub model: Option<String>,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Maximum output tokens override.
    pub max_tokens: Option<u32>,
    /// Ask a retrieval provider for citations. Defaults to `true`.
    pub return_citations: Option<bool>,
    /// Restrict retrieval to these domains (search provider only).
    pub search_domain_filter: Vec<String>,
    /// Extra context for fact-check requests.
    pub context: Option<String>,
}

impl RequestOptions {
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capability interface every upstream adapter implements.
///
/// Adapters translate between [`ProviderResponse`] and one provider's HTTP
/// wire format. They never retry; fallback policy lives in the router.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;

    /// Categories this provider can serve.
    fn supported_categories(&self) -> &[RequestCategory];

    fn supports(&self, category: RequestCategory) -> bool {
        self.supported_categories().contains(&category)
    }

    /// Single-shot text generation.
    async fn generate(&self, prompt: &str, opts: &RequestOptions) -> Result<ProviderResponse>;

    /// Verify `statement` against live sources, always with citations.
    async fn fact_check(&self, statement: &str, context: Option<&str>) -> Result<ProviderResponse> {
        let _ = (statement, context);
        Err(Error::UnsupportedCategory {
            provider: self.provider_id().to_string(),
            category: RequestCategory::FactCheck,
        })
    }

    /// Streaming variant of [`ProviderClient::generate`].
    async fn generate_stream(
        &self,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let _ = (prompt, opts);
        Err(Error::Config(format!(
            "provider '{}' does not support streaming",
            self.provider_id()
        )))
    }

    /// Release the provider's network resources. Idempotent; returns `true`
    /// only on the call that actually released them.
    fn close(&self) -> bool;
}

/// Run `prompt` on `client` for `category`.
///
/// Rejects categories the client does not serve before any network call.
/// `FactCheck` goes through [`ProviderClient::fact_check`], with
/// `opts.context` as the context; everything else through `generate`.
pub async fn dispatch(
    client: &dyn ProviderClient,
    category: RequestCategory,
    prompt: &str,
    opts: &RequestOptions,
) -> Result<ProviderResponse> {
    if !client.supports(category) {
        return Err(Error::UnsupportedCategory {
            provider: client.provider_id().to_string(),
            category,
        });
    }

    match category {
        RequestCategory::FactCheck => client.fact_check(prompt, opts.context.as_deref()).await,
        _ => client.generate(prompt, opts).await,
    }
}

//! Category-driven request router.
//!
//! The router maps each [`RequestCategory`] to an ordered list of candidate
//! providers and handles automatic fallback when a candidate fails with an
//! upstream error (transport failure, timeout, non-2xx, malformed payload).

use crate::registry::ProviderRegistry;
use crate::synthesis::Synthesizer;
use crate::traits::{dispatch, ProviderClient, RequestOptions};
use pa_domain::category::RequestCategory;
use pa_domain::config::{LlmConfig, ProviderKind};
use pa_domain::error::{Error, Result};
use pa_domain::response::ProviderResponse;
use pa_domain::trace::TraceEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Category → ordered candidates. The first entry is the primary, the rest
/// are fallbacks. Built once, never mutated after the router owns it.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<RequestCategory, Vec<Arc<dyn ProviderClient>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the candidates for one category.
    pub fn with_route(
        mut self,
        category: RequestCategory,
        candidates: Vec<Arc<dyn ProviderClient>>,
    ) -> Self {
        self.routes.insert(category, candidates);
        self
    }

    /// Candidates for `category`, primary first. Empty when unrouted.
    pub fn candidates(&self, category: RequestCategory) -> &[Arc<dyn ProviderClient>] {
        self.routes.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The default table for one reasoning and one search provider.
    ///
    /// Analysis is the only category that may use both.
    pub fn default_for(
        reasoning: Arc<dyn ProviderClient>,
        search: Arc<dyn ProviderClient>,
    ) -> Self {
        Self::new()
            .with_route(RequestCategory::Reasoning, vec![reasoning.clone()])
            .with_route(RequestCategory::Search, vec![search.clone()])
            .with_route(RequestCategory::Generation, vec![reasoning.clone()])
            .with_route(RequestCategory::Analysis, vec![reasoning, search.clone()])
            .with_route(RequestCategory::FactCheck, vec![search])
    }

    /// Build the table from config: the default table over the first
    /// initialized provider of each kind, then `llm.routing` overrides.
    ///
    /// A missing reasoning or search provider leaves its categories
    /// unrouted. Override ids absent from the registry, or whose provider
    /// cannot serve the category, are skipped.
    pub fn from_config(config: &LlmConfig, registry: &ProviderRegistry) -> Self {
        let reasoning = first_registered(config, registry, ProviderKind::Google);
        let search = first_registered(config, registry, ProviderKind::Perplexity);

        let mut table = match (reasoning, search) {
            (Some(r), Some(s)) => Self::default_for(r, s),
            (Some(r), None) => {
                tracing::warn!("no search provider available; search categories unrouted");
                Self::new()
                    .with_route(RequestCategory::Reasoning, vec![r.clone()])
                    .with_route(RequestCategory::Generation, vec![r.clone()])
                    .with_route(RequestCategory::Analysis, vec![r])
            }
            (None, Some(s)) => {
                tracing::warn!("no reasoning provider available; reasoning categories unrouted");
                Self::new()
                    .with_route(RequestCategory::Search, vec![s.clone()])
                    .with_route(RequestCategory::Analysis, vec![s.clone()])
                    .with_route(RequestCategory::FactCheck, vec![s])
            }
            (None, None) => Self::new(),
        };

        for (category, ids) in &config.routing {
            let candidates: Vec<Arc<dyn ProviderClient>> = ids
                .iter()
                .filter_map(|id| {
                    let Some(client) = registry.get(id) else {
                        tracing::warn!(
                            category = %category,
                            provider = %id,
                            "routing override names an unavailable provider, skipping"
                        );
                        return None;
                    };
                    if !client.supports(*category) {
                        tracing::warn!(
                            category = %category,
                            provider = %id,
                            "routing override names a provider that cannot serve the category, skipping"
                        );
                        return None;
                    }
                    Some(client)
                })
                .collect();
            table.routes.insert(*category, candidates);
        }

        table
    }
}

fn first_registered(
    config: &LlmConfig,
    registry: &ProviderRegistry,
    kind: ProviderKind,
) -> Option<Arc<dyn ProviderClient>> {
    config
        .providers
        .iter()
        .filter(|p| p.kind == kind)
        .find_map(|p| registry.get(&p.id))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Routes requests by category with ordered fallback.
///
/// Holds only immutable state and shared client handles, so a single router
/// can serve concurrent callers.
pub struct LlmRouter {
    registry: ProviderRegistry,
    table: RoutingTable,
    synthesizer: Option<Synthesizer>,
}

impl LlmRouter {
    /// Construct the router from the full LLM config.
    pub fn from_config(llm_config: &LlmConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(llm_config)?;
        let table = RoutingTable::from_config(llm_config, &registry);
        let synthesizer = Synthesizer::from_config(llm_config, &registry);
        if synthesizer.is_none() {
            tracing::warn!("no synthesis provider available; synthesize() will fail");
        }

        Ok(Self {
            registry,
            table,
            synthesizer,
        })
    }

    /// Build from an already-constructed registry and table (useful for
    /// testing).
    pub fn new(registry: ProviderRegistry, table: RoutingTable) -> Self {
        Self {
            registry,
            table,
            synthesizer: None,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Get a reference to the underlying registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub(crate) fn synthesizer(&self) -> Option<&Synthesizer> {
        self.synthesizer.as_ref()
    }

    // ── Public routing API ─────────────────────────────────────────

    /// Send `prompt` to the providers routed for `category`. The router:
    ///
    /// 1. Fails with [`Error::Config`] when the category has no candidates.
    /// 2. Tries the primary; success returns immediately.
    /// 3. On an upstream failure, tries the next candidate, strictly in order.
    /// 4. When every candidate fails, returns
    ///    [`Error::AllCandidatesFailed`] wrapping the primary's error.
    /// 5. Any other error is returned as-is without trying further
    ///    candidates.
    ///
    /// Emits `TraceEvent::LlmRequest` per attempt and
    /// `TraceEvent::LlmFallback` per hand-off.
    pub async fn route(
        &self,
        category: RequestCategory,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<ProviderResponse> {
        let span = tracing::info_span!(
            "route",
            request_id = %uuid::Uuid::new_v4(),
            category = %category,
        );
        self.route_inner(category, prompt, opts)
            .instrument(span)
            .await
    }

    async fn route_inner(
        &self,
        category: RequestCategory,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<ProviderResponse> {
        let (primary, fallbacks) = self.table.candidates(category).split_first().ok_or_else(|| {
            Error::Config(format!("no providers routed for category '{category}'"))
        })?;

        let first_error = match self.attempt(primary, category, prompt, opts).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    category = %category,
                    provider = %primary.provider_id(),
                    error = %e,
                    "primary provider failed, trying fallbacks"
                );
                e
            }
            Err(e) => return Err(e),
        };

        let mut previous = primary;
        let mut reason = first_error.to_string();

        for (idx, fallback) in fallbacks.iter().enumerate() {
            TraceEvent::LlmFallback {
                category: category.to_string(),
                from_provider: previous.provider_id().to_string(),
                to_provider: fallback.provider_id().to_string(),
                reason: reason.clone(),
            }
            .emit();

            match self.attempt(fallback, category, prompt, opts).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        category = %category,
                        provider = %fallback.provider_id(),
                        error = %e,
                        fallback_index = %idx,
                        "fallback provider failed, trying next"
                    );
                    previous = fallback;
                    reason = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            category = %category,
            error = %first_error,
            "all candidates failed"
        );

        Err(Error::AllCandidatesFailed {
            category,
            source: Box::new(first_error),
        })
    }

    /// Close every registered provider client. Returns `true` only on the
    /// call that released at least one of them.
    pub fn close(&self) -> bool {
        let released = self.registry.close_all();
        if released > 0 {
            tracing::info!(providers = released, "router closed");
        }
        released > 0
    }

    // ── Internal helpers ───────────────────────────────────────────

    async fn attempt(
        &self,
        provider: &Arc<dyn ProviderClient>,
        category: RequestCategory,
        prompt: &str,
        opts: &RequestOptions,
    ) -> Result<ProviderResponse> {
        let start = Instant::now();
        let result = dispatch(provider.as_ref(), category, prompt, opts).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let usage = result.as_ref().ok().map(|r| r.usage);
        TraceEvent::LlmRequest {
            provider: provider.provider_id().to_string(),
            category: category.to_string(),
            duration_ms,
            success: result.is_ok(),
            prompt_tokens: usage.map(|u| u.prompt_tokens),
            completion_tokens: usage.map(|u| u.completion_tokens),
        }
        .emit();

        result
    }
}

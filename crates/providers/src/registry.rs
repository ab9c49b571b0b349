//! Provider registry.
//!
//! Constructs and holds all configured provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves authentication (keychain, env
//! vars, direct keys), and instantiates the adapter matching each provider's
//! `kind`.

use crate::google::GoogleProvider;
use crate::perplexity::PerplexityProvider;
use crate::traits::ProviderClient;
use pa_domain::config::{LlmConfig, ProviderKind};
use pa_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated provider clients, keyed by config id.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize (usually a missing API key) are
    /// logged and skipped. Fails only when no provider could be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn ProviderClient>> = match pc.kind {
                ProviderKind::Google => {
                    GoogleProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn ProviderClient>)
                }
                ProviderKind::Perplexity => PerplexityProvider::from_config(pc)
                    .map(|p| Arc::new(p) as Arc<dyn ProviderClient>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        model = %pc.effective_model(),
                        "registered provider"
                    );
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize provider, skipping"
                    );
                }
            }
        }

        if providers.is_empty() {
            return Err(Error::Config(
                "no providers initialized; check API keys and [[llm.providers]]".into(),
            ));
        }

        Ok(Self { providers })
    }

    /// Build a registry from already-constructed clients.
    pub fn from_providers(clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        let providers = clients
            .into_iter()
            .map(|c| (c.provider_id().to_string(), c))
            .collect();
        Self { providers }
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderClient>> {
        self.providers.get(provider_id).cloned()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn ProviderClient>)> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close every provider. Returns how many actually released resources
    /// on this call.
    pub fn close_all(&self) -> usize {
        self.providers.values().filter(|p| p.close()).count()
    }
}

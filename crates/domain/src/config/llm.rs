use crate::category::RequestCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registered LLM providers. The first `google` entry is the reasoning
    /// provider, the first `perplexity` entry the search provider.
    #[serde(default = "d_providers")]
    pub providers: Vec<ProviderConfig>,
    /// Per-category overrides of the default routing table
    /// (key = category, value = provider ids, primary first).
    #[serde(default)]
    pub routing: HashMap<RequestCategory, Vec<String>>,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: d_providers(),
            routing: HashMap::new(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl LlmConfig {
    /// First configured provider of the given kind.
    pub fn first_of_kind(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// How multiple responses are merged into one answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Provider id used for synthesis. Defaults to the reasoning provider.
    #[serde(default)]
    pub provider: Option<String>,
    /// Replaces the built-in synthesis instruction when set.
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    /// Falls back to the kind's public endpoint when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Per-call network timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// A provider entry that takes every setting from the kind defaults and
    /// reads its key from `env`.
    pub fn with_env_key(id: &str, kind: ProviderKind, env: &str) -> Self {
        Self {
            id: id.into(),
            kind,
            base_url: None,
            auth: AuthConfig {
                env: Some(env.into()),
                ..Default::default()
            },
            model: None,
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
        }
    }

    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().into())
    }

    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(self.kind.default_temperature())
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(self.kind.default_max_tokens())
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(self.kind.default_timeout_ms())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini, the reasoning-capable provider.
    Google,
    /// Perplexity Sonar, the search-capable provider.
    Perplexity,
}

impl ProviderKind {
    /// Categories an adapter of this kind can serve.
    pub fn supported_categories(&self) -> &'static [RequestCategory] {
        match self {
            ProviderKind::Google => &[
                RequestCategory::Reasoning,
                RequestCategory::Generation,
                RequestCategory::Analysis,
            ],
            ProviderKind::Perplexity => &[
                RequestCategory::Search,
                RequestCategory::Analysis,
                RequestCategory::FactCheck,
            ],
        }
    }

    pub fn supports(&self, category: RequestCategory) -> bool {
        self.supported_categories().contains(&category)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Google => "https://generativelanguage.googleapis.com",
            ProviderKind::Perplexity => "https://api.perplexity.ai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Google => "gemini-2.5-flash",
            ProviderKind::Perplexity => "sonar-pro",
        }
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            ProviderKind::Google => 0.7,
            ProviderKind::Perplexity => 0.3,
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            ProviderKind::Google => 8192,
            ProviderKind::Perplexity => 4096,
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            ProviderKind::Google => 120_000,
            ProviderKind::Perplexity => 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "assistant").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "gemini-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::with_env_key("gemini", ProviderKind::Google, "GEMINI_API_KEY"),
        ProviderConfig::with_env_key("perplexity", ProviderKind::Perplexity, "PERPLEXITY_API_KEY"),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_provider_per_kind() {
        let config = LlmConfig::default();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.first_of_kind(ProviderKind::Google).unwrap().id, "gemini");
        assert_eq!(
            config.first_of_kind(ProviderKind::Perplexity).unwrap().id,
            "perplexity"
        );
    }

    #[test]
    fn kind_defaults_fill_unset_fields() {
        let cfg = ProviderConfig::with_env_key("pplx", ProviderKind::Perplexity, "K");
        assert_eq!(cfg.effective_base_url(), "https://api.perplexity.ai");
        assert_eq!(cfg.effective_model(), "sonar-pro");
        assert_eq!(cfg.effective_max_tokens(), 4096);
        assert_eq!(cfg.effective_timeout_ms(), 60_000);
        assert!((cfg.effective_temperature() - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn explicit_base_url_is_trimmed() {
        let mut cfg = ProviderConfig::with_env_key("g", ProviderKind::Google, "K");
        cfg.base_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(cfg.effective_base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn routing_keys_deserialize_from_category_names() {
        let json = r#"{
            "routing": { "analysis": ["perplexity", "gemini"], "fact_check": ["perplexity"] }
        }"#;
        let config: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.routing[&RequestCategory::Analysis],
            vec!["perplexity".to_string(), "gemini".to_string()]
        );
        // Providers fall back to the defaults when omitted.
        assert_eq!(config.providers.len(), 2);
    }
}

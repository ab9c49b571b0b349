mod llm;
mod observability;

pub use llm::*;
pub use observability::*;

use crate::category::RequestCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Immutable application settings, loaded once at startup.
///
/// There is no reload path: to pick up new settings, build a fresh router
/// from a new `Config`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let llm = &self.llm;

        if llm.providers.is_empty() {
            errors.push(ConfigError::error(
                "llm.providers",
                "no LLM providers configured",
            ));
        }

        let mut seen = HashSet::new();
        for (i, p) in llm.providers.iter().enumerate() {
            if p.id.trim().is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            } else if !seen.insert(p.id.as_str()) {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    format!("duplicate provider id '{}'", p.id),
                ));
            }
            if p.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
            if p.max_tokens == Some(0) {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].max_tokens"),
                    "max_tokens must be greater than 0",
                ));
            }
            if p.timeout_ms == Some(0) {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].timeout_ms"),
                    "timeout_ms must be greater than 0",
                ));
            }
            if let Some(t) = p.temperature {
                if !(0.0..=2.0).contains(&t) {
                    errors.push(ConfigError::warning(
                        format!("llm.providers[{i}].temperature"),
                        format!("temperature {t} is outside 0.0..=2.0"),
                    ));
                }
            }
        }

        for kind in [ProviderKind::Google, ProviderKind::Perplexity] {
            if llm.first_of_kind(kind).is_none() {
                errors.push(ConfigError::error(
                    "llm.providers",
                    format!("no provider of kind '{}' configured", kind_name(kind)),
                ));
            }
        }

        // Sort so the report is stable regardless of HashMap order.
        let mut routing: Vec<(&RequestCategory, &Vec<String>)> = llm.routing.iter().collect();
        routing.sort_by_key(|(cat, _)| **cat);
        for (category, ids) in routing {
            let field = format!("llm.routing.{category}");
            if ids.is_empty() {
                errors.push(ConfigError::error(
                    field.clone(),
                    "routing entry must name at least one provider",
                ));
            }
            for id in ids {
                match llm.provider(id) {
                    None => errors.push(ConfigError::error(
                        field.clone(),
                        format!("unknown provider '{id}'"),
                    )),
                    Some(p) if !p.kind.supports(*category) => {
                        errors.push(ConfigError::error(
                            field.clone(),
                            format!(
                                "provider '{id}' ({}) cannot serve '{category}'",
                                kind_name(p.kind)
                            ),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(ref id) = llm.synthesis.provider {
            if llm.provider(id).is_none() {
                errors.push(ConfigError::error(
                    "llm.synthesis.provider",
                    format!("unknown provider '{id}'"),
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::warning(
                "observability.sample_rate",
                "sample_rate should be between 0.0 and 1.0",
            ));
        }

        errors
    }
}

fn kind_name(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Google => "google",
        ProviderKind::Perplexity => "perplexity",
    }
}

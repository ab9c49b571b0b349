use crate::category::RequestCategory;

/// Shared error type used across all assistant crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failure, timeout, non-success status, or malformed payload
    /// from a provider call. `message` carries the raw upstream text.
    #[error("upstream {provider}: {message}")]
    Upstream { provider: String, message: String },

    /// The provider cannot serve this category at all.
    #[error("provider {provider} does not support category '{category}'")]
    UnsupportedCategory {
        provider: String,
        category: RequestCategory,
    },

    /// Every candidate for a category failed. `source` is the error raised
    /// by the first (primary) candidate.
    #[error("all providers for '{category}' failed: {source}")]
    AllCandidatesFailed {
        category: RequestCategory,
        #[source]
        source: Box<Error>,
    },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),
}

impl Error {
    /// Shorthand for an [`Error::Upstream`].
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the router may move on to the next candidate after this error.
    ///
    /// Only upstream failures qualify. Everything else signals a
    /// configuration or programming defect.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn only_upstream_is_retryable() {
        assert!(Error::upstream("gemini", "HTTP 503").is_retryable());
        assert!(!Error::Config("x".into()).is_retryable());
        assert!(!Error::Auth("x".into()).is_retryable());
        assert!(!Error::UnsupportedCategory {
            provider: "perplexity".into(),
            category: RequestCategory::Reasoning,
        }
        .is_retryable());
    }

    #[test]
    fn all_candidates_failed_exposes_first_error_as_source() {
        let err = Error::AllCandidatesFailed {
            category: RequestCategory::Analysis,
            source: Box::new(Error::upstream("gemini", "HTTP 500 - boom")),
        };
        let msg = err.to_string();
        assert!(msg.contains("analysis"));
        assert!(msg.contains("HTTP 500 - boom"));
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert_eq!(source, "upstream gemini: HTTP 500 - boom");
    }
}

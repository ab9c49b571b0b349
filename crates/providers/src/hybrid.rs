//! Hybrid executor: one routed request per requested category, issued
//! concurrently, with per-branch failure isolation.

use crate::router::LlmRouter;
use crate::traits::RequestOptions;
use pa_domain::category::RequestCategory;
use pa_domain::response::ProviderResponse;
use pa_domain::trace::TraceEvent;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::time::Instant;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Labels and flags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result key of a hybrid branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HybridLabel {
    Search,
    Reasoning,
}

impl HybridLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HybridLabel::Search => "search",
            HybridLabel::Reasoning => "reasoning",
        }
    }

    /// The category routed for this branch.
    pub fn category(&self) -> RequestCategory {
        match self {
            HybridLabel::Search => RequestCategory::Search,
            HybridLabel::Reasoning => RequestCategory::Reasoning,
        }
    }
}

impl fmt::Display for HybridLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which branches a hybrid request runs. Both are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridFlags {
    pub use_search: bool,
    pub use_reasoning: bool,
}

impl Default for HybridFlags {
    fn default() -> Self {
        Self {
            use_search: true,
            use_reasoning: true,
        }
    }
}

impl HybridFlags {
    /// Requested labels, search first.
    pub fn labels(&self) -> Vec<HybridLabel> {
        let mut labels = Vec::with_capacity(2);
        if self.use_search {
            labels.push(HybridLabel::Search);
        }
        if self.use_reasoning {
            labels.push(HybridLabel::Reasoning);
        }
        labels
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ordered result mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Label → response, in requested order. Failed branches are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridResponses(Vec<(HybridLabel, ProviderResponse)>);

impl HybridResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the response for `label`, keeping first-insert
    /// position.
    pub fn insert(&mut self, label: HybridLabel, response: ProviderResponse) {
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = response,
            None => self.0.push((label, response)),
        }
    }

    pub fn get(&self, label: HybridLabel) -> Option<&ProviderResponse> {
        self.0.iter().find(|(l, _)| *l == label).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HybridLabel, &ProviderResponse)> {
        self.0.iter().map(|(l, r)| (*l, r))
    }

    pub fn labels(&self) -> Vec<HybridLabel> {
        self.0.iter().map(|(l, _)| *l).collect()
    }
}

impl FromIterator<(HybridLabel, ProviderResponse)> for HybridResponses {
    fn from_iter<I: IntoIterator<Item = (HybridLabel, ProviderResponse)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (label, response) in iter {
            out.insert(label, response);
        }
        out
    }
}

impl Serialize for HybridResponses {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, response) in &self.0 {
            map.serialize_entry(label.as_str(), response)?;
        }
        map.end()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl LlmRouter {
    /// Route `prompt` for every requested branch at once.
    ///
    /// Branches run concurrently on the caller's task. A failed branch is
    /// logged and left out of the result; it never cancels or fails its
    /// sibling. An unrouted category counts as a failed branch, so one
    /// missing provider never blocks the other.
    pub async fn hybrid_request(
        &self,
        prompt: &str,
        flags: HybridFlags,
        opts: &RequestOptions,
    ) -> HybridResponses {
        let labels = flags.labels();
        let start = Instant::now();
        let branches = labels
            .iter()
            .map(|label| self.route(label.category(), prompt, opts));
        let outcomes = futures_util::future::join_all(branches).await;

        let mut results = HybridResponses::new();
        for (label, outcome) in labels.iter().zip(outcomes) {
            match outcome {
                Ok(resp) => results.insert(*label, resp),
                Err(e) => {
                    tracing::error!(label = %label, error = %e, "hybrid branch failed");
                }
            }
        }

        TraceEvent::HybridCompleted {
            requested: labels.iter().map(|l| l.as_str().to_string()).collect(),
            succeeded: results.labels().iter().map(|l| l.as_str().to_string()).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        tracing::info!(
            requested = labels.len(),
            results_count = results.len(),
            "hybrid request completed"
        );

        results
    }
}

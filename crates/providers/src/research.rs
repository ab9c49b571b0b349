//! Topic research: a routed search request shaped by a research-assistant
//! directive.

use crate::router::LlmRouter;
use crate::traits::RequestOptions;
use pa_domain::category::RequestCategory;
use pa_domain::error::Result;
use pa_domain::response::ProviderResponse;

const RESEARCH_SYSTEM: &str = "You are a research assistant. Provide comprehensive, well-structured research with:
1. Executive summary
2. Key findings
3. Current trends
4. Supporting evidence with citations
5. Implications and insights
6. Recommendations for further research";

const RESEARCH_MAX_TOKENS: u32 = 4096;

/// Build the user prompt for a research request.
pub fn research_prompt(topic: &str, focus_areas: &[String], time_range: Option<&str>) -> String {
    let mut parts = vec![format!("Research and analyze: {topic}")];
    if !focus_areas.is_empty() {
        parts.push(format!("Focus on: {}", focus_areas.join(", ")));
    }
    if let Some(range) = time_range {
        parts.push(format!("Time range: {range}"));
    }
    parts.push("Provide comprehensive analysis with key findings, trends, and insights.".into());
    parts.join(" ")
}

impl LlmRouter {
    /// Research `topic` through the search route, with citations requested.
    ///
    /// Falls back like any other `Search` request. The response records the
    /// topic and a UTC `researched_at` timestamp in its metadata.
    pub async fn research(
        &self,
        topic: &str,
        focus_areas: &[String],
        time_range: Option<&str>,
    ) -> Result<ProviderResponse> {
        let opts = RequestOptions {
            return_citations: Some(true),
            max_tokens: Some(RESEARCH_MAX_TOKENS),
            ..Default::default()
        }
        .with_system_instruction(RESEARCH_SYSTEM);

        let prompt = research_prompt(topic, focus_areas, time_range);
        let resp = self.route(RequestCategory::Search, &prompt, &opts).await?;

        tracing::info!(
            topic = %topic,
            citations_count = resp.citations.as_ref().map_or(0, Vec::len),
            "topic research completed"
        );

        Ok(resp
            .with_metadata("topic", topic)
            .with_metadata("researched_at", chrono::Utc::now().to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_with_topic_only() {
        assert_eq!(
            research_prompt("solid-state batteries", &[], None),
            "Research and analyze: solid-state batteries Provide comprehensive analysis \
             with key findings, trends, and insights."
        );
    }

    #[test]
    fn prompt_with_focus_and_range() {
        let focus = vec!["cost".to_string(), "energy density".to_string()];
        assert_eq!(
            research_prompt("solid-state batteries", &focus, Some("2023-2025")),
            "Research and analyze: solid-state batteries Focus on: cost, energy density \
             Time range: 2023-2025 Provide comprehensive analysis with key findings, \
             trends, and insights."
        );
    }
}

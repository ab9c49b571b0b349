pub mod ask;
pub mod check;
pub mod config;
pub mod hybrid;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pa_domain::category::RequestCategory;
use pa_domain::config::Config;
use pa_providers::LlmRouter;
use std::path::Path;

/// Personal assistant: routes prompts to a reasoning model (Gemini) and a
/// search model (Perplexity), with fallback and hybrid synthesis.
#[derive(Debug, Parser)]
#[command(name = "assistant", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Route a single prompt by category and print the response.
    Ask {
        /// The prompt to send.
        prompt: String,
        /// Request category (reasoning, search, generation, analysis, fact_check).
        #[arg(long, default_value = "reasoning")]
        category: RequestCategory,
        /// System instruction sent alongside the prompt.
        #[arg(long)]
        system: Option<String>,
        /// Output the full response as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Ask the search and reasoning providers at once, optionally merging
    /// the answers.
    Hybrid {
        /// The prompt to send.
        prompt: String,
        /// Skip the search branch.
        #[arg(long)]
        no_search: bool,
        /// Skip the reasoning branch.
        #[arg(long)]
        no_reasoning: bool,
        /// Merge the collected answers into one response.
        #[arg(long)]
        synthesize: bool,
        /// Replace the default synthesis instruction.
        #[arg(long, requires = "synthesize")]
        instruction: Option<String>,
        /// Output as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Verify a statement against live sources.
    FactCheck {
        /// The statement to check.
        statement: String,
        /// Extra context for the fact-checker.
        #[arg(long)]
        context: Option<String>,
        /// Output the full response as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Research a topic with live sources.
    Research {
        /// The topic to research.
        topic: String,
        /// Areas to focus on (repeatable).
        #[arg(long = "focus")]
        focus: Vec<String>,
        /// Time range to cover, e.g. "last 12 months".
        #[arg(long)]
        time_range: Option<String>,
        /// Output the full response as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Smoke-test every provider and the router against the live APIs.
    Check,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `PA_CONFIG` (or `config.toml`
/// by default). Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("PA_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path` as TOML. A missing file yields [`Config::default`].
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Build the router, refusing configs with validation errors.
pub fn build_router(config: &Config) -> anyhow::Result<LlmRouter> {
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|e| e.severity == pa_domain::config::ConfigSeverity::Error)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    LlmRouter::from_config(&config.llm).context("initializing providers")
}

/// Render a citation for plain-text output: strings as-is, objects by
/// their `url` field, anything else as JSON.
pub(crate) fn citation_text(citation: &serde_json::Value) -> String {
    match citation {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("url")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Print a response's content followed by its numbered sources.
pub(crate) fn print_response(resp: &pa_domain::response::ProviderResponse) {
    println!("{}", resp.content);
    if let Some(ref citations) = resp.citations {
        if !citations.is_empty() {
            println!("\nSources:");
            for (i, c) in citations.iter().enumerate() {
                println!("  [{}] {}", i + 1, citation_text(c));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_category() {
        let cli = Cli::try_parse_from(["assistant", "ask", "hello", "--category", "fact-check"]).unwrap();
        match cli.command {
            Command::Ask { prompt, category, json, .. } => {
                assert_eq!(prompt, "hello");
                assert_eq!(category, RequestCategory::FactCheck);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_research_with_repeated_focus() {
        let cli = Cli::try_parse_from([
            "assistant",
            "research",
            "fusion power",
            "--focus",
            "cost",
            "--focus",
            "safety",
            "--time-range",
            "2020-2025",
        ])
        .unwrap();
        match cli.command {
            Command::Research {
                topic,
                focus,
                time_range,
                json,
            } => {
                assert_eq!(topic, "fusion power");
                assert_eq!(focus, vec!["cost", "safety"]);
                assert_eq!(time_range.as_deref(), Some("2020-2025"));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(Cli::try_parse_from(["assistant", "ask", "x", "--category", "poetry"]).is_err());
    }

    #[test]
    fn instruction_requires_synthesize() {
        assert!(Cli::try_parse_from(["assistant", "hybrid", "q", "--instruction", "Merge"]).is_err());
        let cli =
            Cli::try_parse_from(["assistant", "hybrid", "q", "--synthesize", "--instruction", "Merge"])
                .unwrap();
        assert!(matches!(cli.command, Command::Hybrid { synthesize: true, .. }));
    }

    #[test]
    fn citation_text_prefers_urls() {
        assert_eq!(citation_text(&serde_json::json!("https://a")), "https://a");
        assert_eq!(
            citation_text(&serde_json::json!({"url": "https://b", "title": "B"})),
            "https://b"
        );
        assert_eq!(citation_text(&serde_json::json!(7)), "7");
    }
}

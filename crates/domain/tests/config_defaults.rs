use pa_domain::category::RequestCategory;
use pa_domain::config::{Config, ConfigSeverity, ProviderKind};

fn errors(config: &Config) -> Vec<String> {
    config
        .validate()
        .into_iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .map(|e| e.to_string())
        .collect()
}

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_empty(), "{:?}", config.validate());
}

#[test]
fn default_providers_read_keys_from_env() {
    let config = Config::default();
    let gemini = config.llm.provider("gemini").unwrap();
    assert_eq!(gemini.kind, ProviderKind::Google);
    assert_eq!(gemini.auth.env.as_deref(), Some("GEMINI_API_KEY"));
    let pplx = config.llm.provider("perplexity").unwrap();
    assert_eq!(pplx.auth.env.as_deref(), Some("PERPLEXITY_API_KEY"));
}

#[test]
fn full_toml_parses() {
    let toml_str = r#"
[[llm.providers]]
id = "gemini"
kind = "google"
model = "gemini-2.5-pro"
temperature = 0.2
timeout_ms = 30000
auth = { env = "MY_GEMINI_KEY" }

[[llm.providers]]
id = "pplx"
kind = "perplexity"
base_url = "http://127.0.0.1:8080/"
auth = { service = "assistant", account = "pplx-key" }

[llm.routing]
analysis = ["pplx", "gemini"]

[llm.synthesis]
instruction = "Merge these:"

[observability]
json_logs = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.providers.len(), 2);
    let gemini = config.llm.provider("gemini").unwrap();
    assert_eq!(gemini.effective_model(), "gemini-2.5-pro");
    assert_eq!(gemini.effective_timeout_ms(), 30_000);
    let pplx = config.llm.provider("pplx").unwrap();
    assert_eq!(pplx.effective_base_url(), "http://127.0.0.1:8080");
    assert_eq!(pplx.auth.account.as_deref(), Some("pplx-key"));
    assert_eq!(
        config.llm.routing[&RequestCategory::Analysis],
        vec!["pplx".to_string(), "gemini".to_string()]
    );
    assert_eq!(config.llm.synthesis.instruction.as_deref(), Some("Merge these:"));
    assert!(config.observability.json_logs);
    assert!(errors(&config).is_empty());
}

#[test]
fn routing_to_unknown_provider_is_an_error() {
    let toml_str = r#"
[llm.routing]
search = ["bing"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let errs = errors(&config);
    assert_eq!(errs.len(), 1);
    assert!(errs[0].contains("llm.routing.search"));
    assert!(errs[0].contains("unknown provider 'bing'"));
}

#[test]
fn routing_to_ineligible_provider_is_an_error() {
    let toml_str = r#"
[llm.routing]
search = ["gemini", "perplexity"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let errs = errors(&config);
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(errs[0].contains("llm.routing.search"));
    assert!(errs[0].contains("provider 'gemini' (google) cannot serve 'search'"));
}

#[test]
fn kinds_serve_disjoint_categories_except_analysis() {
    for category in RequestCategory::ALL {
        let both = ProviderKind::Google.supports(category)
            && ProviderKind::Perplexity.supports(category);
        assert_eq!(both, category == RequestCategory::Analysis, "{category}");
    }
}

#[test]
fn empty_routing_entry_is_an_error() {
    let toml_str = r#"
[llm.routing]
fact_check = []
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let errs = errors(&config);
    assert!(errs.iter().any(|e| e.contains("at least one provider")));
}

#[test]
fn missing_search_provider_is_an_error() {
    let toml_str = r#"
[[llm.providers]]
id = "gemini"
kind = "google"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let errs = errors(&config);
    assert!(errs.iter().any(|e| e.contains("kind 'perplexity'")));
}

#[test]
fn duplicate_ids_are_rejected() {
    let toml_str = r#"
[[llm.providers]]
id = "a"
kind = "google"

[[llm.providers]]
id = "a"
kind = "perplexity"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let errs = errors(&config);
    assert!(errs.iter().any(|e| e.contains("duplicate provider id 'a'")));
}

#[test]
fn out_of_range_temperature_is_only_a_warning() {
    let toml_str = r#"
[[llm.providers]]
id = "gemini"
kind = "google"
temperature = 3.5

[[llm.providers]]
id = "perplexity"
kind = "perplexity"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Warning);
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = Config::default();
    config
        .llm
        .routing
        .insert(RequestCategory::FactCheck, vec!["perplexity".into()]);
    let rendered = toml::to_string_pretty(&config).unwrap();
    let back: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(back.llm.providers.len(), 2);
    assert_eq!(back.llm.routing[&RequestCategory::FactCheck], vec!["perplexity".to_string()]);
}

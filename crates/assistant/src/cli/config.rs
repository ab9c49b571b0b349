use pa_domain::config::{Config, ConfigSeverity};

/// Validate the config, printing any issues.
///
/// Returns `false` when at least one error was found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Render the resolved config (with all defaults filled in) as TOML.
///
/// Plaintext API keys are masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    for provider in &mut masked.llm.providers {
        if provider.auth.key.is_some() {
            provider.auth.key = Some("********".into());
        }
    }
    Ok(toml::to_string_pretty(&masked)?)
}

/// Print [`render`]'s output.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

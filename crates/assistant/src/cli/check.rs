//! `assistant check`: live smoke test of each provider and the router.

use pa_domain::category::RequestCategory;
use pa_domain::config::{Config, ConfigSeverity};
use pa_providers::{dispatch, HybridFlags, LlmRouter, RequestOptions};

const PROVIDER_PROMPT: &str = "Explain what a personal AI assistant is in one sentence.";
const REASONING_PROMPT: &str = "What is 2+2? Answer with just the number.";
const SEARCH_PROMPT: &str = "What is one recent development in AI assistants?";
const HYBRID_PROMPT: &str = "Explain quantum computing and find recent news about it.";

/// Run all checks and print a summary.
///
/// Returns `Ok(true)` when every check passes. The router is closed before
/// returning.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("assistant check");
    println!("===============\n");

    let mut all_passed = true;

    check_config(config, config_path, &mut all_passed);

    let router = match super::build_router(config) {
        Ok(router) => router,
        Err(e) => {
            print_check("Providers initialized", false, format!("{e:#}"));
            println!("\nSome checks failed. Review the output above.");
            return Ok(false);
        }
    };
    print_check(
        "Providers initialized",
        true,
        router.registry().list_providers().join(", "),
    );

    check_providers(&router, &mut all_passed).await;
    check_router(&router, &mut all_passed).await;

    router.close();

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config(config: &Config, config_path: &str, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    let source = if std::path::Path::new(config_path).exists() {
        config_path.to_owned()
    } else {
        format!("{config_path} not found, using defaults")
    };

    print_check(
        "Config validation",
        error_count == 0,
        format!("{} issue(s) ({source})", issues.len()),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

async fn check_providers(router: &LlmRouter, all_passed: &mut bool) {
    let mut providers: Vec<_> = router.registry().iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));

    for (id, provider) in providers {
        let Some(&category) = provider.supported_categories().first() else {
            continue;
        };
        let name = format!("Provider '{id}' ({category})");
        match dispatch(provider.as_ref(), category, PROVIDER_PROMPT, &RequestOptions::default()).await {
            Ok(resp) => {
                let mut detail = format!(
                    "{} token(s): {}",
                    resp.usage.total_tokens,
                    preview(&resp.content, 60)
                );
                if let Some(ref citations) = resp.citations {
                    detail.push_str(&format!(" [{} citation(s)]", citations.len()));
                }
                print_check(&name, true, detail);
            }
            Err(e) => {
                print_check(&name, false, e.to_string());
                *all_passed = false;
            }
        }
    }
}

async fn check_router(router: &LlmRouter, all_passed: &mut bool) {
    let opts = RequestOptions::default();

    for (category, prompt) in [
        (RequestCategory::Reasoning, REASONING_PROMPT),
        (RequestCategory::Search, SEARCH_PROMPT),
    ] {
        let name = format!("Route {category}");
        match router.route(category, prompt, &opts).await {
            Ok(resp) => print_check(
                &name,
                true,
                format!("via {}: {}", resp.source, preview(&resp.content, 50)),
            ),
            Err(e) => {
                print_check(&name, false, e.to_string());
                *all_passed = false;
            }
        }
    }

    let results = router
        .hybrid_request(HYBRID_PROMPT, HybridFlags::default(), &opts)
        .await;
    let ok = results.len() == 2;
    print_check("Hybrid request", ok, format!("{} response(s)", results.len()));
    if !ok {
        *all_passed = false;
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}

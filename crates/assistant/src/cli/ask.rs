//! `assistant ask`, `fact-check` and `research`: one routed request each.

use pa_domain::category::RequestCategory;
use pa_providers::{LlmRouter, RequestOptions};

use super::print_response;

/// Route `prompt` for `category` and print the answer.
pub async fn ask(
    router: &LlmRouter,
    prompt: &str,
    category: RequestCategory,
    system: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let opts = RequestOptions {
        system_instruction: system,
        ..Default::default()
    };
    let resp = router.route(category, prompt, &opts).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        print_response(&resp);
    }
    Ok(())
}

/// Fact-check `statement` through the router's fact-check route.
pub async fn fact_check(
    router: &LlmRouter,
    statement: &str,
    context: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let opts = RequestOptions {
        context,
        ..Default::default()
    };
    let resp = router
        .route(RequestCategory::FactCheck, statement, &opts)
        .await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        println!("Statement: {statement}\n");
        print_response(&resp);
    }
    Ok(())
}

/// Research `topic` through the router's search route.
pub async fn research(
    router: &LlmRouter,
    topic: &str,
    focus: &[String],
    time_range: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let resp = router.research(topic, focus, time_range).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        println!("Topic: {topic}\n");
        print_response(&resp);
    }
    Ok(())
}

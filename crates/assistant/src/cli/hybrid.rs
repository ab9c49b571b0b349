//! `assistant hybrid`: search and reasoning at once, optionally merged.

use pa_providers::{HybridFlags, LlmRouter, RequestOptions};

use super::print_response;

/// Run a hybrid request and print each answer, or the merged one when
/// `synthesize` is set.
///
/// Fails when no branch produced a response.
pub async fn run(
    router: &LlmRouter,
    prompt: &str,
    flags: HybridFlags,
    synthesize: bool,
    instruction: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let responses = router
        .hybrid_request(prompt, flags, &RequestOptions::default())
        .await;

    if responses.is_empty() {
        anyhow::bail!("no provider returned a response");
    }

    let synthesis = if synthesize {
        Some(router.synthesize(&responses, instruction).await?)
    } else {
        None
    };

    if json_output {
        let out = serde_json::json!({
            "responses": responses,
            "synthesis": synthesis,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match synthesis {
        Some(merged) => print_response(&merged),
        None => {
            for (i, (label, resp)) in responses.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("== {label} ({}) ==", resp.source);
                print_response(resp);
            }
        }
    }
    Ok(())
}

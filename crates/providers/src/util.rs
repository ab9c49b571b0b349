//! Shared utility functions for provider adapters.

use pa_domain::config::AuthConfig;
use pa_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::time::Duration;

/// Convert a [`reqwest::Error`] into an upstream error for `provider`.
///
/// The request URL is stripped first: Gemini carries its key in the query
/// string and this message ends up in logs and trace events. Timeouts keep
/// a `timeout:` prefix; both cases fall back like any other upstream
/// failure.
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> Error {
    let e = e.without_url();
    if e.is_timeout() {
        Error::upstream(provider, format!("timeout: {e}"))
    } else {
        Error::upstream(provider, e.to_string())
    }
}

/// Read a provider response body as JSON.
///
/// Non-2xx statuses become `HTTP {code} - {body}`; a body that is not JSON
/// is reported as malformed. Both are upstream errors.
pub(crate) async fn read_json(provider: &str, resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| from_reqwest(provider, e))?;

    if !status.is_success() {
        return Err(Error::upstream(
            provider,
            format!("HTTP {} - {}", status.as_u16(), text),
        ));
    }

    serde_json::from_str(&text)
        .map_err(|e| Error::upstream(provider, format!("malformed response body: {e}")))
}

/// Read a `u64` counter, treating absent or non-numeric values as 0.
pub(crate) fn counter(v: Option<&Value>, key: &str) -> u64 {
    v.and_then(|v| v.get(key)).and_then(|n| n.as_u64()).unwrap_or(0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Closable HTTP client handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns a provider's pooled `reqwest::Client`.
///
/// Callers clone the client out of the lock for each request, so in-flight
/// requests finish normally after [`HttpHandle::close`]; the pool is freed
/// once the last clone drops.
pub(crate) struct HttpHandle {
    provider: String,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpHandle {
    pub(crate) fn new(provider: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| from_reqwest(provider, e))?;
        Ok(Self {
            provider: provider.to_string(),
            client: RwLock::new(Some(client)),
        })
    }

    /// The live client, or an upstream error once the handle is closed.
    pub(crate) fn client(&self) -> Result<reqwest::Client> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| Error::upstream(&self.provider, "client closed"))
    }

    /// Drop the client. Returns `true` only on the call that released it.
    pub(crate) fn close(&self) -> bool {
        self.client.write().take().is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API key resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `service` + `account` → OS keychain via `keyring`
/// 3. `env` field (reads environment variable)
/// 4. Fallback for keychain mode: env var `{SERVICE}_{ACCOUNT}` uppercased
/// 5. Error
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    // 1. Plaintext key (warn the user)
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key'; \
             prefer 'env' or keychain instead"
        );
        return Ok(key.clone());
    }

    // 2. OS keychain via service + account
    if let (Some(ref service), Some(ref account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => {
                tracing::warn!(
                    service = %service,
                    account = %account,
                    error = %e,
                    "keychain lookup failed, falling through to env"
                );
            }
        }
    }

    // 3. Env var
    if let Some(ref env_var) = auth.env {
        return match std::env::var(env_var) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(Error::Auth(format!(
                "environment variable '{}' not set or empty",
                env_var
            ))),
        };
    }

    // 4. Headless fallback: {SERVICE}_{ACCOUNT} uppercased
    if let (Some(ref service), Some(ref account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(
                env_var = %fallback_var,
                "API key resolved from keychain headless fallback env var"
            );
            return Ok(val);
        }
    }

    // 5. No key found
    Err(Error::Auth(
        "no API key configured: set 'key', 'env', or keychain \
         'service'+'account' in auth"
            .into(),
    ))
}

/// Try to read a secret from the OS keychain.
///
/// Returns an error on headless systems where no keychain daemon is available.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring get_password failed: {e}")))
}

/// Build the headless fallback env var name for a keychain service/account.
///
/// Example: `("assistant", "gemini-api-key")` → `"ASSISTANT_GEMINI_API_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_env_name_basic() {
        assert_eq!(
            keychain_fallback_env_name("assistant", "gemini-api-key"),
            "ASSISTANT_GEMINI_API_KEY"
        );
    }

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = AuthConfig {
            key: Some("sk-test-123".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "PA_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let auth = AuthConfig {
            env: Some("PA_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("PA_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_env_var_empty_is_rejected() {
        let var_name = "PA_TEST_EMPTY_KEY_4321";
        std::env::set_var(var_name, "  ");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert!(matches!(resolve_api_key(&auth), Err(Error::Auth(_))));
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_no_config() {
        let err = resolve_api_key(&AuthConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_keychain_fallback_env() {
        // No keychain daemon in CI, so the lookup falls through to the
        // headless env var.
        let fallback_var = "PATESTSVC_MY_PROVIDER";
        std::env::set_var(fallback_var, "fallback-secret");
        let auth = AuthConfig {
            service: Some("patestsvc".into()),
            account: Some("my-provider".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "fallback-secret");
        std::env::remove_var(fallback_var);
    }

    #[test]
    fn counter_defaults_to_zero() {
        let usage = serde_json::json!({"prompt_tokens": 7, "total_tokens": "n/a"});
        assert_eq!(counter(Some(&usage), "prompt_tokens"), 7);
        assert_eq!(counter(Some(&usage), "completion_tokens"), 0);
        assert_eq!(counter(Some(&usage), "total_tokens"), 0);
        assert_eq!(counter(None, "prompt_tokens"), 0);
    }

    #[test]
    fn http_handle_close_is_idempotent() {
        let handle = HttpHandle::new("gemini", Duration::from_secs(1)).unwrap();
        assert!(handle.client().is_ok());
        assert!(handle.close());
        assert!(!handle.close());
        let err = handle.client().unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("client closed"));
    }
}

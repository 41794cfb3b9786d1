//! Shared helpers for the HTTP adapter.

use lc_domain::config::AuthConfig;
use lc_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `service` + `account` → OS keychain via `keyring`
/// 3. `env` field
/// 4. `{SERVICE}_{ACCOUNT}` uppercased, for headless machines without a keychain
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!("API key loaded from plaintext config field 'key'");
        return Ok(key.clone());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => {
                tracing::debug!(
                    service = %service,
                    account = %account,
                    error = %e,
                    "keychain lookup failed, falling through to env"
                );
            }
        }
    }

    if let Some(ref env_var) = auth.env {
        if let Ok(val) = std::env::var(env_var) {
            return Ok(val);
        }
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(env_var = %fallback_var, "API key resolved from headless fallback env var");
            return Ok(val);
        }
    }

    match &auth.env {
        Some(env_var) => Err(Error::Auth(format!(
            "no API key found: environment variable '{env_var}' not set"
        ))),
        None => Err(Error::Auth(
            "no API key configured: set 'key', 'env', or keychain 'service'+'account' under [llm.auth]"
                .into(),
        )),
    }
}

/// Read a secret from the OS keychain.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring get_password failed: {e}")))
}

/// `("localchat", "openai-key")` → `"LOCALCHAT_OPENAI_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

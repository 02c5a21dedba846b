//! Authentication command handlers.
//!
//! - `freee auth` - manual authorization-code flow, the user pastes the code
//! - `google auth` - browser consent flow with a local callback server
//! - `google auth --verify` - refresh the stored Google token without a browser

use crate::api::{FreeeAuthorization, TokenProvider};
use crate::commands::Out;
use crate::config::FreeeSettings;
use crate::secrets::{SecretStore, FREEE_CLIENT_ID, FREEE_CLIENT_SECRET, FREEE_REFRESH_TOKEN};
use crate::{prompt, utils, Config, Result};
use anyhow::{ensure, Context};
use std::sync::Arc;
use tracing::info;

/// Handles `freee auth`. Missing client credentials are prompted for and optionally saved.
pub(super) async fn freee_auth(config: &Config) -> Result<Out<()>> {
    let store = config.secret_store().await?;
    let (client_id, id_prompted) =
        stored_or_prompt(store.as_ref(), FREEE_CLIENT_ID, "freee Client ID").await?;
    let (client_secret, secret_prompted) =
        stored_or_prompt(store.as_ref(), FREEE_CLIENT_SECRET, "freee Client Secret").await?;
    let prompted = id_prompted || secret_prompted;

    if prompted && prompt::prompt_yes_no("Save the client credentials to the secret store?")? {
        store.put(FREEE_CLIENT_ID, client_id.trim()).await?;
        store.put(FREEE_CLIENT_SECRET, client_secret.trim()).await?;
        info!("Saved {FREEE_CLIENT_ID} and {FREEE_CLIENT_SECRET}");
    }

    let authorization =
        FreeeAuthorization::new(config.freee(), client_id.trim(), client_secret.trim())?;
    println!(
        "Open this URL, log in and approve access:\n\n{}\n",
        authorization.authorize_url()
    );
    let code = prompt::prompt("Authorization code")?;
    save_freee_tokens(config.freee(), store, &client_id, &client_secret, &code).await
}

/// The stored value, or a prompted one. The flag is true when the user was prompted.
async fn stored_or_prompt(
    store: &dyn SecretStore,
    name: &str,
    label: &str,
) -> Result<(String, bool)> {
    match store.get(name).await? {
        Some(value) => Ok((value, false)),
        None => Ok((prompt::prompt(label)?, true)),
    }
}

async fn save_freee_tokens(
    settings: &FreeeSettings,
    store: Arc<dyn SecretStore>,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<Out<()>> {
    ensure!(!code.trim().is_empty(), "No authorization code was entered");
    let tokens = FreeeAuthorization::new(settings, client_id.trim(), client_secret.trim())?
        .exchange_code(code)
        .await?;
    let refresh_token = tokens
        .refresh_token
        .context("freee did not return a refresh token")?;
    store
        .put(FREEE_REFRESH_TOKEN, &refresh_token)
        .await
        .context("Unable to save the freee refresh token")?;
    info!("Access token {}", utils::redact(&tokens.access_token, 6));
    Ok(format!("Authorized. The refresh token was saved as {FREEE_REFRESH_TOKEN}.").into())
}

/// Handles `google auth`: runs the OAuth consent flow. This is the only command that opens a
/// browser.
pub(super) async fn google_auth(config: &Config) -> Result<Out<()>> {
    let _ = TokenProvider::initialize(config.secret_store().await?).await?;
    Ok("Google authorization complete.".into())
}

/// Handles `google auth --verify`. This never opens a browser; a missing or invalid token is an
/// error telling the user to run `google auth`.
pub(super) async fn google_auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider = TokenProvider::load(config.secret_store().await?)
        .await
        .context(
            "Unable to use the stored Google token. \n\n\
            You should run 'ledger-bridge google auth' (without the --verify flag).",
        )?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")?;
    Ok("Your Google OAuth token is valid!".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_freee_tokens() {
        let env = TestEnv::new().await;
        let token = env.server().mock(|when, then| {
            when.method(POST)
                .path("/freee/token")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=the-code");
            then.status(200).json_body(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "token_type": "bearer",
                "expires_in": 21600
            }));
        });

        let out = save_freee_tokens(
            env.config().freee(),
            env.store().await,
            "freee-client",
            "freee-secret",
            " the-code \n",
        )
        .await
        .unwrap();

        token.assert();
        assert!(out.message().contains(FREEE_REFRESH_TOKEN));
        let stored = env.store().await.get(FREEE_REFRESH_TOKEN).await.unwrap();
        assert_eq!(stored.as_deref(), Some("new-refresh"));
    }

    #[tokio::test]
    async fn test_save_freee_tokens_requires_code() {
        let env = TestEnv::new().await;
        let err = save_freee_tokens(env.config().freee(), env.store().await, "a", "b", "  ")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No authorization code"));
    }

    #[tokio::test]
    async fn test_google_auth_verify_refreshes() {
        let env = TestEnv::new().await;
        let refresh = env.server().mock(|when, then| {
            when.method(POST)
                .path("/google/token")
                .body_contains("grant_type=refresh_token");
            then.status(200).json_body(json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 3599
            }));
        });
        let out = google_auth_verify(env.config()).await.unwrap();
        refresh.assert();
        assert!(out.message().contains("valid"));
    }
}

//! The authenticated Google REST client shared by the Drive and Sheets operations.

use crate::api::{ensure_success, TokenProvider};
use crate::config::GoogleSettings;
use crate::{Config, Result};
use anyhow::{anyhow, Context};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

/// Talks to Google Drive v3 and Google Sheets v4 with a bearer token from a `TokenProvider`.
pub(crate) struct Google {
    settings: GoogleSettings,
    tokens: TokenProvider,
    http: reqwest::Client,
}

impl Google {
    /// Loads the stored token. Never opens a browser.
    pub(crate) async fn new(config: &Config) -> Result<Self> {
        let store = config.secret_store().await?;
        let tokens = TokenProvider::load(store).await.context(
            "Unable to use the stored Google token. \n\n\
            You should run 'ledger-bridge google auth' first.",
        )?;
        Ok(Self::with_tokens(config.google().clone(), tokens))
    }

    pub(crate) fn with_tokens(settings: GoogleSettings, tokens: TokenProvider) -> Self {
        Self {
            settings,
            tokens,
            http: reqwest::Client::new(),
        }
    }

    pub(super) fn drive_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.settings.drive_base, segments)
    }

    pub(super) fn sheets_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.settings.sheets_base, segments)
    }

    /// Starts a request carrying a fresh access token.
    pub(super) async fn authorized(&mut self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self.tokens.token_with_refresh().await?.to_string();
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

/// Sends the request and parses a successful JSON response.
pub(super) async fn send_json<T>(request: RequestBuilder, action: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to send the {action} request"))?;
    let response = ensure_success(response, action).await?;
    response
        .json()
        .await
        .with_context(|| format!("Unable to parse the {action} response"))
}

/// Appends percent-encoded path segments to an API base URL.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid API base URL '{base}'"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("'{base}' cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint(
            "https://sheets.googleapis.com/v4",
            &["spreadsheets", "abc", "values", "売上!A1:B2"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/%E5%A3%B2%E4%B8%8A!A1:B2"
        );
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let url = endpoint("http://127.0.0.1:5000/", &["files", "x/y"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/files/x%2Fy");
    }
}

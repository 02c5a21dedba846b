//! OAuth 2.0 plumbing shared by the freee and Google clients, plus the Google installed-app flow.
//!
//! The Google flow:
//! - loads the OAuth client credentials from the `GOOGLE_WORKSPACE_CREDENTIALS` secret
//! - serves a one-shot callback on `http://localhost:{ephemeral port}/`
//! - opens the consent page in the browser and waits up to five minutes for the redirect
//! - exchanges the code (with PKCE) and stores the tokens in `GOOGLE_WORKSPACE_TOKEN`
//! - refreshes the access token when it is within five minutes of expiry

use crate::api::files::{SecretFile, StoredJson, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::secrets::{SecretStore, GOOGLE_CREDENTIALS, GOOGLE_TOKEN};
use crate::Result;
use anyhow::{anyhow, bail, ensure, Context};
use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long to wait for the browser to hit the loopback redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Used when the token endpoint does not say how long the access token lives.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// An oauth2 client with the authorization and token endpoints set.
pub(super) type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub(super) fn oauth_client(
    client_id: &str,
    client_secret: &str,
    auth_uri: &str,
    token_uri: &str,
    redirect_uri: Option<&str>,
    auth_type: AuthType,
) -> Result<OAuthClient> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_client_secret(ClientSecret::new(client_secret.to_string()))
        .set_auth_uri(
            AuthUrl::new(auth_uri.to_string())
                .with_context(|| format!("Invalid authorization URL '{auth_uri}'"))?,
        )
        .set_token_uri(
            TokenUrl::new(token_uri.to_string())
                .with_context(|| format!("Invalid token URL '{token_uri}'"))?,
        )
        .set_auth_type(auth_type);
    Ok(match redirect_uri {
        Some(uri) => client.set_redirect_uri(
            RedirectUrl::new(uri.to_string())
                .with_context(|| format!("Invalid redirect URL '{uri}'"))?,
        ),
        None => client,
    })
}

/// The HTTP client used for token requests. Redirects are not followed.
pub(super) fn http_client() -> Result<oauth2::reqwest::Client> {
    oauth2::reqwest::ClientBuilder::new()
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .context("Failed to build the OAuth HTTP client")
}

/// Turns a token endpoint failure into an error that shows what the server said.
pub(super) fn token_error<RE>(e: RequestTokenError<RE, BasicErrorResponse>) -> anyhow::Error
where
    RE: std::error::Error + 'static,
{
    match e {
        RequestTokenError::ServerResponse(response) => anyhow!(
            "The token endpoint returned an error: {}",
            serde_json::to_string(&response).unwrap_or_else(|_| response.to_string())
        ),
        RequestTokenError::Parse(err, body) => anyhow!(
            "Unable to parse the token endpoint response ({err}): {}",
            String::from_utf8_lossy(&body)
        ),
        other => anyhow!("The token request failed: {other}"),
    }
}

/// Computes the absolute expiry from the `expires_in` of a token response.
pub(super) fn expiry(expires_in: Option<Duration>) -> DateTime<Utc> {
    let secs = expires_in
        .map(|d| d.as_secs())
        .unwrap_or(DEFAULT_EXPIRES_IN);
    Utc::now() + chrono::Duration::seconds(secs as i64)
}

/// Provides Google access tokens, refreshing them through the stored refresh token.
pub(crate) struct TokenProvider {
    credentials: SecretFile,
    token: StoredJson<TokenFile>,
}

impl TokenProvider {
    /// Runs the browser consent flow and stores the resulting token. This is the only place where
    /// a browser is opened.
    pub(crate) async fn initialize(store: Arc<dyn SecretStore>) -> Result<Self> {
        let credentials = load_credentials(store.clone()).await?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback server")?;
        let port = listener
            .local_addr()
            .context("Unable to read the callback server address")?
            .port();
        let redirect = format!("http://localhost:{port}/");
        debug!("Local callback server listening on {redirect}");

        let client = oauth_client(
            credentials.client_id(),
            credentials.client_secret(),
            credentials.auth_uri(),
            credentials.token_uri(),
            Some(&redirect),
            AuthType::BasicAuth,
        )?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        info!("Opening the browser for Google authorization. If it does not open, visit:\n\n{auth_url}\n");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("Unable to open a browser: {e}");
        }

        let callback = tokio::time::timeout(CALLBACK_TIMEOUT, wait_for_callback(listener))
            .await
            .context("Timed out waiting for the OAuth callback")??;
        if let Some(error) = callback.error {
            bail!("Google authorization failed: {error}");
        }
        ensure!(
            callback.state.as_deref() == Some(csrf.secret().as_str()),
            "The OAuth state returned to the callback does not match the request"
        );
        let code = callback
            .code
            .context("The OAuth callback did not include an authorization code")?;

        let http = http_client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http)
            .await
            .map_err(token_error)
            .context("Failed to exchange the authorization code")?;

        let refresh_token = response
            .refresh_token()
            .context("Google did not return a refresh token")?
            .secret()
            .clone();
        let scopes: Vec<String> = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.as_str().to_string()).collect(),
            None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let token_file = TokenFile::new(
            scopes,
            response.access_token().secret().clone(),
            refresh_token,
            expiry(response.expires_in()),
            None,
        )
        .with_client(&credentials);
        token_file.validate_scopes()?;

        let token = StoredJson::new(store, GOOGLE_TOKEN, token_file);
        token.save().await?;
        info!("Authorization successful, the token was saved as {GOOGLE_TOKEN}");

        Ok(Self { credentials, token })
    }

    /// Loads the stored credentials and token without any interaction.
    pub(crate) async fn load(store: Arc<dyn SecretStore>) -> Result<Self> {
        let credentials = load_credentials(store.clone()).await?;
        let token = StoredJson::<TokenFile>::load(store, GOOGLE_TOKEN).await?;
        token.data().validate_scopes()?;
        Ok(Self { credentials, token })
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Result<()> {
        let client = oauth_client(
            self.credentials.client_id(),
            self.credentials.client_secret(),
            self.credentials.auth_uri(),
            self.credentials.token_uri(),
            None,
            AuthType::BasicAuth,
        )?;
        let http = http_client()?;
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http)
            .await
            .map_err(token_error)
            .context("Failed to refresh the Google access token")?;

        self.token.data_mut().update(
            response.access_token().secret().clone(),
            expiry(response.expires_in()),
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save().await?;
        debug!("Token valid until: {}", self.token.data().expires_at());
        Ok(())
    }

    /// Returns a valid access token, refreshing first if it is expired or about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Result<&str> {
        if self.token.data().is_expired() {
            debug!("The Google access token is expired or about to expire, refreshing");
            self.refresh().await?;
        }
        Ok(self.token())
    }

    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }
}

async fn load_credentials(store: Arc<dyn SecretStore>) -> Result<SecretFile> {
    let credentials = StoredJson::<SecretFile>::load(store, GOOGLE_CREDENTIALS)
        .await
        .with_context(|| {
            format!(
                "Unable to load the Google OAuth client credentials. Store the downloaded \
                client_secret.json with 'ledger-bridge secret set {GOOGLE_CREDENTIALS} --file \
                client_secret.json'"
            )
        })?;
    Ok(credentials.data().clone())
}

/// The query parameters Google appends to the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Returns `None` for requests that are not the OAuth redirect (e.g. `/favicon.ico`).
fn parse_callback_query(query: &str) -> Option<CallbackParams> {
    let mut params = CallbackParams::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    if params.code.is_none() && params.error.is_none() {
        return None;
    }
    Some(params)
}

fn handle_callback(req: &Request<Incoming>, tx: &mpsc::Sender<CallbackParams>) -> Response<String> {
    let Some(params) = req.uri().query().and_then(parse_callback_query) else {
        let mut response = Response::new("Not found".to_string());
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    };
    let message = if params.error.is_some() {
        "Authorization failed. You can close this window."
    } else {
        "Authorization complete. You can close this window and return to the terminal."
    };
    if tx.try_send(params).is_err() {
        debug!("Ignoring a repeated OAuth callback");
    }
    Response::new(message.to_string())
}

/// Serves HTTP/1 connections on `listener` until one of them carries the OAuth redirect.
async fn wait_for_callback(listener: TcpListener) -> Result<CallbackParams> {
    let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);
    loop {
        tokio::select! {
            params = rx.recv() => {
                return params.context("The OAuth callback server stopped unexpectedly");
            }
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("Failed to accept a callback connection")?;
                let tx = tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let response = handle_callback(&req, &tx);
                        async move { Ok::<_, Infallible>(response) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .keep_alive(false)
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Callback connection error: {e}");
                    }
                });
            }
        }
    }
}

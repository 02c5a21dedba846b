//! A thin client for the freee accounting API (v1).
//!
//! Every request is authenticated with a bearer token obtained from the stored refresh token. The
//! token and the company id are fetched lazily on first use and cached for the life of the client.

use crate::api::ensure_success;
use crate::api::oauth::{self, OAuthClient};
use crate::config::FreeeSettings;
use crate::secrets::{SecretStore, FREEE_CLIENT_ID, FREEE_CLIENT_SECRET, FREEE_REFRESH_TOKEN};
use crate::{Config, Result};
use anyhow::{bail, Context};
use oauth2::{AuthType, AuthorizationCode, CsrfToken, RefreshToken, Scope, TokenResponse};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Page size used by `paginate`.
pub(crate) const PAGE_LIMIT: usize = 100;

const PAGE_DELAY: Duration = Duration::from_millis(300);
const API_VERSION_HEADER: &str = "X-Api-Version";
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
const SCOPE: &str = "read_write";

/// Query parameters for a freee request.
pub(crate) type Params = Vec<(&'static str, String)>;

#[derive(Debug, Deserialize)]
struct Company {
    id: i64,
    #[serde(default)]
    display_name: Option<String>,
}

pub(crate) struct Freee {
    settings: FreeeSettings,
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
    access_token: OnceCell<String>,
    company_id: OnceCell<i64>,
    page_delay: Duration,
}

impl Freee {
    pub(crate) async fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_store(
            config.freee().clone(),
            config.secret_store().await?,
        ))
    }

    pub(crate) fn with_store(settings: FreeeSettings, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            settings,
            secrets,
            http: reqwest::Client::new(),
            access_token: OnceCell::new(),
            company_id: OnceCell::new(),
            page_delay: PAGE_DELAY,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    async fn access_token(&self) -> Result<&str> {
        self.access_token
            .get_or_try_init(|| self.fetch_access_token())
            .await
            .map(|s| s.as_str())
    }

    /// Exchanges the stored refresh token. freee rotates refresh tokens, so the new one is saved.
    async fn fetch_access_token(&self) -> Result<String> {
        let (_, client_id) = self.secrets.require_either_case(FREEE_CLIENT_ID).await?;
        let (_, client_secret) = self.secrets.require_either_case(FREEE_CLIENT_SECRET).await?;
        let (refresh_name, refresh_token) = self
            .secrets
            .require_either_case(FREEE_REFRESH_TOKEN)
            .await
            .context("Run 'ledger-bridge freee auth' to obtain a refresh token")?;

        let client = oauth::oauth_client(
            &client_id,
            &client_secret,
            &self.settings.authorize_url,
            &self.settings.token_url,
            None,
            AuthType::RequestBody,
        )?;
        let http = oauth::http_client()?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(&http)
            .await
            .map_err(oauth::token_error)
            .context("Failed to refresh the freee access token")?;

        if let Some(rotated) = response.refresh_token() {
            self.secrets
                .put(&refresh_name, rotated.secret())
                .await
                .context("Unable to save the new freee refresh token")?;
            debug!("Saved the rotated freee refresh token as {refresh_name}");
        }
        Ok(response.access_token().secret().clone())
    }

    /// The configured company id, or the first company the user belongs to.
    pub(crate) async fn company_id(&self) -> Result<i64> {
        if let Some(id) = self.settings.company_id {
            return Ok(id);
        }
        self.company_id
            .get_or_try_init(|| self.first_company_id())
            .await
            .copied()
    }

    async fn first_company_id(&self) -> Result<i64> {
        let body = self.get("companies", &[]).await?;
        let companies: Vec<Company> = serde_json::from_value(take_array(body, "companies").into())
            .context("Unable to parse the freee companies")?;
        let Some(company) = companies.first() else {
            bail!("No companies found.");
        };
        info!(
            "Using freee company {} ({})",
            company.id,
            company.display_name.as_deref().unwrap_or("unnamed")
        );
        Ok(company.id)
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, self.url(endpoint))
            .bearer_auth(token)
            .header(API_VERSION_HEADER, &self.settings.api_version))
    }

    /// `GET {api_base}/{endpoint}` with the given query parameters.
    pub(crate) async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let response = self
            .request(Method::GET, endpoint)
            .await?
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to send GET {endpoint}"))?;
        let response = ensure_success(response, &format!("GET {endpoint}")).await?;
        response
            .json()
            .await
            .with_context(|| format!("Unable to parse the response of GET {endpoint}"))
    }

    /// POSTs a JSON body. freee answers `201 Created` for every successful create.
    pub(crate) async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let response = self
            .request(Method::POST, endpoint)
            .await?
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send POST {endpoint}"))?;
        expect_created(response, endpoint).await
    }

    /// Uploads a file to the receipts (file box) endpoint.
    pub(crate) async fn post_receipt(&self, path: &Path) -> Result<Value> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Unable to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "receipt".to_string());
        let form = Form::new()
            .text("company_id", self.company_id().await?.to_string())
            .part("receipt", Part::bytes(bytes).file_name(file_name));
        let response = self
            .request(Method::POST, "receipts")
            .await?
            .multipart(form)
            .send()
            .await
            .context("Failed to send the receipt upload")?;
        expect_created(response, "receipts").await
    }

    /// Fetches every record of a list endpoint using limit/offset paging. `company_id`, `limit`
    /// and `offset` are added to `params`.
    ///
    /// Paging stops on an empty page or a short page. A page longer than the limit means the
    /// endpoint ignored `limit` and returned everything at once.
    pub(crate) async fn paginate(
        &self,
        endpoint: &str,
        resource_key: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>> {
        let company_id = self.company_id().await?.to_string();
        let mut offset = 0;
        let mut all = Vec::new();
        info!("Fetching {endpoint}");
        loop {
            let mut query = vec![
                ("company_id", company_id.clone()),
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ];
            query.extend(params.iter().cloned());

            let items = take_array(self.get(endpoint, &query).await?, resource_key);
            if items.is_empty() {
                break;
            }
            let count = items.len();
            all.extend(items);
            if count > PAGE_LIMIT {
                debug!("Received {count} items with limit={PAGE_LIMIT}, assuming a full fetch");
                break;
            }
            debug!("Fetched {count} items (total: {})", all.len());
            if count < PAGE_LIMIT {
                break;
            }
            offset += PAGE_LIMIT;
            tokio::time::sleep(self.page_delay).await;
        }
        Ok(all)
    }
}

async fn expect_created(response: reqwest::Response, endpoint: &str) -> Result<Value> {
    let status = response.status();
    if status != StatusCode::CREATED {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("POST {endpoint} failed with status {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Unable to parse the response of POST {endpoint}"))
}

/// Removes and returns the array stored under `key`, or an empty vector.
pub(crate) fn take_array(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// The manual (out-of-band) authorization-code flow used by `freee auth`.
pub(crate) struct FreeeAuthorization {
    client: OAuthClient,
}

/// Tokens returned by the authorization-code exchange.
#[derive(Debug, Clone)]
pub(crate) struct IssuedTokens {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
}

impl FreeeAuthorization {
    pub(crate) fn new(
        settings: &FreeeSettings,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self> {
        let client = oauth::oauth_client(
            client_id,
            client_secret,
            &settings.authorize_url,
            &settings.token_url,
            Some(OOB_REDIRECT),
            AuthType::RequestBody,
        )?;
        Ok(Self { client })
    }

    /// The URL the user opens to log in and obtain an authorization code.
    pub(crate) fn authorize_url(&self) -> String {
        let (url, _state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(SCOPE.to_string()))
            .url();
        url.to_string()
    }

    pub(crate) async fn exchange_code(&self, code: &str) -> Result<IssuedTokens> {
        let http = oauth::http_client()?;
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .request_async(&http)
            .await
            .map_err(oauth::token_error)
            .context("Failed to exchange the freee authorization code")?;
        Ok(IssuedTokens {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::FileSecrets;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_store(dir: &Path) -> Arc<dyn SecretStore> {
        let store: Arc<dyn SecretStore> = Arc::new(FileSecrets::new(dir));
        store.put(FREEE_CLIENT_ID, "cid").await.unwrap();
        store.put(FREEE_CLIENT_SECRET, "csecret").await.unwrap();
        store.put(FREEE_REFRESH_TOKEN, "rt-1").await.unwrap();
        store
    }

    fn settings(server: &MockServer, company_id: Option<i64>) -> FreeeSettings {
        FreeeSettings {
            api_base: server.base_url(),
            authorize_url: server.url("/authorize"),
            token_url: server.url("/token"),
            company_id,
            ..FreeeSettings::default()
        }
    }

    fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=refresh_token")
                .body_contains("refresh_token=rt-1")
                .body_contains("client_id=cid");
            then.status(200).json_body(json!({
                "access_token": "at-1",
                "token_type": "bearer",
                "expires_in": 21600,
                "refresh_token": "rt-2",
                "scope": "read write"
            }));
        })
    }

    fn items(start: usize, count: usize) -> Vec<Value> {
        (start..start + count).map(|id| json!({ "id": id })).collect()
    }

    #[tokio::test]
    async fn test_get_refreshes_once_and_rotates_refresh_token() {
        let server = MockServer::start();
        let token = mock_token(&server);
        let tags = server.mock(|when, then| {
            when.method(GET)
                .path("/tags")
                .header("authorization", "Bearer at-1")
                .header("x-api-version", "2020-06-15")
                .query_param("company_id", "7");
            then.status(200).json_body(json!({ "tags": [{ "id": 1 }] }));
        });
        let dir = TempDir::new().unwrap();
        let store = test_store(dir.path()).await;
        let freee = Freee::with_store(settings(&server, Some(7)), store.clone());

        let params = vec![("company_id", "7".to_string())];
        freee.get("tags", &params).await.unwrap();
        freee.get("tags", &params).await.unwrap();

        token.assert_hits(1);
        tags.assert_hits(2);
        assert_eq!(store.require(FREEE_REFRESH_TOKEN).await.unwrap(), "rt-2");
    }

    #[tokio::test]
    async fn test_lowercase_secrets_are_read_and_rotated_in_place() {
        let server = MockServer::start();
        let token = mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/tags");
            then.status(200).json_body(json!({ "tags": [] }));
        });
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn SecretStore> = Arc::new(FileSecrets::new(dir.path()));
        store.put("freee_client_id", "cid").await.unwrap();
        store.put("freee_client_secret", "csecret").await.unwrap();
        store.put("freee_refresh_token", "rt-1").await.unwrap();
        let freee = Freee::with_store(settings(&server, Some(7)), store.clone());

        freee.get("tags", &[]).await.unwrap();
        token.assert();
        assert_eq!(store.require("freee_refresh_token").await.unwrap(), "rt-2");
    }

    #[tokio::test]
    async fn test_company_id_uses_first_company() {
        let server = MockServer::start();
        mock_token(&server);
        let companies = server.mock(|when, then| {
            when.method(GET).path("/companies");
            then.status(200).json_body(json!({
                "companies": [
                    { "id": 11, "display_name": "First KK" },
                    { "id": 12, "display_name": "Second KK" }
                ]
            }));
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, None), test_store(dir.path()).await);

        assert_eq!(freee.company_id().await.unwrap(), 11);
        assert_eq!(freee.company_id().await.unwrap(), 11);
        companies.assert_hits(1);
    }

    #[tokio::test]
    async fn test_company_id_no_companies() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/companies");
            then.status(200).json_body(json!({ "companies": [] }));
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, None), test_store(dir.path()).await);

        let err = freee.company_id().await.unwrap_err();
        assert_eq!(err.to_string(), "No companies found.");
    }

    #[tokio::test]
    async fn test_paginate_follows_offsets_until_short_page() {
        let server = MockServer::start();
        mock_token(&server);
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/deals")
                .query_param("limit", "100")
                .query_param("offset", "0")
                .query_param("start_issue_date", "2024-01-01");
            then.status(200).json_body(json!({ "deals": items(0, 100) }));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/deals").query_param("offset", "100");
            then.status(200).json_body(json!({ "deals": items(100, 3) }));
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, Some(1)), test_store(dir.path()).await)
            .with_page_delay(Duration::ZERO);

        let deals = freee
            .paginate(
                "deals",
                "deals",
                &[("start_issue_date", "2024-01-01".to_string())],
            )
            .await
            .unwrap();
        first.assert();
        second.assert();
        assert_eq!(deals.len(), 103);
        assert_eq!(deals[102]["id"], 102);
    }

    #[tokio::test]
    async fn test_paginate_stops_when_limit_is_ignored() {
        let server = MockServer::start();
        mock_token(&server);
        let taxes = server.mock(|when, then| {
            when.method(GET).path("/taxes/companies/1");
            then.status(200).json_body(json!({ "taxes": items(0, 150) }));
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, Some(1)), test_store(dir.path()).await)
            .with_page_delay(Duration::ZERO);

        let all = freee
            .paginate("taxes/companies/1", "taxes", &[])
            .await
            .unwrap();
        taxes.assert_hits(1);
        assert_eq!(all.len(), 150);
    }

    #[tokio::test]
    async fn test_paginate_propagates_errors() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/partners");
            then.status(401).body("unauthorized");
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, Some(1)), test_store(dir.path()).await);

        let err = freee.paginate("partners", "partners", &[]).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_post_json_requires_created() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(POST).path("/deals");
            then.status(400)
                .json_body(json!({ "errors": [{ "messages": ["issue_date is invalid"] }] }));
        });
        let dir = TempDir::new().unwrap();
        let freee = Freee::with_store(settings(&server, Some(1)), test_store(dir.path()).await);

        let err = freee
            .post_json("deals", &json!({ "company_id": 1 }))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("400"));
        assert!(err.contains("issue_date is invalid"));
    }

    #[tokio::test]
    async fn test_post_receipt_multipart() {
        let server = MockServer::start();
        mock_token(&server);
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/receipts")
                .body_contains("name=\"company_id\"")
                .body_contains("name=\"receipt\"; filename=\"scan.pdf\"")
                .body_contains("%PDF-fake");
            then.status(201).json_body(json!({ "receipt": { "id": 99 } }));
        });
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("scan.pdf");
        std::fs::write(&file, "%PDF-fake").unwrap();
        let freee = Freee::with_store(
            settings(&server, Some(1)),
            test_store(&dir.path().join("secrets")).await,
        );

        let created = freee.post_receipt(&file).await.unwrap();
        upload.assert();
        assert_eq!(created["receipt"]["id"], 99);
    }

    #[tokio::test]
    async fn test_authorization_code_flow() {
        let server = MockServer::start();
        let exchange = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=the-code")
                .body_contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob");
            then.status(200).json_body(json!({
                "access_token": "at-9",
                "token_type": "bearer",
                "refresh_token": "rt-9"
            }));
        });
        let auth = FreeeAuthorization::new(&settings(&server, None), "cid", "csecret").unwrap();

        let url = auth.authorize_url();
        assert!(url.starts_with(&server.url("/authorize")));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=read_write"));
        assert!(url.contains("client_id=cid"));

        let tokens = auth.exchange_code(" the-code \n").await.unwrap();
        exchange.assert();
        assert_eq!(tokens.access_token, "at-9");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-9"));
    }

    #[test]
    fn test_take_array() {
        assert_eq!(take_array(json!({ "a": [1, 2] }), "a").len(), 2);
        assert!(take_array(json!({ "a": {} }), "a").is_empty());
        assert!(take_array(json!([1]), "a").is_empty());
    }
}

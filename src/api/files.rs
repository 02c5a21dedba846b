//! Serialization and deserialization structures for the Google OAuth secrets.
//! - `GOOGLE_WORKSPACE_CREDENTIALS`: OAuth 2.0 client credentials from Google Cloud Console
//! - `GOOGLE_WORKSPACE_TOKEN`: the access and refresh tokens obtained by `google auth`

use crate::api::OAUTH_SCOPES;
use crate::secrets::SecretStore;
use crate::Result;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
const REDIRECT: &str = "http://localhost";

/// Holds a JSON document that lives in the secret store under `name`, together with the store it
/// came from so that it can be written back after it changes.
#[derive(Clone)]
pub(super) struct StoredJson<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    store: Arc<dyn SecretStore>,
    name: &'static str,
    data: F,
}

impl<F> StoredJson<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    /// Load and parse the secret `name`.
    pub(super) async fn load(store: Arc<dyn SecretStore>, name: &'static str) -> Result<Self> {
        let raw = store.require(name).await?;
        let data: F = serde_json::from_str(&raw)
            .with_context(|| format!("The secret '{name}' does not contain the expected JSON"))?;
        Ok(Self { store, name, data })
    }

    pub(super) fn new(store: Arc<dyn SecretStore>, name: &'static str, data: F) -> Self {
        Self { store, name, data }
    }

    /// Write the current data back to the secret store.
    pub(super) async fn save(&self) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        self.store.put(self.name, &json).await
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }
}

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console,
/// which is stored verbatim as the `GOOGLE_WORKSPACE_CREDENTIALS` secret.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,

    /// For this application, should contain "http://localhost" (without a port number)
    redirect_uris: RedirectUris,

    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the OAuth client for your Google project, choose 'Desktop app' so \
                that '{REDIRECT}' is included"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// This is how we save the token information that we receive from Google OAuth.
///
/// Google's `authorized_user` format (`token`, `expiry`, `client_id`, ...) as written by the
/// google-auth libraries is accepted too. A missing or null access token or expiry reads as an
/// expired token, which is refreshed on first use. The client fields are written back so that
/// those libraries can read the token this tool saves.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default, alias = "token", deserialize_with = "null_as_empty")]
    access_token: String,
    refresh_token: String,
    #[serde(default = "epoch", alias = "expiry", deserialize_with = "null_as_epoch")]
    expires_at: DateTime<Utc>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_epoch<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(epoch))
}

impl TokenFile {
    pub(super) fn validate_scopes(&self) -> Result<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        id_token: Option<String>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
            id_token,
            token_uri: None,
            client_id: None,
            client_secret: None,
        }
    }

    /// Records the OAuth client the token was issued to.
    pub(super) fn with_client(mut self, credentials: &SecretFile) -> Self {
        self.token_uri = Some(credentials.token_uri().to_string());
        self.client_id = Some(credentials.client_id().to_string());
        self.client_secret = Some(credentials.client_secret().to_string());
        self
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(super) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let now = Utc::now();
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= now + buffer
    }

    /// Google only returns a refresh token on the first consent, so `refresh_token` is kept when
    /// the refresh response does not contain a new one.
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{FileSecrets, GOOGLE_CREDENTIALS, GOOGLE_TOKEN};
    use tempfile::TempDir;

    fn credentials_json(redirects: &str) -> String {
        format!(
            r#"
{{
    "installed": {{
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": {redirects},
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }}
}}
"#
        )
    }

    async fn store_with(name: &str, value: &str) -> (TempDir, Arc<dyn SecretStore>) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn SecretStore> = Arc::new(FileSecrets::new(dir.path()));
        store.put(name, value).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let json = credentials_json(r#"["http://localhost", "https://example.com:4040/x"]"#);
        let (_dir, store) = store_with(GOOGLE_CREDENTIALS, &json).await;
        let secret = StoredJson::<SecretFile>::load(store, GOOGLE_CREDENTIALS)
            .await
            .unwrap();
        assert_eq!(
            secret.data().client_id(),
            "YOUR_CLIENT_ID.apps.googleusercontent.com"
        );
        assert_eq!(
            secret.data().token_uri(),
            "https://oauth2.googleapis.com/token"
        );
    }

    #[tokio::test]
    async fn test_client_secret_loopback_ip_redirect() {
        let json = credentials_json(r#"["http://127.0.0.1"]"#);
        let (_dir, store) = store_with(GOOGLE_CREDENTIALS, &json).await;
        assert!(StoredJson::<SecretFile>::load(store, GOOGLE_CREDENTIALS)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let json = credentials_json(r#"["http://localhost:9900", "https://example.com"]"#);
        let (_dir, store) = store_with(GOOGLE_CREDENTIALS, &json).await;
        let err = StoredJson::<SecretFile>::load(store, GOOGLE_CREDENTIALS)
            .await
            .err()
            .unwrap();
        assert!(format!("{err:?}").contains("At least one of the redirects"));
    }

    #[tokio::test]
    async fn test_validate_token_file_missing_scope() {
        let json = r#"
        {
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "access_token": "abc12",
            "refresh_token": "xyz89",
            "expires_at": "2025-01-01T00:00:00Z"
        }"#;
        let (_dir, store) = store_with(GOOGLE_TOKEN, json).await;
        let token = StoredJson::<TokenFile>::load(store, GOOGLE_TOKEN)
            .await
            .unwrap();
        let err = token.data().validate_scopes().unwrap_err().to_string();
        assert!(err.contains("https://www.googleapis.com/auth/drive.readonly"));
        assert!(token.data().is_expired());
    }

    #[tokio::test]
    async fn test_authorized_user_token_is_accepted() {
        let json = r#"
        {
            "token": "ya29.access",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
            "client_secret": "YOUR_CLIENT_SECRET",
            "scopes": [
                "https://www.googleapis.com/auth/spreadsheets",
                "https://www.googleapis.com/auth/drive.readonly"
            ],
            "expiry": "2999-06-01T10:00:00.123456Z"
        }"#;
        let (_dir, store) = store_with(GOOGLE_TOKEN, json).await;
        let token = StoredJson::<TokenFile>::load(store.clone(), GOOGLE_TOKEN)
            .await
            .unwrap();
        token.data().validate_scopes().unwrap();
        assert_eq!(token.data().access_token(), "ya29.access");
        assert_eq!(token.data().refresh_token(), "1//refresh");
        assert!(!token.data().is_expired());

        token.save().await.unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&store.require(GOOGLE_TOKEN).await.unwrap()).unwrap();
        assert_eq!(saved["client_secret"], "YOUR_CLIENT_SECRET");
        assert_eq!(saved["refresh_token"], "1//refresh");
    }

    #[tokio::test]
    async fn test_token_without_access_token_or_expiry_is_expired() {
        let json = r#"{"refresh_token": "1//refresh", "scopes": []}"#;
        let (_dir, store) = store_with(GOOGLE_TOKEN, json).await;
        let token = StoredJson::<TokenFile>::load(store, GOOGLE_TOKEN)
            .await
            .unwrap();
        assert_eq!(token.data().access_token(), "");
        assert!(token.data().is_expired());
    }

    #[tokio::test]
    async fn test_token_file_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn SecretStore> = Arc::new(FileSecrets::new(dir.path()));
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            "access".to_string(),
            "refresh".to_string(),
            expires_at,
            None,
        );
        let mut stored = StoredJson::new(store.clone(), GOOGLE_TOKEN, token);
        stored
            .data_mut()
            .update("access-2".to_string(), expires_at, None);
        stored.save().await.unwrap();

        let loaded = StoredJson::<TokenFile>::load(store, GOOGLE_TOKEN)
            .await
            .unwrap();
        loaded.data().validate_scopes().unwrap();
        assert_eq!(loaded.data().access_token(), "access-2");
        assert_eq!(loaded.data().refresh_token(), "refresh");
        assert!(!loaded.data().is_expired());
    }
}

//! Storage for OAuth client credentials and refresh tokens.
//!
//! Secrets live either in files under `$LEDGER_BRIDGE_HOME/.secrets` or in GCP Secret Manager.
//! Commands only see the `SecretStore` trait.

use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

pub(crate) const FREEE_CLIENT_ID: &str = "FREEE_CLIENT_ID";
pub(crate) const FREEE_CLIENT_SECRET: &str = "FREEE_CLIENT_SECRET";
pub(crate) const FREEE_REFRESH_TOKEN: &str = "FREEE_REFRESH_TOKEN";
pub(crate) const GOOGLE_CREDENTIALS: &str = "GOOGLE_WORKSPACE_CREDENTIALS";
pub(crate) const GOOGLE_TOKEN: &str = "GOOGLE_WORKSPACE_TOKEN";

const SECRET_MANAGER_BASE: &str = "https://secretmanager.googleapis.com/v1";

/// Where secrets are kept.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SecretBackend {
    /// One file per secret in the `.secrets` directory.
    #[default]
    File,
    /// GCP Secret Manager, authenticated through `gcloud`.
    SecretManager,
}

serde_plain::derive_display_from_serialize!(SecretBackend);
serde_plain::derive_fromstr_from_deserialize!(SecretBackend);

#[async_trait::async_trait]
pub(crate) trait SecretStore: Send + Sync {
    /// Returns the latest value of the secret, or `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Stores a new value for the secret.
    async fn put(&self, name: &str, value: &str) -> Result<()>;

    /// Like `get`, but a missing secret is an error.
    async fn require(&self, name: &str) -> Result<String> {
        match self.get(name).await? {
            Some(value) => Ok(value),
            None => bail!("The secret '{name}' was not found"),
        }
    }

    /// Like `require`, but falls back to the lowercase spelling of `name` used by older setups.
    /// Returns the name the value was found under together with the value.
    async fn require_either_case(&self, name: &str) -> Result<(String, String)> {
        if let Some(value) = self.get(name).await? {
            return Ok((name.to_string(), value));
        }
        let legacy = name.to_ascii_lowercase();
        if legacy != name {
            if let Some(value) = self.get(&legacy).await? {
                debug!("Using the secret {legacy} in place of {name}");
                return Ok((legacy, value));
            }
        }
        bail!("The secret '{name}' was not found")
    }
}

fn validate_name(name: &str) -> Result<()> {
    ensure!(
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        "Invalid secret name '{name}': use letters, digits, '_' or '-'"
    );
    Ok(())
}

/// Keeps each secret in its own file, readable only by the owner.
#[derive(Debug, Clone)]
pub(crate) struct FileSecrets {
    dir: PathBuf,
}

impl FileSecrets {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait::async_trait]
impl SecretStore for FileSecrets {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        validate_name(name)?;
        let path = self.path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let value = utils::read(&path).await?;
        Ok(Some(value.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        validate_name(name)?;
        utils::make_dir(&self.dir).await?;
        utils::write_private(self.path(name), value).await?;
        debug!("Stored secret {name} in {}", self.dir.display());
        Ok(())
    }
}

/// How the Secret Manager client gets its bearer token.
#[derive(Debug, Clone)]
pub(crate) enum AccessToken {
    /// Ask `gcloud auth print-access-token` on every call.
    Gcloud,
    /// A fixed token.
    Static(String),
}

impl AccessToken {
    async fn get(&self) -> Result<String> {
        match self {
            AccessToken::Static(token) => Ok(token.clone()),
            AccessToken::Gcloud => gcloud(&["auth", "print-access-token"]).await,
        }
    }
}

/// Reads and writes secrets through the GCP Secret Manager REST API.
#[derive(Debug, Clone)]
pub(crate) struct SecretManager {
    project_id: String,
    base_url: String,
    token: AccessToken,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: String,
}

impl SecretManager {
    pub(crate) fn new(project_id: impl Into<String>) -> Self {
        Self::with_endpoint(project_id, SECRET_MANAGER_BASE, AccessToken::Gcloud)
    }

    pub(crate) fn with_endpoint(
        project_id: impl Into<String>,
        base_url: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/projects/{}/secrets/{}",
            self.base_url, self.project_id, name
        )
    }
}

#[async_trait::async_trait]
impl SecretStore for SecretManager {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        validate_name(name)?;
        let url = format!("{}/versions/latest:access", self.secret_url(name));
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token.get().await?)
            .send()
            .await
            .with_context(|| format!("Failed to request secret {name}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to get secret {name}: {status}: {body}");
        }

        let access: AccessResponse = response
            .json()
            .await
            .with_context(|| format!("Unable to parse the Secret Manager response for {name}"))?;
        let bytes = BASE64
            .decode(access.payload.data.as_bytes())
            .with_context(|| format!("Secret {name} is not valid base64"))?;
        let value = String::from_utf8(bytes).with_context(|| format!("Secret {name} is not UTF-8"))?;
        Ok(Some(value))
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        validate_name(name)?;
        let url = format!("{}:addVersion", self.secret_url(name));
        let body = json!({ "payload": { "data": BASE64.encode(value.as_bytes()) } });
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token.get().await?)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to add a version to secret {name}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to update secret {name}: {status}: {body}");
        }
        debug!("Added a new version of secret {name}");
        Ok(())
    }
}

/// Runs `gcloud` and returns its trimmed stdout.
pub(crate) async fn gcloud(args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new("gcloud")
        .args(args)
        .output()
        .await
        .context("Unable to run gcloud; is the Google Cloud SDK installed?")?;
    if !output.status.success() {
        bail!(
            "gcloud {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

//! Configuration file handling for ledger-bridge.
//!
//! The configuration file is stored at `$LEDGER_BRIDGE_HOME/config.json` and contains the API
//! endpoints, the secret storage backend and a few optional defaults.

use crate::secrets::{FileSecrets, SecretBackend, SecretManager, SecretStore};
use crate::{secrets, utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_NAME: &str = "ledger-bridge";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const IMPORT_LOG_JSONL: &str = "import_log.jsonl";
const GCP_PROJECT_ID_ENV: &str = "GCP_PROJECT_ID";

const FREEE_API_BASE: &str = "https://api.freee.co.jp/api/1";
const FREEE_AUTHORIZE_URL: &str = "https://accounts.secure.freee.co.jp/public_api/authorize";
const FREEE_TOKEN_URL: &str = "https://accounts.secure.freee.co.jp/public_api/token";
const FREEE_API_VERSION: &str = "2020-06-15";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";
const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$LEDGER_BRIDGE_HOME` and from there it loads `config.json`. It also knows where
/// the secrets directory and the journal import log live.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory.
    /// - `secret_backend` - Where OAuth client credentials and tokens are stored.
    /// - `gcp_project_id` - The GCP project that owns the secrets, when Secret Manager is used.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_backend: SecretBackend,
        gcp_project_id: Option<String>,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ledger-bridge home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            secret_backend,
            gcp_project_id,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load the config file
    /// - validate that the secrets directory exists
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        if !maybe_relative.is_dir() {
            bail!(
                "The ledger-bridge home directory is missing '{}', run 'ledger-bridge init'",
                maybe_relative.display()
            )
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn secret_backend(&self) -> SecretBackend {
        self.config_file.secret_backend
    }

    pub fn freee(&self) -> &FreeeSettings {
        &self.config_file.freee
    }

    pub fn google(&self) -> &GoogleSettings {
        &self.config_file.google
    }

    pub fn gcs_bucket(&self) -> Option<&str> {
        self.config_file.gcs_bucket.as_deref()
    }

    /// The JSON-lines file recording which settlements have been posted as manual journals.
    pub fn import_log_path(&self) -> PathBuf {
        match &self.config_file.import_log {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => self.root.join(IMPORT_LOG_JSONL),
        }
    }

    /// The GCP project id: `$GCP_PROJECT_ID`, then `config.json`, then the active `gcloud` project.
    pub async fn gcp_project_id(&self) -> Result<String> {
        if let Ok(id) = std::env::var(GCP_PROJECT_ID_ENV) {
            if !id.trim().is_empty() {
                return Ok(id.trim().to_string());
            }
        }
        if let Some(id) = &self.config_file.gcp_project_id {
            return Ok(id.clone());
        }
        let id = secrets::gcloud(&["config", "get-value", "project"])
            .await
            .context("No GCP project id is configured")?;
        if id.is_empty() || id == "(unset)" {
            bail!("No GCP project id is configured; set {GCP_PROJECT_ID_ENV} or gcp_project_id");
        }
        Ok(id)
    }

    /// Builds the secret store selected in `config.json`.
    pub(crate) async fn secret_store(&self) -> Result<Arc<dyn SecretStore>> {
        Ok(match self.secret_backend() {
            SecretBackend::File => Arc::new(FileSecrets::new(&self.secrets)),
            SecretBackend::SecretManager => {
                Arc::new(SecretManager::new(self.gcp_project_id().await?))
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn freee_mut(&mut self) -> &mut FreeeSettings {
        &mut self.config_file.freee
    }

    #[cfg(test)]
    pub(crate) fn google_mut(&mut self) -> &mut GoogleSettings {
        &mut self.config_file.google
    }
}

/// Endpoints and defaults for the freee accounting API.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct FreeeSettings {
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_version: String,
    /// When unset, the first company returned by `/companies` is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
}

impl Default for FreeeSettings {
    fn default() -> Self {
        Self {
            api_base: FREEE_API_BASE.to_string(),
            authorize_url: FREEE_AUTHORIZE_URL.to_string(),
            token_url: FREEE_TOKEN_URL.to_string(),
            api_version: FREEE_API_VERSION.to_string(),
            company_id: None,
        }
    }
}

/// Endpoints for Google Drive and Google Sheets.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct GoogleSettings {
    pub drive_base: String,
    pub sheets_base: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            drive_base: DRIVE_BASE.to_string(),
            sheets_base: SHEETS_BASE.to_string(),
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ledger-bridge",
///   "config_version": 1,
///   "secret_backend": "secret_manager",
///   "gcp_project_id": "my-project",
///   "gcs_bucket": "gs://my-bucket/freee"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ledger-bridge"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    #[serde(default)]
    secret_backend: SecretBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    gcp_project_id: Option<String>,

    #[serde(default)]
    freee: FreeeSettings,

    #[serde(default)]
    google: GoogleSettings,

    /// Default upload destination for exports, e.g. `gs://bucket/prefix`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gcs_bucket: Option<String>,

    /// Path to the journal import log (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    import_log: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            secret_backend: SecretBackend::File,
            gcp_project_id: None,
            freee: FreeeSettings::default(),
            google: GoogleSettings::default(),
            gcs_bucket: None,
            import_log: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let created = Config::create(&home, SecretBackend::File, None)
            .await
            .unwrap();
        assert!(created.secrets().is_dir());
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.secret_backend(), SecretBackend::File);
        assert_eq!(loaded.freee().api_base, FREEE_API_BASE);
        assert_eq!(loaded.google().sheets_base, SHEETS_BASE);
        assert_eq!(loaded.import_log_path(), loaded.root().join(IMPORT_LOG_JSONL));
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("ledger-bridge init"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "ledger-bridge",
            "config_version": 1,
            "freee": { "company_id": 42 }
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.secret_backend, SecretBackend::File);
        assert_eq!(config.freee.company_id, Some(42));
        assert_eq!(config.freee.token_url, FREEE_TOKEN_URL);
        assert_eq!(config.google, GoogleSettings::default());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        utils::write(&path, r#"{"app_name": "other-tool", "config_version": 1}"#)
            .await
            .unwrap();
        let result = ConfigFile::load(&path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("gcp_project_id"));
        assert!(!json.contains("gcs_bucket"));
        assert!(!json.contains("company_id"));
        assert!(json.contains("\"secret_backend\":\"file\""));
    }

    #[tokio::test]
    async fn test_import_log_relative_path() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path(), SecretBackend::File, None)
            .await
            .unwrap();
        config.config_file.import_log = Some(PathBuf::from("logs/imports.jsonl"));
        assert_eq!(
            config.import_log_path(),
            config.root().join("logs/imports.jsonl")
        );
    }
}

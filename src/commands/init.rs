use crate::args::{InitArgs, SecretSetArgs};
use crate::commands::Out;
use crate::{prompt, utils, Config, Result};
use anyhow::{ensure, Context};
use std::path::Path;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`.
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/ledger-bridge`
/// - `args` - The secret backend and, for Secret Manager, the GCP project.
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let _config = Config::create(home, args.secret_backend, args.gcp_project_id.clone())
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Created {} with {} secrets. Next, store the Google OAuth client JSON with \
        'ledger-bridge secret set GOOGLE_WORKSPACE_CREDENTIALS --file <path>' and run \
        'ledger-bridge freee auth' and 'ledger-bridge google auth'.",
        home.display(),
        args.secret_backend
    )
    .into())
}

/// Stores one secret from a file, the command line or an interactive prompt.
pub(super) async fn secret_set(config: &Config, args: &SecretSetArgs) -> Result<Out<()>> {
    let value = match (&args.file, &args.value) {
        (Some(path), _) => utils::read(path).await?,
        (None, Some(value)) => value.clone(),
        (None, None) => prompt::prompt_secret(&format!("Value for {}", args.name))?,
    };
    let value = value.trim();
    ensure!(!value.is_empty(), "The value for {} is empty", args.name);
    config.secret_store().await?.put(&args.name, value).await?;
    Ok(format!("Saved {} ({})", args.name, utils::redact(value, 4)).into())
}

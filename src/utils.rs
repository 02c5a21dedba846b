use crate::Result;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Write a file that only the current user can read (0600 on Unix).
pub(crate) async fn write_private(
    path: impl AsRef<Path>,
    contents: impl AsRef<[u8]>,
) -> Result<()> {
    let path = path.as_ref();
    write(path, contents).await?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Create a directory and all of its parents.
pub(crate) async fn make_dir(p: impl AsRef<Path>) -> Result<()> {
    let p = p.as_ref();
    tokio::fs::create_dir_all(p)
        .await
        .with_context(|| format!("Unable to create directory at {}", p.to_string_lossy()))
}

/// Create the parent directory of `path`, if it has one.
pub(crate) async fn make_parent_dir(path: impl AsRef<Path>) -> Result<()> {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => make_dir(parent).await,
        _ => Ok(()),
    }
}

pub(crate) async fn canonicalize(p: impl AsRef<Path>) -> Result<PathBuf> {
    let p = p.as_ref();
    tokio::fs::canonicalize(p)
        .await
        .with_context(|| format!("Unable to canonicalize the path {}", p.to_string_lossy()))
}

/// Writes each item as one compact JSON object per line.
pub(crate) async fn write_jsonl<T>(path: impl AsRef<Path>, items: &[T]) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();
    let mut contents = String::new();
    for item in items {
        let line = serde_json::to_string(item).context("Unable to serialize a JSON line")?;
        contents.push_str(&line);
        contents.push('\n');
    }
    write(path, contents).await
}

/// Appends one JSON object as a line at the end of `path`, creating the file if needed.
pub(crate) async fn append_jsonl<T>(path: impl AsRef<Path>, item: &T) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();
    let mut line = serde_json::to_string(item).context("Unable to serialize a JSON line")?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Unable to open {} for appending", path.display()))?;
    file.write_all(line.as_bytes())
        .await
        .with_context(|| format!("Unable to append to {}", path.display()))
}

/// Reads a JSON-lines file. Blank lines are ignored.
pub(crate) async fn read_jsonl<T>(path: impl AsRef<Path>) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content = read(path).await?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

/// Shows the first `n` characters of a secret followed by an ellipsis.
pub(crate) fn redact(secret: &str, n: usize) -> String {
    let prefix: String = secret.chars().take(n).collect();
    format!("{prefix}...")
}

//! Uploads to Cloud Storage and loads into BigQuery through the `gsutil` and `bq` command-line
//! tools, which carry the user's own gcloud credentials.

use crate::Result;
use anyhow::{bail, ensure, Context};
use std::path::Path;
use tracing::{debug, info};

/// Runs a command-line tool and returns its trimmed stdout. A non-zero exit is an error carrying
/// stderr.
pub(crate) async fn run_tool(program: &str, args: &[String]) -> Result<String> {
    debug!("Running {program} {}", args.join(" "));
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Unable to run {program}; is it installed and on PATH?"))?;
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Joins a `gs://` prefix and a file name.
pub(crate) fn gcs_uri(prefix: &str, file_name: &str) -> Result<String> {
    ensure!(
        prefix.starts_with("gs://"),
        "'{prefix}' is not a Cloud Storage URI; expected gs://bucket/path"
    );
    Ok(format!("{}/{file_name}", prefix.trim_end_matches('/')))
}

/// `gsutil cp <local> <uri>`
pub(crate) async fn gsutil_cp(local: &Path, uri: &str) -> Result<()> {
    info!("Uploading {} to {uri}", local.display());
    run_tool(
        "gsutil",
        &["cp".to_string(), local.display().to_string(), uri.to_string()],
    )
    .await?;
    Ok(())
}

fn bq_load_args(table: &str, uri: &str) -> Vec<String> {
    [
        "load",
        "--source_format=NEWLINE_DELIMITED_JSON",
        "--autodetect",
        "--replace",
        "--ignore_unknown_values",
        table,
        uri,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Replaces `table` (`dataset.table`) with the newline-delimited JSON at `uri`.
pub(crate) async fn bq_load(table: &str, uri: &str) -> Result<()> {
    info!("Loading {uri} into {table}");
    run_tool("bq", &bq_load_args(table, uri)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcs_uri() {
        assert_eq!(
            gcs_uri("gs://bucket/freee/", "deals.jsonl").unwrap(),
            "gs://bucket/freee/deals.jsonl"
        );
        assert!(gcs_uri("/tmp/out", "deals.jsonl").is_err());
    }

    #[test]
    fn test_bq_load_args() {
        let args = bq_load_args("freee.deals", "gs://b/deals.jsonl");
        assert_eq!(args[0], "load");
        assert!(args.contains(&"--replace".to_string()));
        assert!(args.contains(&"--source_format=NEWLINE_DELIMITED_JSON".to_string()));
        assert_eq!(&args[args.len() - 2..], ["freee.deals", "gs://b/deals.jsonl"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_reports_stderr() {
        let ok = run_tool("sh", &["-c".to_string(), "echo ' hi '".to_string()])
            .await
            .unwrap();
        assert_eq!(ok, "hi");

        let err = run_tool("sh", &["-c".to_string(), "echo boom >&2; exit 3".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let err = run_tool("ledger-bridge-no-such-tool", &[]).await.unwrap_err();
        assert!(err.to_string().contains("is it installed"));
    }
}

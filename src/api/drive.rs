//! Google Drive v3: listing, exporting and downloading files.

use crate::api::ensure_success;
use crate::api::google::{send_json, Google};
use crate::{utils, Result};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PDF_MIME: &str = "application/pdf";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, webViewLink)";

/// The subset of a Drive file resource that the commands show.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) web_view_link: Option<String>,
}

impl DriveFile {
    /// Docs, Sheets, Slides and the like have no binary content and must be exported.
    pub(crate) fn is_google_native(&self) -> bool {
        self.mime_type.starts_with(GOOGLE_APPS_PREFIX)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Hides trashed files unless the query already says something about `trashed`.
pub(crate) fn list_query(query: Option<&str>) -> String {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) if q.contains("trashed") => q.to_string(),
        Some(q) => format!("{q} and trashed = false"),
        None => "trashed = false".to_string(),
    }
}

/// The export format for a Google-native file: the requested MIME type, xlsx for spreadsheets and
/// PDF for everything else. Returns `None` for ordinary files, which are downloaded as-is.
pub(crate) fn export_mime(file: &DriveFile, requested: Option<&str>) -> Option<String> {
    if !file.is_google_native() {
        return None;
    }
    Some(match requested {
        Some(mime) => mime.to_string(),
        None if file.mime_type.contains("spreadsheet") => XLSX_MIME.to_string(),
        None => PDF_MIME.to_string(),
    })
}

impl Google {
    pub(crate) async fn list_files(&mut self, query: &str, limit: u32) -> Result<Vec<DriveFile>> {
        let url = self.drive_url(&["files"])?;
        let request = self
            .authorized(Method::GET, url)
            .await?
            .query(&[
                ("q", query.to_string()),
                ("pageSize", limit.to_string()),
                ("fields", LIST_FIELDS.to_string()),
            ]);
        let list: FileList = send_json(request, "Drive files.list").await?;
        Ok(list.files)
    }

    pub(crate) async fn file_metadata(&mut self, file_id: &str) -> Result<DriveFile> {
        let url = self.drive_url(&["files", file_id])?;
        let request = self
            .authorized(Method::GET, url)
            .await?
            .query(&[("fields", "id, name, mimeType, webViewLink")]);
        send_json(request, "Drive files.get").await
    }

    /// Streams a file to `output`, exporting it when `export_mime` is given. Returns the number of
    /// bytes written.
    pub(crate) async fn download(
        &mut self,
        file_id: &str,
        export_mime: Option<&str>,
        output: &Path,
    ) -> Result<u64> {
        let request = match export_mime {
            Some(mime) => {
                info!("Exporting Google format to {mime}");
                let url = self.drive_url(&["files", file_id, "export"])?;
                self.authorized(Method::GET, url)
                    .await?
                    .query(&[("mimeType", mime)])
            }
            None => {
                info!("Downloading binary content");
                let url = self.drive_url(&["files", file_id])?;
                self.authorized(Method::GET, url)
                    .await?
                    .query(&[("alt", "media")])
            }
        };
        let response = request
            .send()
            .await
            .context("Failed to send the Drive download request")?;
        let mut response = ensure_success(response, "Drive download").await?;

        // Chunks go to a temporary file next to `output`, which replaces `output` only once the
        // whole body has arrived.
        utils::make_parent_dir(output).await?;
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Unable to create a temporary file in {}", dir.display()))?;
        let mut file = tokio::fs::File::from_std(
            temp.as_file()
                .try_clone()
                .context("Unable to open the temporary download file")?,
        );

        let progress = match response.content_length() {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({percent}%)")
                    .context("Invalid progress template")?,
            ),
            None => ProgressBar::new_spinner(),
        };
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed while reading the download")?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Unable to write to {}", output.display()))?;
            written += chunk.len() as u64;
            progress.set_position(written);
        }
        file.flush().await?;
        drop(file);
        temp.persist(output)
            .with_context(|| format!("Unable to move the download to {}", output.display()))?;
        progress.finish_and_clear();
        debug!("Wrote {written} bytes to {}", output.display());
        Ok(written)
    }
}

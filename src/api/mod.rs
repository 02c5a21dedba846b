//! Clients for the remote services: the freee accounting API and Google Drive/Sheets.

mod drive;
mod files;
mod freee;
mod google;
mod oauth;
mod sheets;

use crate::Result;
use anyhow::bail;

// OAuth scopes required for Google access. `spreadsheets` is needed for the write commands and
// `drive.readonly` for listing and downloading Drive files.
pub(crate) const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

pub(crate) use drive::{export_mime, list_query, DriveFile};
pub(crate) use freee::{take_array, Freee, FreeeAuthorization, Params};
pub(crate) use google::Google;
pub(crate) use oauth::TokenProvider;

/// Returns the response if its status is a success, otherwise an error carrying the status and
/// the response body.
async fn ensure_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    bail!("{action} failed with status {status}: {body}")
}

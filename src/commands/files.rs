//! `google files list` and `google files download`.

use crate::api::{export_mime, list_query, DriveFile, Google};
use crate::args::{FileDownloadArgs, FilesListArgs};
use crate::commands::Out;
use crate::Result;
use std::fmt::Write;
use tracing::info;

pub(super) async fn list(google: &mut Google, args: &FilesListArgs) -> Result<Out<Vec<DriveFile>>> {
    let query = list_query(args.query.as_deref());
    info!("Listing Drive files matching: {query}");
    let files = google.list_files(&query, args.limit).await?;
    if files.is_empty() {
        return Ok(Out::new("No files found.", files));
    }

    let mut message = format!("Found {} files:", files.len());
    for file in &files {
        write!(
            message,
            "\n[File] {}\n  ID: {}\n  Type: {}\n  Link: {}\n{}",
            file.name,
            file.id,
            file.mime_type,
            file.web_view_link.as_deref().unwrap_or("-"),
            "-".repeat(40)
        )?;
    }
    Ok(Out::new(message, files))
}

pub(super) async fn download(
    google: &mut Google,
    args: &FileDownloadArgs,
) -> Result<Out<DriveFile>> {
    let file = google.file_metadata(&args.file_id).await?;
    info!("Downloading '{}' ({})", file.name, file.mime_type);
    let mime = export_mime(&file, args.mime_type.as_deref());
    let bytes = google
        .download(&file.id, mime.as_deref(), &args.output)
        .await?;
    Ok(Out::new(
        format!(
            "Downloaded '{}' to {} ({bytes} bytes)",
            file.name,
            args.output.display()
        ),
        file,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_hides_trashed() {
        let env = TestEnv::new().await;
        let mock = env.server().mock(|when, then| {
            when.method(GET)
                .path("/drive/files")
                .query_param("q", "name contains 'report' and trashed = false")
                .query_param("pageSize", "5");
            then.status(200).json_body(json!({
                "files": [{
                    "id": "f1",
                    "name": "report.pdf",
                    "mimeType": "application/pdf",
                    "webViewLink": "https://drive.google.com/file/d/f1/view"
                }]
            }));
        });
        let args = FilesListArgs {
            limit: 5,
            query: Some("name contains 'report'".to_string()),
        };
        let out = list(&mut env.google().await, &args).await.unwrap();
        mock.assert();
        assert!(out.message().starts_with("Found 1 files:\n[File] report.pdf\n  ID: f1"));
        assert!(out.message().contains("Link: https://drive.google.com/file/d/f1/view"));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let env = TestEnv::new().await;
        env.server().mock(|when, then| {
            when.method(GET).path("/drive/files");
            then.status(200).json_body(json!({ "files": [] }));
        });
        let args = FilesListArgs {
            limit: 10,
            query: None,
        };
        let out = list(&mut env.google().await, &args).await.unwrap();
        assert_eq!(out.message(), "No files found.");
    }

    #[tokio::test]
    async fn test_download_exports_spreadsheet_as_xlsx() {
        let env = TestEnv::new().await;
        env.server().mock(|when, then| {
            when.method(GET).path("/drive/files/s1");
            then.status(200).json_body(json!({
                "id": "s1",
                "name": "Budget",
                "mimeType": "application/vnd.google-apps.spreadsheet"
            }));
        });
        let export = env.server().mock(|when, then| {
            when.method(GET).path("/drive/files/s1/export").query_param(
                "mimeType",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            );
            then.status(200).body("xlsx-bytes");
        });
        let output = env.root().join("out/budget.xlsx");
        let args = FileDownloadArgs {
            file_id: "s1".to_string(),
            output: output.clone(),
            mime_type: None,
        };
        let out = download(&mut env.google().await, &args).await.unwrap();
        export.assert();
        assert!(out.message().ends_with("(10 bytes)"));
        assert_eq!(std::fs::read_to_string(output).unwrap(), "xlsx-bytes");
    }
}

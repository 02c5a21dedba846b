//! `google sheets read|write|export`.

use crate::api::Google;
use crate::args::{SheetsExportArgs, SheetsReadArgs, SheetsWriteArgs, WriteAction};
use crate::commands::Out;
use crate::model::{extract_spreadsheet_id, parse_values, render_values, to_grid, ValueInput};
use crate::{cloud, tabular, utils, Result};
use anyhow::{ensure, Context};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::info;

pub(super) async fn read(google: &mut Google, args: &SheetsReadArgs) -> Result<Out<Value>> {
    let id = extract_spreadsheet_id(&args.spreadsheet)?;
    if args.info {
        let info = google.spreadsheet_info(id).await?;
        let mut message = format!("Title: {}\nSheets:", info.properties.title);
        for sheet in &info.sheets {
            write!(
                message,
                "\n  - {} (ID: {})",
                sheet.properties.title, sheet.properties.sheet_id
            )?;
        }
        return Ok(Out::new(message, serde_json::to_value(&info)?));
    }

    let values = google.get_values(id, &args.range).await?;
    if values.is_empty() {
        return Ok("No data found.".into());
    }
    let rendered = render_values(&values, args.format)?;
    Ok(Out::new(rendered, serde_json::to_value(&values)?))
}

pub(super) async fn write(google: &mut Google, args: &SheetsWriteArgs) -> Result<Out<()>> {
    let id = extract_spreadsheet_id(&args.spreadsheet)?;
    let message = match &args.action {
        WriteAction::Update(a) => {
            let values = parse_values(&a.values);
            let result = google
                .update_values(id, &a.range, &values, ValueInput::from_raw_flag(a.raw))
                .await?;
            format!("Updated {} cells.", result.updated_cells)
        }
        WriteAction::Append(a) => {
            let values = parse_values(&a.values);
            let result = google
                .append_values(id, &a.range, &values, ValueInput::from_raw_flag(a.raw))
                .await?;
            format!(
                "Appended {} rows ({}).",
                result.updated_rows, result.updated_range
            )
        }
        WriteAction::Clear(a) => {
            google.clear_values(id, &a.range).await?;
            format!("Cleared {}.", a.range)
        }
        WriteAction::AddSheet(a) => {
            ensure!(!a.title.trim().is_empty(), "--title must not be empty");
            let sheet_id = google.add_sheet(id, &a.title).await?;
            format!("Added sheet '{}' (ID: {sheet_id}).", a.title)
        }
        WriteAction::DeleteSheet(a) => {
            google.delete_sheet(id, a.sheet_id).await?;
            format!("Deleted sheet ID {}.", a.sheet_id)
        }
    };
    Ok(message.into())
}

/// `name=range` or just `name`, which reads the whole sheet.
fn parse_sheet_spec(spec: &str) -> Result<(&str, &str)> {
    let (name, range) = match spec.split_once('=') {
        Some((name, range)) => (name.trim(), range.trim()),
        None => (spec.trim(), spec.trim()),
    };
    ensure!(
        !name.is_empty() && !range.is_empty(),
        "Invalid --sheet '{spec}'; expected name or name=range"
    );
    Ok((name, range))
}

/// A sheet saved by `sheets export`.
#[derive(Debug, Clone, Serialize)]
pub(super) struct ExportedSheet {
    pub(super) name: String,
    pub(super) rows: usize,
    /// `None` when the local file was removed after uploading.
    pub(super) path: Option<PathBuf>,
    pub(super) uri: Option<String>,
}

pub(super) async fn export(
    google: &mut Google,
    args: &SheetsExportArgs,
) -> Result<Out<Vec<ExportedSheet>>> {
    let id = extract_spreadsheet_id(&args.spreadsheet)?;
    let specs = args
        .sheets
        .iter()
        .map(|s| parse_sheet_spec(s))
        .collect::<Result<Vec<_>>>()?;
    utils::make_dir(&args.out_dir).await?;

    let mut exported = Vec::new();
    for (name, range) in specs {
        info!("Downloading {name}");
        let values = google
            .get_values(id, range)
            .await
            .with_context(|| format!("Error downloading {name}"))?;
        if values.is_empty() {
            println!("No data found for {name}.");
            continue;
        }
        let file_name = format!("{name}.csv");
        let path = args.out_dir.join(&file_name);
        tabular::write_rows_csv(&path, &to_grid(&values))?;
        println!("Saved {}", path.display());

        let mut sheet = ExportedSheet {
            name: name.to_string(),
            rows: values.len(),
            path: Some(path.clone()),
            uri: None,
        };
        if let Some(prefix) = &args.upload {
            let uri = cloud::gcs_uri(prefix, &file_name)?;
            cloud::gsutil_cp(&path, &uri).await?;
            println!("Uploaded {uri}");
            if !args.keep {
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("Unable to remove {}", path.display()))?;
                sheet.path = None;
            }
            sheet.uri = Some(uri);
        }
        exported.push(sheet);
    }

    Ok(Out::new(
        format!("Exported {} of {} sheets.", exported.len(), args.sheets.len()),
        exported,
    ))
}

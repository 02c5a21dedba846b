//! Google Sheets v4: metadata, value ranges and sheet (tab) management.

use crate::api::google::{send_json, Google};
use crate::model::ValueInput;
use crate::Result;
use anyhow::Context;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Title and tabs of a spreadsheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SpreadsheetInfo {
    #[serde(default)]
    pub(crate) properties: SpreadsheetProperties,
    #[serde(default)]
    pub(crate) sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SpreadsheetProperties {
    #[serde(default)]
    pub(crate) title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SheetEntry {
    #[serde(default)]
    pub(crate) properties: SheetProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SheetProperties {
    #[serde(default)]
    pub(crate) sheet_id: i64,
    #[serde(default)]
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Result of `values.update`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateResult {
    #[serde(default)]
    pub(crate) updated_range: String,
    #[serde(default)]
    pub(crate) updated_rows: u64,
    #[serde(default)]
    pub(crate) updated_cells: u64,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: UpdateResult,
}

impl Google {
    pub(crate) async fn spreadsheet_info(&mut self, spreadsheet_id: &str) -> Result<SpreadsheetInfo> {
        let url = self.sheets_url(&["spreadsheets", spreadsheet_id])?;
        let request = self
            .authorized(Method::GET, url)
            .await?
            .query(&[("fields", "properties.title,sheets.properties")]);
        send_json(request, "spreadsheets.get").await
    }

    /// Reads formatted cell values. Rows are ragged: trailing empty cells are omitted by the API.
    pub(crate) async fn get_values(
        &mut self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<Value>>> {
        let url = self.sheets_url(&["spreadsheets", spreadsheet_id, "values", range])?;
        let request = self.authorized(Method::GET, url).await?;
        let range: ValueRange = send_json(request, "values.get").await?;
        Ok(range.values)
    }

    pub(crate) async fn update_values(
        &mut self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
        input: ValueInput,
    ) -> Result<UpdateResult> {
        let url = self.sheets_url(&["spreadsheets", spreadsheet_id, "values", range])?;
        let request = self
            .authorized(Method::PUT, url)
            .await?
            .query(&[("valueInputOption", input.to_string())])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": values }));
        send_json(request, "values.update").await
    }

    pub(crate) async fn append_values(
        &mut self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
        input: ValueInput,
    ) -> Result<UpdateResult> {
        let target = format!("{range}:append");
        let url = self.sheets_url(&["spreadsheets", spreadsheet_id, "values", &target])?;
        let request = self
            .authorized(Method::POST, url)
            .await?
            .query(&[("valueInputOption", input.to_string())])
            .json(&json!({ "majorDimension": "ROWS", "values": values }));
        let response: AppendResponse = send_json(request, "values.append").await?;
        Ok(response.updates)
    }

    pub(crate) async fn clear_values(&mut self, spreadsheet_id: &str, range: &str) -> Result<()> {
        let target = format!("{range}:clear");
        let url = self.sheets_url(&["spreadsheets", spreadsheet_id, "values", &target])?;
        let request = self.authorized(Method::POST, url).await?.json(&json!({}));
        let _: Value = send_json(request, "values.clear").await?;
        Ok(())
    }

    /// Adds a tab and returns its sheet id.
    pub(crate) async fn add_sheet(&mut self, spreadsheet_id: &str, title: &str) -> Result<i64> {
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        let reply = self.batch_update(spreadsheet_id, body).await?;
        reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .context("The addSheet reply did not contain a sheetId")
    }

    pub(crate) async fn delete_sheet(&mut self, spreadsheet_id: &str, sheet_id: i64) -> Result<()> {
        let body = json!({ "requests": [{ "deleteSheet": { "sheetId": sheet_id } }] });
        self.batch_update(spreadsheet_id, body).await?;
        Ok(())
    }

    async fn batch_update(&mut self, spreadsheet_id: &str, body: Value) -> Result<Value> {
        let target = format!("{spreadsheet_id}:batchUpdate");
        let url = self.sheets_url(&["spreadsheets", &target])?;
        let request = self.authorized(Method::POST, url).await?.json(&body);
        send_json(request, "spreadsheets.batchUpdate").await
    }
}

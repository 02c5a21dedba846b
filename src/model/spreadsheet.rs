//! Spreadsheet ids, cell values and the output formats of `google sheets read`.

use crate::Result;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How Sheets interprets written values.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ValueInput {
    /// Stored exactly as given.
    Raw,
    /// Parsed as if typed into the UI, so formulas and dates are interpreted.
    #[default]
    UserEntered,
}

serde_plain::derive_display_from_serialize!(ValueInput);
serde_plain::derive_fromstr_from_deserialize!(ValueInput);

impl ValueInput {
    pub(crate) fn from_raw_flag(raw: bool) -> Self {
        if raw {
            ValueInput::Raw
        } else {
            ValueInput::UserEntered
        }
    }
}

/// The output format of `google sheets read`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadFormat {
    Json,
    Csv,
    #[default]
    Table,
}

serde_plain::derive_display_from_serialize!(ReadFormat);
serde_plain::derive_fromstr_from_deserialize!(ReadFormat);

/// Extracts the spreadsheet id from a Google Sheets URL. Anything that is not a Sheets URL is
/// taken to be an id already.
///
/// Accepted URL shapes:
/// - `https://docs.google.com/spreadsheets/d/ID/edit#gid=0`
/// - `https://docs.google.com/spreadsheets/u/0/d/ID`
/// - `https://docs.google.com/spreadsheets/d/ID?foo=bar`
pub(crate) fn extract_spreadsheet_id(input: &str) -> Result<&str> {
    let input = input.trim();
    if input.is_empty() {
        bail!("The spreadsheet id is empty");
    }
    if !input.contains("docs.google.com/spreadsheets") {
        return Ok(input);
    }

    let parts: Vec<&str> = input.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id = parts[i + 1]
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            if !id.is_empty() {
                return Ok(id);
            }
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: \
        https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

/// Parses the `--values` argument of the write commands.
///
/// - A JSON 2-D array is used as-is.
/// - A JSON 1-D array becomes a single row.
/// - Anything else is read as `a,b,c;d,e,f`, rows separated by `;` and cells by `,`.
pub(crate) fn parse_values(input: &str) -> Vec<Vec<Value>> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(input) {
        if matches!(items.first(), Some(Value::Array(_))) {
            return items
                .into_iter()
                .map(|row| match row {
                    Value::Array(cells) => cells,
                    other => vec![other],
                })
                .collect();
        }
        return vec![items];
    }
    input
        .split(';')
        .map(|row| row.split(',').map(|c| Value::String(c.to_string())).collect())
        .collect()
}

/// Text of a cell as shown in CSV and table output. Strings are unquoted and null is empty.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders rows in the requested format. Rows may have different lengths.
pub(crate) fn render_values(values: &[Vec<Value>], format: ReadFormat) -> Result<String> {
    match format {
        ReadFormat::Json => {
            serde_json::to_string_pretty(values).context("Unable to serialize the values")
        }
        ReadFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(Vec::new());
            for row in values {
                writer.write_record(row.iter().map(cell_text))?;
            }
            let bytes = writer.into_inner().context("Unable to flush the CSV writer")?;
            String::from_utf8(bytes).context("The CSV output is not valid UTF-8")
        }
        ReadFormat::Table => Ok(values
            .iter()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>().join(" | "))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Pads ragged rows to the width of the widest row.
pub(crate) fn to_grid(values: &[Vec<Value>]) -> Vec<Vec<String>> {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    values
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = row.iter().map(cell_text).collect();
            cells.resize(width, String::new());
            cells
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_spreadsheet_id_from_urls() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        assert_eq!(
            extract_spreadsheet_id(url).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        let url = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");
        let url = "https://docs.google.com/spreadsheets/u/0/d/XYZ#gid=5";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "XYZ");
    }

    #[test]
    fn test_extract_spreadsheet_id_raw_and_invalid() {
        assert_eq!(extract_spreadsheet_id(" ABC123 ").unwrap(), "ABC123");
        assert!(extract_spreadsheet_id("").is_err());
        assert!(extract_spreadsheet_id("https://docs.google.com/spreadsheets/").is_err());
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            parse_values(r#"[["a", 1], ["b", 2]]"#),
            vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]]
        );
        assert_eq!(parse_values(r#"["x", "y"]"#), vec![vec![json!("x"), json!("y")]]);
        assert_eq!(
            parse_values("a,b;c,d"),
            vec![vec![json!("a"), json!("b")], vec![json!("c"), json!("d")]]
        );
        // A JSON scalar is not an array, so it falls back to the delimited form.
        assert_eq!(parse_values("42"), vec![vec![json!("42")]]);
    }

    #[test]
    fn test_render_values() {
        let values = vec![
            vec![json!("Date"), json!("Amount")],
            vec![json!("2024-01-01"), json!(1200), json!("extra, note")],
        ];
        assert_eq!(
            render_values(&values, ReadFormat::Table).unwrap(),
            "Date | Amount\n2024-01-01 | 1200 | extra, note"
        );
        assert_eq!(
            render_values(&values, ReadFormat::Csv).unwrap(),
            "Date,Amount\n2024-01-01,1200,\"extra, note\"\n"
        );
        let json = render_values(&values, ReadFormat::Json).unwrap();
        assert!(json.starts_with("[\n  [\n    \"Date\""));
    }

    #[test]
    fn test_to_grid_pads_rows() {
        let grid = to_grid(&[vec![json!("a")], vec![json!("b"), json!(null), json!("c")]]);
        assert_eq!(grid[0], vec!["a", "", ""]);
        assert_eq!(grid[1], vec!["b", "", "c"]);
    }

    #[test]
    fn test_value_input_display() {
        assert_eq!(ValueInput::Raw.to_string(), "RAW");
        assert_eq!(ValueInput::from_raw_flag(false).to_string(), "USER_ENTERED");
    }
}

//! Reading and writing the tabular files exchanged with accounting tools: xlsx workbooks and CSV in
//! UTF-8 or Shift_JIS.

use crate::Result;
use anyhow::{anyhow, bail, Context};
use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::SHIFT_JIS;
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// A header row and the data rows below it. Data rows may be shorter or longer than the header.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub(crate) struct Table {
    pub(crate) headers: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

/// Reads the first worksheet of a workbook, or a CSV file, depending on the extension.
pub(crate) fn read_table(path: &Path) -> Result<Table> {
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path),
        _ => read_csv(path),
    }
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Unable to open the workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("The workbook {} has no worksheets", path.display()))?
        .with_context(|| format!("Unable to read the first worksheet of {}", path.display()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());
    let headers = rows.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = rows.filter(|r| r.iter().any(|c| !c.is_empty())).collect();
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(Table { headers, rows })
}

/// Formats a workbook cell the way it reads in the sheet. Whole numbers have no decimal point and
/// dates are `YYYY-MM-DD HH:MM:SS`.
pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    parse_csv(&decode(&bytes))
        .with_context(|| format!("Unable to parse the CSV file {}", path.display()))
}

/// Decodes UTF-8 (with or without a BOM), falling back to Shift_JIS.
pub(crate) fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                warn!("Some bytes could not be decoded as Shift_JIS and were replaced");
            }
            text.into_owned()
        }
    }
}

pub(crate) fn parse_csv(text: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

/// Serializes records to CSV text. The header comes from the field names of `T`.
pub(crate) fn to_csv<T>(records: &[T]) -> Result<String>
where
    T: Serialize,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer.into_inner().context("Unable to flush the CSV writer")?;
    String::from_utf8(bytes).context("The CSV output is not valid UTF-8")
}

/// Writes rows of plain strings as UTF-8 CSV. Rows may have different lengths.
pub(crate) fn write_rows_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Unable to create {}", path.display()))?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes records as Shift_JIS CSV, the encoding freee's import screens expect.
///
/// Text that Shift_JIS cannot represent is an error naming the first offending cell. Nothing is
/// written in that case.
pub(crate) fn write_sjis_csv<T>(path: &Path, records: &[T]) -> Result<()>
where
    T: Serialize,
{
    let text = to_csv(records)?;
    let (bytes, _, unmappable) = SHIFT_JIS.encode(&text);
    if unmappable {
        bail!(
            "Unable to write {} as Shift_JIS: {}",
            path.display(),
            first_unmappable(&text)
        );
    }
    std::fs::write(path, bytes).with_context(|| format!("Unable to write {}", path.display()))
}

/// Describes the first cell of `text` (CSV) that Shift_JIS cannot represent.
fn first_unmappable(text: &str) -> String {
    let unmappable = |s: &str| SHIFT_JIS.encode(s).2;
    let Ok(table) = parse_csv(text) else {
        return "the text contains characters it cannot represent".to_string();
    };
    if let Some(header) = table.headers.iter().find(|h| unmappable(h)) {
        return format!("the header '{header}' contains characters it cannot represent");
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if unmappable(cell) {
                let column = table.headers.get(c).map(String::as_str).unwrap_or("?");
                return format!(
                    "row {}, column '{column}' has characters it cannot represent: '{cell}'",
                    r + 1
                );
            }
        }
    }
    "the text contains characters it cannot represent".to_string()
}

/// Converts a CSV file (UTF-8 or Shift_JIS) into a single-sheet xlsx workbook. Cells that parse as
/// numbers are written as numbers.
pub(crate) fn csv_to_xlsx(csv_path: &Path, xlsx_path: &Path) -> Result<()> {
    let table = read_csv(csv_path)?;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let all_rows = std::iter::once(&table.headers).chain(table.rows.iter());
    for (r, row) in all_rows.enumerate() {
        let r = u32::try_from(r).context("Too many rows for a worksheet")?;
        for (c, cell) in row.iter().enumerate() {
            let c = u16::try_from(c).context("Too many columns for a worksheet")?;
            match cell.parse::<f64>() {
                Ok(n) if r > 0 && n.is_finite() => sheet.write_number(r, c, n)?,
                _ => sheet.write_string(r, c, cell)?,
            };
        }
    }
    workbook
        .save(xlsx_path)
        .with_context(|| format!("Unable to write {}", xlsx_path.display()))?;
    Ok(())
}

//! `freee mf ...`: Money Forward journal exports into freee.

use crate::api::{take_array, Freee};
use crate::args::{MfConvertArgs, MfImportArgs, MfInspectArgs, MfXlsxArgs};
use crate::commands::{pretty, typed, Out};
use crate::model::{classify, Converted, ImportMetadata, Master, MfColumns, Tax, Walletable, Wallet};
use crate::tabular::{self, Table};
use crate::{utils, Result};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INSPECT_ROWS: usize = 5;
const IMPORT_DELAY: Duration = Duration::from_millis(100);
const IMPORT_PREFIXES: &[&str] = &["import_deals_", "import_journals_"];

/// The CSV files written for one export.
#[derive(Debug, Clone, Default, Serialize)]
pub(super) struct ConvertedFile {
    pub(super) source: PathBuf,
    pub(super) deals: usize,
    pub(super) journals: usize,
    pub(super) written: Vec<PathBuf>,
}

/// The file name up to its first dot: `journal.2024.xlsx` becomes `journal`.
fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name
            .to_string_lossy()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string(),
        None => "export".to_string(),
    }
}

async fn load_wallets(path: &Path) -> Result<Vec<Wallet>> {
    if !path.is_file() {
        warn!(
            "{} not found. Proceeding without wallet mapping; every row becomes an unsettled deal.",
            path.display()
        );
        return Ok(Vec::new());
    }
    utils::deserialize(path).await
}

pub(super) async fn convert(args: &MfConvertArgs) -> Result<Out<Vec<ConvertedFile>>> {
    let wallets = load_wallets(&args.wallets).await?;
    utils::make_dir(&args.out_dir).await?;

    let mut results = Vec::new();
    for file in &args.files {
        info!("Processing {}", file.display());
        let table = tabular::read_table(file)?;
        let columns = MfColumns::locate(&table.headers)
            .with_context(|| format!("Unable to convert {}", file.display()))?;

        let mut deals = Vec::new();
        let mut journals = Vec::new();
        for (i, row) in table.rows.iter().enumerate() {
            let entry = match columns.entry(row) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping row {}: {e}", i + 1);
                    continue;
                }
            };
            match classify(&entry, &wallets) {
                Converted::Deal(deal) => deals.push(deal),
                Converted::Journal(journal) => journals.push(journal),
            }
        }

        let base = base_name(file);
        let mut result = ConvertedFile {
            source: file.clone(),
            deals: deals.len(),
            journals: journals.len(),
            written: Vec::new(),
        };
        if !deals.is_empty() {
            let path = args.out_dir.join(format!("import_deals_{base}.csv"));
            tabular::write_sjis_csv(&path, &deals)?;
            println!("Saved {} ({} rows)", path.display(), deals.len());
            result.written.push(path);
        }
        if !journals.is_empty() {
            let path = args.out_dir.join(format!("import_journals_{base}.csv"));
            tabular::write_sjis_csv(&path, &journals)?;
            println!("Saved {} ({} rows)", path.display(), journals.len());
            result.written.push(path);
        }
        results.push(result);
    }

    let files: usize = results.iter().map(|r| r.written.len()).sum();
    Ok(Out::new(format!("Wrote {files} import files."), results))
}

/// Outcome counts of `mf import`.
#[derive(Debug, Clone, Copy, Default, Serialize, Eq, PartialEq)]
pub(super) struct ImportCounts {
    pub(super) created: usize,
    pub(super) skipped: usize,
    pub(super) failed: usize,
}

async fn load_metadata(freee: &Freee) -> Result<ImportMetadata> {
    info!("Loading metadata");
    let company_id = freee.company_id().await?;
    let params = [("company_id", company_id.to_string())];
    let account_items: Vec<Master> = typed(
        take_array(freee.get("account_items", &params).await?, "account_items"),
        "account item",
    )?;
    let taxes: Vec<Tax> = typed(
        take_array(
            freee
                .get(&format!("taxes/companies/{company_id}"), &[])
                .await?,
            "taxes",
        ),
        "tax",
    )?;
    let partners: Vec<Master> = typed(freee.paginate("partners", "partners", &[]).await?, "partner")?;
    let walletables: Vec<Walletable> = typed(
        take_array(freee.get("walletables", &params).await?, "walletables"),
        "walletable",
    )?;
    Ok(ImportMetadata::new(
        &account_items,
        &taxes,
        &partners,
        &walletables,
    ))
}

pub(super) async fn import(freee: &Freee, args: &MfImportArgs) -> Result<Out<ImportCounts>> {
    let metadata = load_metadata(freee).await?;
    let company_id = freee.company_id().await?;
    let mut counts = ImportCounts::default();

    for file in &args.files {
        let table = tabular::read_table(file)?;
        let columns = MfColumns::locate(&table.headers)?;
        println!(
            "Processing {} rows from {}...",
            table.rows.len(),
            file.display()
        );
        for (i, row) in table.rows.iter().enumerate() {
            let entry = match columns.entry(row) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping Row {i}: {e}");
                    counts.skipped += 1;
                    continue;
                }
            };
            let body = match metadata.deal_request(&entry, company_id) {
                Ok(body) => body,
                Err(skip) => {
                    println!("Skipping Row {i}: {skip}");
                    counts.skipped += 1;
                    continue;
                }
            };
            if args.dry_run {
                println!("Row {i}: [Dry Run] {}", pretty(&body));
                continue;
            }
            match freee.post_json("deals", &body).await {
                Ok(_) => {
                    println!("Row {i}: Created Deal {} {}", entry.date, entry.amount);
                    counts.created += 1;
                }
                Err(e) => {
                    error!("Row {i}: Failed {e:#}");
                    counts.failed += 1;
                }
            }
            tokio::time::sleep(IMPORT_DELAY).await;
        }
    }

    Ok(Out::new(
        format!(
            "Created {}, skipped {}, failed {}.",
            counts.created, counts.skipped, counts.failed
        ),
        counts,
    ))
}

pub(super) fn inspect(args: &MfInspectArgs) -> Result<Out<Table>> {
    let table = tabular::read_table(&args.file)?;
    let mut message = format!("Columns: {:?}\nSample Data:", table.headers);
    for row in table.rows.iter().take(INSPECT_ROWS) {
        write!(message, "\n{}", row.join(" | "))?;
    }
    let sample = Table {
        headers: table.headers.clone(),
        rows: table.rows.into_iter().take(INSPECT_ROWS).collect(),
    };
    Ok(Out::new(message, sample))
}

fn is_import_csv(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".csv") && IMPORT_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub(super) fn xlsx(args: &MfXlsxArgs) -> Result<Out<Vec<PathBuf>>> {
    let entries = std::fs::read_dir(&args.dir)
        .with_context(|| format!("Unable to read the directory {}", args.dir.display()))?;
    let mut csv_files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_import_csv(&path) {
            csv_files.push(path);
        }
    }
    csv_files.sort();

    let mut written = Vec::new();
    for csv_file in &csv_files {
        let xlsx_path = csv_file.with_extension("xlsx");
        info!("Converting {} to XLSX", csv_file.display());
        match tabular::csv_to_xlsx(csv_file, &xlsx_path) {
            Ok(()) => {
                println!("Saved {}", xlsx_path.display());
                written.push(xlsx_path);
            }
            Err(e) => error!("Error converting {}: {e:#}", csv_file.display()),
        }
    }
    if csv_files.is_empty() {
        return Ok(format!("No import CSVs found in {}.", args.dir.display()).into());
    }
    Ok(Out::new(
        format!("Converted {} of {} files.", written.len(), csv_files.len()),
        written,
    ))
}

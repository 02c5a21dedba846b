//! `freee journals post`: posts settlement manual journals and records them in the import log.

use crate::api::Freee;
use crate::args::JournalsPostArgs;
use crate::commands::Out;
use crate::model::{pending, ImportLogEntry, SettlementPayload};
use crate::{prompt, utils, Config, Result};
use tracing::{error, info, warn};

pub(super) async fn post(
    freee: &Freee,
    config: &Config,
    args: &JournalsPostArgs,
) -> Result<Out<Vec<ImportLogEntry>>> {
    let payloads: Vec<SettlementPayload> = utils::read_jsonl(&args.input).await?;
    let log_path = config.import_log_path();
    let log: Vec<ImportLogEntry> = if log_path.is_file() {
        utils::read_jsonl(&log_path).await?
    } else {
        Vec::new()
    };
    let rows = pending(payloads, &log, args.ignore_log, args.settlement_id);
    if rows.is_empty() {
        return Ok("No settlements to process.".into());
    }
    println!("Found {} settlements.", rows.len());

    let company_id = freee.company_id().await?;
    let mut posted = Vec::new();
    for row in &rows {
        println!("\n{}", row.summary());
        if args.dry_run {
            println!("  [Dry Run]");
            continue;
        }
        if !prompt::confirm(args.yes, "Post?")? {
            continue;
        }
        let Some(body) = row.request_body(company_id) else {
            warn!("No valid details to post for settlement {}", row.settlement_id);
            continue;
        };
        let created = match freee.post_json("manual_journals", &body).await {
            Ok(created) => created,
            Err(e) => {
                error!("Failed to post settlement {}: {e:#}", row.settlement_id);
                continue;
            }
        };
        let entry = match created["manual_journal"]["id"].as_i64() {
            Some(journal_id) => {
                println!("Success! ID: {journal_id}");
                ImportLogEntry::posted(row.settlement_id, journal_id)
            }
            None => {
                warn!(
                    "Settlement {} was posted but the response has no journal id: {created}",
                    row.settlement_id
                );
                ImportLogEntry::posted_without_id(row.settlement_id)
            }
        };
        utils::make_parent_dir(&log_path).await?;
        utils::append_jsonl(&log_path, &entry).await?;
        info!("Logged settlement {} to {}", row.settlement_id, log_path.display());
        posted.push(entry);
    }

    Ok(Out::new(
        format!("Posted {} of {} settlements.", posted.len(), rows.len()),
        posted,
    ))
}

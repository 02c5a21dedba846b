//! `freee masters` and `freee receipts`.

use crate::api::{take_array, Freee};
use crate::args::{MasterCreateArgs, MastersListArgs, ReceiptUploadArgs, ReceiptsListArgs};
use crate::commands::{pretty, typed, Out};
use crate::model::{Master, Receipt};
use crate::{prompt, Result};
use anyhow::ensure;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::info;

const RECEIPTS_LIMIT: u32 = 100;

pub(super) async fn list(freee: &Freee, args: &MastersListArgs) -> Result<Out<Vec<Master>>> {
    let resource = args.kind.to_string();
    info!("Fetching {resource}");
    let params = [("company_id", freee.company_id().await?.to_string())];
    let items: Vec<Master> = typed(
        take_array(freee.get(&resource, &params).await?, &resource),
        &resource,
    )?;

    let mut message = format!("--- {resource} (Found: {}) ---", items.len());
    for item in &items {
        write!(message, "\nID: {} | Name: {}", item.id, item.name)?;
    }
    Ok(Out::new(message, items))
}

pub(super) async fn create(freee: &Freee, args: &MasterCreateArgs) -> Result<Out<Value>> {
    ensure!(!args.name.trim().is_empty(), "--name must not be empty");
    let mut body = json!({
        "company_id": freee.company_id().await?,
        "name": args.name.trim(),
    });
    if let Some(code) = args.code.as_deref().filter(|c| !c.is_empty()) {
        body["code"] = json!(code);
    }
    println!("Creating {}: {}", args.kind.singular(), pretty(&body));
    if !prompt::confirm(args.yes, "Are you sure you want to create this item?")? {
        return Ok("Cancelled.".into());
    }
    let created = freee.post_json(&args.kind.to_string(), &body).await?;
    Ok(Out::new(
        format!("Success! Created.\n{}", pretty(&created)),
        created,
    ))
}

pub(super) async fn list_receipts(
    freee: &Freee,
    args: &ReceiptsListArgs,
) -> Result<Out<Vec<Receipt>>> {
    let mut params = vec![
        ("company_id", freee.company_id().await?.to_string()),
        ("limit", RECEIPTS_LIMIT.to_string()),
    ];
    if let Some(start) = &args.start_date {
        params.push(("start_date", start.clone()));
    }
    if let Some(end) = &args.end_date {
        params.push(("end_date", end.clone()));
    }
    let receipts: Vec<Receipt> = typed(
        take_array(freee.get("receipts", &params).await?, "receipts"),
        "receipt",
    )?;

    let mut message = format!("--- Receipts (Found: {}) ---", receipts.len());
    for receipt in &receipts {
        write!(message, "\n{receipt}")?;
    }
    Ok(Out::new(message, receipts))
}

pub(super) async fn upload_receipt(freee: &Freee, args: &ReceiptUploadArgs) -> Result<Out<Value>> {
    ensure!(
        args.file.is_file(),
        "File not found: {}",
        args.file.display()
    );
    info!("Uploading {}", args.file.display());
    let created = freee.post_receipt(&args.file).await?;
    Ok(Out::new(format!("Success!\n{}", pretty(&created)), created))
}

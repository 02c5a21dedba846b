//! `freee trial-balance` and `freee account-map`.

use crate::api::{take_array, Freee};
use crate::args::{AccountMapArgs, TrialBalanceArgs};
use crate::commands::{typed, Out};
use crate::model::{build_account_map, AccountMapRow, Master, Tax, TaxDefaults, TrialBalanceLine};
use crate::{tabular, utils, Result};
use chrono::Utc;
use serde_json::Value;
use std::fmt::Write;
use tracing::info;

pub(super) async fn trial_balance(
    freee: &Freee,
    args: &TrialBalanceArgs,
) -> Result<Out<Vec<TrialBalanceLine>>> {
    let year = args.fiscal_year;
    info!("Fetching Trial Balance for FY{year}");
    let params = [
        ("company_id", freee.company_id().await?.to_string()),
        ("fiscal_year", year.to_string()),
    ];
    let mut report = freee.get("reports/trial_balance", &params).await?;
    let trial_balance = report
        .get_mut("trial_balance")
        .map(Value::take)
        .unwrap_or_default();
    let balances = take_array(trial_balance, "balances");
    let lines: Vec<TrialBalanceLine> = typed(balances, "trial balance")?;

    let mut message = format!("--- Trial Balance FY{year} ---");
    for line in &lines {
        write!(message, "\n{line}")?;
    }
    Ok(Out::new(message, lines))
}

pub(super) async fn account_map(
    freee: &Freee,
    args: &AccountMapArgs,
) -> Result<Out<Vec<AccountMapRow>>> {
    let company_id = freee.company_id().await?;
    info!("Fetching account items");
    let items: Vec<Master> = typed(
        take_array(
            freee
                .get("account_items", &[("company_id", company_id.to_string())])
                .await?,
            "account_items",
        ),
        "account item",
    )?;
    info!("Fetching tax codes");
    let taxes: Vec<Tax> = typed(
        take_array(
            freee
                .get(&format!("taxes/companies/{company_id}"), &[])
                .await?,
            "taxes",
        ),
        "tax",
    )?;

    let rows = build_account_map(&items, &TaxDefaults::from_taxes(&taxes), Utc::now());
    utils::make_parent_dir(&args.out).await?;
    utils::write(&args.out, tabular::to_csv(&rows)?).await?;
    Ok(Out::new(
        format!(
            "Wrote {} account mappings to {}",
            rows.len(),
            args.out.display()
        ),
        rows,
    ))
}

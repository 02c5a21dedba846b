//! `freee deals` and `freee invoices`.

use crate::api::{take_array, Freee};
use crate::args::{DealCreateArgs, DealsListArgs, InvoiceCreateArgs};
use crate::commands::{pretty, typed, Out};
use crate::model::{Deal, Yen};
use crate::{prompt, Result};
use anyhow::Context;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::info;

/// Invoices assume the standard 10% consumption tax.
fn vat_rate() -> Decimal {
    Decimal::new(1, 1)
}

pub(super) async fn list(freee: &Freee, args: &DealsListArgs) -> Result<Out<Vec<Deal>>> {
    let mut params = vec![
        ("company_id", freee.company_id().await?.to_string()),
        ("limit", args.limit.to_string()),
    ];
    if let Some(start) = &args.start_date {
        params.push(("start_issue_date", start.clone()));
    }
    if let Some(end) = &args.end_date {
        params.push(("end_issue_date", end.clone()));
    }
    let deals: Vec<Deal> = typed(take_array(freee.get("deals", &params).await?, "deals"), "deal")?;

    let mut message = format!("--- Deals (Found: {}) ---", deals.len());
    for deal in &deals {
        write!(message, "\n{deal}")?;
    }
    Ok(Out::new(message, deals))
}

pub(super) fn deal_body(args: &DealCreateArgs, company_id: i64) -> Value {
    let mut body = json!({
        "company_id": company_id,
        "issue_date": args.date,
        "type": args.deal_type,
        "details": [{
            "tax_code": args.tax_code,
            "account_item_id": args.account_item_id,
            "amount": args.amount,
            "description": args.description,
        }],
    });
    if let Some(partner_id) = args.partner_id {
        body["partner_id"] = json!(partner_id);
    }
    body
}

pub(super) async fn create(freee: &Freee, args: &DealCreateArgs) -> Result<Out<Value>> {
    let body = deal_body(args, freee.company_id().await?);
    println!("Creating Deal: {}", pretty(&body));
    if !prompt::confirm(args.yes, "Are you sure you want to create this deal?")? {
        return Ok("Cancelled.".into());
    }
    let created = freee.post_json("deals", &body).await?;
    Ok(Out::new(
        format!("Success! Deal created.\n{}", pretty(&created)),
        created,
    ))
}

pub(super) fn invoice_body(args: &InvoiceCreateArgs, company_id: i64) -> Result<Value> {
    let vat = Yen::from(args.amount)
        .floor_mul(vat_rate())
        .to_i64()
        .context("The VAT amount is out of range")?;
    let mut line = json!({
        "order": 0,
        "type": "normal",
        "quantity": 1,
        "unit_price": args.amount,
        "vat": vat,
        "description": args.description,
        "tax_code": args.tax_code,
    });
    match args.account_item_id {
        Some(id) => line["account_item_id"] = json!(id),
        None => info!("No --account-item-id given; freee will use the partner's default"),
    }
    Ok(json!({
        "company_id": company_id,
        "issue_date": args.issue_date,
        "due_date": args.due_date,
        "partner_id": args.partner_id,
        "invoice_contents": [line],
    }))
}

pub(super) async fn create_invoice(freee: &Freee, args: &InvoiceCreateArgs) -> Result<Out<Value>> {
    let body = invoice_body(args, freee.company_id().await?)?;
    println!("Creating Invoice: {}", pretty(&body));
    if !prompt::confirm(args.yes, "Are you sure you want to create this invoice?")? {
        return Ok("Cancelled.".into());
    }
    let created = freee.post_json("invoices", &body).await?;
    Ok(Out::new(
        format!("Success! Invoice created.\n{}", pretty(&created)),
        created,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DealType;
    use crate::test::{TestEnv, COMPANY_ID};
    use httpmock::prelude::*;

    fn create_args() -> DealCreateArgs {
        DealCreateArgs {
            date: "2024-05-01".to_string(),
            deal_type: DealType::Expense,
            amount: 1100,
            account_item_id: 10,
            tax_code: 108,
            partner_id: None,
            description: Some("USB cable".to_string()),
            yes: true,
        }
    }

    fn invoice_args(amount: i64) -> InvoiceCreateArgs {
        InvoiceCreateArgs {
            partner_id: 7,
            issue_date: "2024-05-01".to_string(),
            due_date: "2024-05-31".to_string(),
            amount,
            description: "Consulting".to_string(),
            account_item_id: None,
            tax_code: 129,
            yes: true,
        }
    }

    #[test]
    fn test_deal_body_partner_is_optional() {
        let mut args = create_args();
        let body = deal_body(&args, 5);
        assert!(body.get("partner_id").is_none());
        assert_eq!(body["type"], "expense");
        assert_eq!(body["details"][0]["amount"], 1100);

        args.partner_id = Some(3);
        assert_eq!(deal_body(&args, 5)["partner_id"], 3);
    }

    #[test]
    fn test_invoice_vat_rounds_down() {
        let body = invoice_body(&invoice_args(1999), 5).unwrap();
        let line = &body["invoice_contents"][0];
        assert_eq!(line["vat"], 199);
        assert_eq!(line["unit_price"], 1999);
        assert!(line.get("account_item_id").is_none());
        assert_eq!(body["partner_id"], 7);
    }

    #[tokio::test]
    async fn test_list_deals() {
        let env = TestEnv::new().await;
        let mock = env.server().mock(|when, then| {
            when.method(GET)
                .path("/freee/deals")
                .header("authorization", "Bearer freee-access")
                .header("x-api-version", "2020-06-15")
                .query_param("company_id", COMPANY_ID.to_string())
                .query_param("limit", "20")
                .query_param("start_issue_date", "2024-01-01");
            then.status(200).json_body(json!({
                "deals": [{
                    "id": 11,
                    "issue_date": "2024-01-05",
                    "amount": 5500,
                    "type": "expense",
                    "details": [{
                        "account_item_name": "消耗品費",
                        "tax_code_name": "課対仕入10%",
                        "amount": 5500
                    }]
                }]
            }));
        });
        let args = DealsListArgs {
            limit: 20,
            start_date: Some("2024-01-01".to_string()),
            end_date: None,
        };
        let out = list(&env.freee().await, &args).await.unwrap();
        mock.assert();
        assert!(out.message().starts_with("--- Deals (Found: 1) ---"));
        assert!(out.message().contains("ID: 11 | Date: 2024-01-05 | Amount: 5,500 | Type: expense"));
        assert!(out.message().contains("  - 消耗品費 / 課対仕入10% : 5,500"));
    }

    #[tokio::test]
    async fn test_create_deal_posts() {
        let env = TestEnv::new().await;
        let mock = env.server().mock(|when, then| {
            when.method(POST)
                .path("/freee/deals")
                .json_body_partial(r#"{"company_id": 1, "type": "expense", "issue_date": "2024-05-01"}"#);
            then.status(201).json_body(json!({ "deal": { "id": 99 } }));
        });
        let out = create(&env.freee().await, &create_args()).await.unwrap();
        mock.assert();
        assert!(out.message().starts_with("Success! Deal created."));
        assert_eq!(out.structure().unwrap()["deal"]["id"], 99);
    }

    #[tokio::test]
    async fn test_create_invoice_reports_failure() {
        let env = TestEnv::new().await;
        env.server().mock(|when, then| {
            when.method(POST).path("/freee/invoices");
            then.status(400).body("{\"errors\":[\"partner_id is invalid\"]}");
        });
        let err = create_invoice(&env.freee().await, &invoice_args(1000))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("partner_id is invalid"));
    }
}

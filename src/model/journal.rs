//! Settlement manual journals and the local log of those already posted.

use crate::model::Yen;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use tracing::warn;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EntrySide {
    Debit,
    Credit,
}

serde_plain::derive_display_from_serialize!(EntrySide);

/// One manual-journal line. Fields other than the ones named here are passed to freee unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JournalLine {
    pub(crate) entry_side: EntrySide,
    pub(crate) amount: Yen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) account_item_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

impl Display for JournalLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let side = self.entry_side.to_string().to_uppercase();
        let account = self
            .account_item_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "{side:<6} {:>10} : {} (AcctID: {account})",
            self.amount,
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// A settlement ready to be posted as one manual journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SettlementPayload {
    pub(crate) settlement_id: i64,
    pub(crate) issue_date: String,
    #[serde(default)]
    pub(crate) details: Vec<JournalLine>,
}

impl SettlementPayload {
    pub(crate) fn total(&self, side: EntrySide) -> Yen {
        self.details
            .iter()
            .filter(|d| d.entry_side == side)
            .map(|d| d.amount)
            .sum()
    }

    /// Line count, totals and every line, as shown before posting.
    pub(crate) fn summary(&self) -> String {
        let debit = self.total(EntrySide::Debit);
        let credit = self.total(EntrySide::Credit);
        let diff = Yen::new(debit.value() - credit.value());
        let mut lines = vec![
            format!("--- Settlement {} ({}) ---", self.settlement_id, self.issue_date),
            format!("  Lines: {}", self.details.len()),
            format!("  Debit: {debit} | Credit: {credit} | Diff: {diff}"),
        ];
        lines.extend(self.details.iter().map(|d| format!("   {d}")));
        lines.join("\n")
    }

    /// Lines that can be posted. A line without an account item is dropped with a warning.
    pub(crate) fn valid_details(&self) -> Vec<&JournalLine> {
        self.details
            .iter()
            .filter(|d| {
                if d.account_item_id.is_none() {
                    warn!(
                        "Line missing Account ID (Amount: {}, Desc: {}). Dropping.",
                        d.amount,
                        d.description.as_deref().unwrap_or_default()
                    );
                    return false;
                }
                true
            })
            .collect()
    }

    /// The `POST /manual_journals` body, or `None` when no line survives validation.
    pub(crate) fn request_body(&self, company_id: i64) -> Option<Value> {
        let details = self.valid_details();
        if details.is_empty() {
            return None;
        }
        Some(json!({
            "company_id": company_id,
            "issue_date": self.issue_date,
            "details": details,
            "receipt_ids": [],
        }))
    }
}

/// A row of the import log.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct ImportLogEntry {
    pub(crate) settlement_id: i64,
    pub(crate) imported_at: DateTime<Utc>,
    pub(crate) freee_deal_id: i64,
    pub(crate) freee_deal_status: String,
}

impl ImportLogEntry {
    pub(crate) fn posted(settlement_id: i64, journal_id: i64) -> Self {
        Self {
            settlement_id,
            imported_at: Utc::now(),
            freee_deal_id: journal_id,
            freee_deal_status: "posted".to_string(),
        }
    }

    /// Records a post that succeeded but whose response carried no journal id. The id is 0.
    pub(crate) fn posted_without_id(settlement_id: i64) -> Self {
        Self {
            freee_deal_status: "posted_without_id".to_string(),
            ..Self::posted(settlement_id, 0)
        }
    }
}

/// Selects the settlements to post, oldest first.
pub(crate) fn pending(
    mut payloads: Vec<SettlementPayload>,
    log: &[ImportLogEntry],
    ignore_log: bool,
    settlement_id: Option<i64>,
) -> Vec<SettlementPayload> {
    let posted: HashSet<i64> = log.iter().map(|e| e.settlement_id).collect();
    payloads.retain(|p| {
        settlement_id.map_or(true, |id| p.settlement_id == id)
            && (ignore_log || !posted.contains(&p.settlement_id))
    });
    payloads.sort_by(|a, b| a.issue_date.cmp(&b.issue_date));
    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: i64, date: &str) -> SettlementPayload {
        serde_json::from_value(json!({
            "settlement_id": id,
            "issue_date": date,
            "details": [
                { "entry_side": "debit", "amount": 1200, "account_item_id": 10,
                  "tax_code": 2, "description": "net" },
                { "entry_side": "debit", "amount": 300, "description": "unmapped" },
                { "entry_side": "credit", "amount": 1500, "account_item_id": 20,
                  "tax_code": 129, "description": "sales" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_summary() {
        let p = payload(5, "2024-05-01");
        assert_eq!(
            p.summary(),
            "--- Settlement 5 (2024-05-01) ---\n\
            \x20 Lines: 3\n\
            \x20 Debit: 1,500 | Credit: 1,500 | Diff: 0\n\
            \x20  DEBIT       1,200 : net (AcctID: 10)\n\
            \x20  DEBIT         300 : unmapped (AcctID: None)\n\
            \x20  CREDIT      1,500 : sales (AcctID: 20)"
        );
    }

    #[test]
    fn test_request_body_drops_lines_without_account() {
        let body = payload(5, "2024-05-01").request_body(99).unwrap();
        assert_eq!(body["company_id"], 99);
        assert_eq!(body["receipt_ids"], json!([]));
        let details = body["details"].as_array().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["tax_code"], 2);
        assert_eq!(details[1]["entry_side"], "credit");
        assert_eq!(details[1]["amount"], 1500);
    }

    #[test]
    fn test_request_body_none_when_all_dropped() {
        let p: SettlementPayload = serde_json::from_value(json!({
            "settlement_id": 1,
            "issue_date": "2024-01-01",
            "details": [{ "entry_side": "debit", "amount": 1 }]
        }))
        .unwrap();
        assert!(p.request_body(1).is_none());
    }

    #[test]
    fn test_pending_filters_and_sorts() {
        let payloads = vec![
            payload(3, "2024-03-01"),
            payload(1, "2024-01-01"),
            payload(2, "2024-02-01"),
        ];
        let log = vec![ImportLogEntry::posted(2, 900)];

        let ids = |v: Vec<SettlementPayload>| v.iter().map(|p| p.settlement_id).collect::<Vec<_>>();
        assert_eq!(ids(pending(payloads.clone(), &log, false, None)), vec![1, 3]);
        assert_eq!(ids(pending(payloads.clone(), &log, true, None)), vec![1, 2, 3]);
        assert_eq!(ids(pending(payloads.clone(), &log, false, Some(2))), Vec::<i64>::new());
        assert_eq!(ids(pending(payloads, &log, true, Some(2))), vec![2]);
    }
}

//! Money Forward (MF) journal exports and their conversion into freee deals and journals.
//!
//! An MF export has one double-entry row per line. Rows are reclassified by looking at which side
//! is a freee walletable (bank, card or cash account):
//!
//! - wallet to wallet is a transfer and stays a manual journal,
//! - a non-wallet debit is an expense deal,
//! - otherwise a non-wallet credit is an income deal.

use crate::model::freee::{Master, Tax, Walletable};
use crate::model::{DealType, Yen};
use crate::Result;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const COL_DATE: &str = "発生日";
const COL_AMOUNT: &str = "借方金額";
const COL_DESCRIPTION: &str = "摘要";
const COL_DEBIT_ACCOUNT: &str = "借方勘定科目";
const COL_DEBIT_SUB: &str = "借方補助科目";
const COL_DEBIT_TAX: &str = "借方税区分";
const COL_CREDIT_ACCOUNT: &str = "貸方勘定科目";
const COL_CREDIT_SUB: &str = "貸方補助科目";
const COL_CREDIT_TAX: &str = "貸方税区分";

const CASH: &str = "現金";
const PAYABLE_ACCOUNTS: &[&str] = &["未払金", "買掛金"];
const RECEIVABLE_ACCOUNTS: &[&str] = &["売掛金", "未収金"];
const INCOME_MARKERS: &[&str] = &["売上", "受取", "Income"];

const SETTLED: &str = "完了";
const UNSETTLED: &str = "未決済";

/// Tax code used when a tax name is unknown, and for 課対仕入10%.
const PURCHASE_TAX_10: i64 = 108;
/// Tax code for 対象外.
const OUT_OF_SCOPE_TAX: i64 = 1;

/// An entry of `wallets.json`, the walletables exported from freee.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct Wallet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<i64>,
    pub(crate) name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) walletable_type: Option<String>,
}

/// Finds the wallet an MF sub account (or, when the sub account is empty, the account) refers to.
///
/// Wallets are tried in order. A wallet matches when its name contains the value, or when one of
/// the brand rules links them. The first match wins. An empty value never matches.
pub(crate) fn wallet_name<'a>(
    sub_account: &str,
    account: &str,
    wallets: &'a [Wallet],
) -> Option<&'a str> {
    let value = if sub_account.trim().is_empty() {
        account.trim()
    } else {
        sub_account.trim()
    };
    if value.is_empty() {
        return None;
    }
    wallets
        .iter()
        .find(|w| wallet_matches(value, &w.name))
        .map(|w| w.name.as_str())
}

fn wallet_matches(value: &str, wallet: &str) -> bool {
    let both = |needle: &str| value.contains(needle) && wallet.contains(needle);
    wallet.contains(value)
        || (value.contains("楽天") && wallet.contains("楽天") && wallet.contains("銀行"))
        || (both("PayPay")
            && value.contains("銀行")
            && wallet.contains("銀行")
            && !wallet.contains("デビット"))
        || (value.contains("PayPay") && value.contains("デビット") && wallet.contains("デビット"))
        || both("NTT")
        || both("直行便")
        || both("ESPRIME")
        || both("YP")
}

/// The wallet an account/sub-account pair represents, if any. 現金 is a wallet whenever a wallet
/// named 現金 exists.
pub(crate) fn is_wallet<'a>(account: &str, sub_account: &str, wallets: &'a [Wallet]) -> Option<&'a str> {
    if let Some(name) = wallet_name(sub_account, account, wallets) {
        return Some(name);
    }
    if account == CASH {
        return wallets
            .iter()
            .find(|w| w.name == CASH)
            .map(|w| w.name.as_str());
    }
    None
}

/// Normalizes an account name. 外注工賃 does not exist in freee and becomes 外注費.
pub(crate) fn normalize_account(account: &str) -> String {
    match clean(account).as_str() {
        "外注工賃" => "外注費".to_string(),
        other => other.to_string(),
    }
}

/// Normalizes a tax category: every 10% taxable purchase becomes 課対仕入 10%.
pub(crate) fn normalize_tax(tax: &str) -> String {
    let tax = clean(tax);
    if tax.contains("課税仕入") && tax.contains("10%") {
        "課対仕入 10%".to_string()
    } else {
        tax
    }
}

/// `2024/01/31 00:00:00` becomes `2024-01-31`.
pub(crate) fn normalize_date(date: &str) -> String {
    date.split_whitespace()
        .next()
        .unwrap_or_default()
        .replace('/', "-")
}

/// Trims a cell and treats the spreadsheet placeholders for a missing value as empty.
fn clean(cell: &str) -> String {
    match cell.trim() {
        "nan" | "NaN" | "None" => String::new(),
        other => other.to_string(),
    }
}

/// One side of an MF row.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct MfSide {
    pub(crate) account: String,
    pub(crate) sub_account: String,
    pub(crate) tax: String,
}

/// A normalized MF row.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct MfEntry {
    pub(crate) date: String,
    /// As written in the export; debit and credit amounts are assumed equal.
    pub(crate) amount: String,
    pub(crate) description: String,
    pub(crate) debit: MfSide,
    pub(crate) credit: MfSide,
}

/// Column positions of an MF export.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MfColumns {
    date: usize,
    amount: usize,
    description: usize,
    debit_account: usize,
    debit_sub: usize,
    debit_tax: usize,
    credit_account: usize,
    credit_sub: usize,
    credit_tax: usize,
}

impl MfColumns {
    /// Locates the required columns in a header row.
    pub(crate) fn locate(headers: &[String]) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            match headers.iter().position(|h| h.trim() == name) {
                Some(i) => Ok(i),
                None => bail!("The column '{name}' is missing from the MF export"),
            }
        };
        Ok(Self {
            date: find(COL_DATE)?,
            amount: find(COL_AMOUNT)?,
            description: find(COL_DESCRIPTION)?,
            debit_account: find(COL_DEBIT_ACCOUNT)?,
            debit_sub: find(COL_DEBIT_SUB)?,
            debit_tax: find(COL_DEBIT_TAX)?,
            credit_account: find(COL_CREDIT_ACCOUNT)?,
            credit_sub: find(COL_CREDIT_SUB)?,
            credit_tax: find(COL_CREDIT_TAX)?,
        })
    }

    /// Reads and normalizes one data row. Fails when the row has no date or no amount.
    pub(crate) fn entry(&self, row: &[String]) -> Result<MfEntry> {
        let cell = |i: usize| row.get(i).map(|c| clean(c)).unwrap_or_default();
        let date = normalize_date(&cell(self.date));
        if date.is_empty() {
            bail!("The row has no {COL_DATE}");
        }
        let amount = cell(self.amount);
        if amount.is_empty() {
            bail!("The row has no {COL_AMOUNT}");
        }
        Ok(MfEntry {
            date,
            amount,
            description: cell(self.description),
            debit: MfSide {
                account: normalize_account(&cell(self.debit_account)),
                sub_account: cell(self.debit_sub),
                tax: normalize_tax(&cell(self.debit_tax)),
            },
            credit: MfSide {
                account: normalize_account(&cell(self.credit_account)),
                sub_account: cell(self.credit_sub),
                tax: normalize_tax(&cell(self.credit_tax)),
            },
        })
    }
}

/// A row of the freee deal import CSV.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
pub(crate) struct DealImportRow {
    #[serde(rename = "収支区分")]
    pub(crate) kind: String,
    #[serde(rename = "発生日")]
    pub(crate) date: String,
    #[serde(rename = "勘定科目")]
    pub(crate) account: String,
    #[serde(rename = "金額")]
    pub(crate) amount: String,
    #[serde(rename = "税区分")]
    pub(crate) tax: String,
    #[serde(rename = "備考")]
    pub(crate) remarks: String,
    #[serde(rename = "品目")]
    pub(crate) item: String,
    #[serde(rename = "決済状況")]
    pub(crate) settlement: String,
    #[serde(rename = "決済口座")]
    pub(crate) settlement_wallet: String,
    #[serde(rename = "決済金額")]
    pub(crate) settlement_amount: String,
    #[serde(rename = "決済日")]
    pub(crate) settlement_date: String,
    #[serde(rename = "取引先")]
    pub(crate) partner: String,
}

/// A row of the freee manual journal import CSV.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
pub(crate) struct JournalImportRow {
    #[serde(rename = "発生日")]
    pub(crate) date: String,
    #[serde(rename = "借方勘定科目")]
    pub(crate) debit_account: String,
    #[serde(rename = "借方補助科目")]
    pub(crate) debit_sub: String,
    #[serde(rename = "借方税区分")]
    pub(crate) debit_tax: String,
    #[serde(rename = "借方金額")]
    pub(crate) debit_amount: String,
    #[serde(rename = "貸方勘定科目")]
    pub(crate) credit_account: String,
    #[serde(rename = "貸方補助科目")]
    pub(crate) credit_sub: String,
    #[serde(rename = "貸方税区分")]
    pub(crate) credit_tax: String,
    #[serde(rename = "貸方金額")]
    pub(crate) credit_amount: String,
    #[serde(rename = "摘要")]
    pub(crate) description: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Converted {
    Deal(DealImportRow),
    Journal(JournalImportRow),
}

/// Reclassifies an MF row for the freee CSV import.
pub(crate) fn classify(entry: &MfEntry, wallets: &[Wallet]) -> Converted {
    let debit_wallet = is_wallet(&entry.debit.account, &entry.debit.sub_account, wallets);
    let credit_wallet = is_wallet(&entry.credit.account, &entry.credit.sub_account, wallets);

    match (debit_wallet, credit_wallet) {
        (Some(debit), Some(credit)) => Converted::Journal(JournalImportRow {
            date: entry.date.clone(),
            debit_account: debit.to_string(),
            debit_sub: String::new(),
            debit_tax: entry.debit.tax.clone(),
            debit_amount: entry.amount.clone(),
            credit_account: credit.to_string(),
            credit_sub: String::new(),
            credit_tax: entry.credit.tax.clone(),
            credit_amount: entry.amount.clone(),
            description: entry.description.clone(),
        }),
        (None, settled_by) => Converted::Deal(deal_row(
            entry,
            "支出",
            &entry.debit,
            &entry.credit,
            settled_by,
            PAYABLE_ACCOUNTS,
        )),
        (Some(settled_by), None) => Converted::Deal(deal_row(
            entry,
            "収入",
            &entry.credit,
            &entry.debit,
            Some(settled_by),
            RECEIVABLE_ACCOUNTS,
        )),
    }
}

fn deal_row(
    entry: &MfEntry,
    kind: &str,
    side: &MfSide,
    counter: &MfSide,
    wallet: Option<&str>,
    partner_accounts: &[&str],
) -> DealImportRow {
    let mut row = DealImportRow {
        kind: kind.to_string(),
        date: entry.date.clone(),
        account: side.account.clone(),
        amount: entry.amount.clone(),
        tax: side.tax.clone(),
        remarks: entry.description.clone(),
        item: side.sub_account.clone(),
        settlement: UNSETTLED.to_string(),
        ..DealImportRow::default()
    };
    match wallet {
        Some(wallet) => {
            row.settlement = SETTLED.to_string();
            row.settlement_wallet = wallet.to_string();
            row.settlement_amount = entry.amount.clone();
            row.settlement_date = entry.date.clone();
        }
        None if partner_accounts.contains(&counter.account.as_str()) => {
            row.partner = counter.sub_account.clone();
        }
        None => {}
    }
    row
}

/// Why a row was not posted by `mf import`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum ImportSkip {
    DebitIsWallet(String),
    UnknownAccount(String),
    InvalidAmount(String),
}

impl Display for ImportSkip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportSkip::DebitIsWallet(name) => {
                write!(f, "Dr is Wallet ({name}) - likely Settlement/Transfer.")
            }
            ImportSkip::UnknownAccount(name) => write!(f, "Unknown Account {name}"),
            ImportSkip::InvalidAmount(amount) => write!(f, "Invalid amount '{amount}'"),
        }
    }
}

/// Name lookups needed to post MF rows as deals.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportMetadata {
    account_items: HashMap<String, i64>,
    taxes: HashMap<String, i64>,
    partners: HashMap<String, i64>,
    walletables: HashMap<String, Walletable>,
}

impl ImportMetadata {
    pub(crate) fn new(
        account_items: &[Master],
        taxes: &[Tax],
        partners: &[Master],
        walletables: &[Walletable],
    ) -> Self {
        let mut meta = Self::default();
        for item in account_items {
            meta.account_items.insert(item.name.clone(), item.id);
        }
        for tax in taxes {
            meta.taxes.insert(tax.name.clone(), tax.code);
            if let Some(ja) = &tax.name_ja {
                meta.taxes.entry(ja.clone()).or_insert(tax.code);
            }
        }
        for partner in partners {
            meta.partners.insert(partner.name.clone(), partner.id);
            if let Some(code) = partner.code.as_ref().filter(|c| !c.is_empty()) {
                meta.partners.insert(code.clone(), partner.id);
            }
        }
        for wallet in walletables {
            meta.walletables.insert(wallet.name.clone(), wallet.clone());
        }
        meta
    }

    /// The tax code for an MF tax category name.
    pub(crate) fn tax_code(&self, name: &str) -> i64 {
        if let Some(&code) = self.taxes.get(name) {
            return code;
        }
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.contains("課対仕入10%") {
            PURCHASE_TAX_10
        } else if compact.contains("対象外") {
            OUT_OF_SCOPE_TAX
        } else {
            PURCHASE_TAX_10
        }
    }

    /// Builds the `POST /deals` body for an MF row.
    pub(crate) fn deal_request(
        &self,
        entry: &MfEntry,
        company_id: i64,
    ) -> std::result::Result<Value, ImportSkip> {
        let debit = &entry.debit.account;
        let credit = &entry.credit.account;
        if self.walletables.contains_key(debit) {
            return Err(ImportSkip::DebitIsWallet(debit.clone()));
        }
        let is_income = INCOME_MARKERS.iter().any(|m| credit.contains(m));
        let (deal_type, side) = if is_income {
            (DealType::Income, &entry.credit)
        } else {
            (DealType::Expense, &entry.debit)
        };
        let Some(&account_item_id) = self.account_items.get(&side.account) else {
            return Err(ImportSkip::UnknownAccount(side.account.clone()));
        };
        let amount = Yen::from_str(&entry.amount)
            .ok()
            .and_then(|y| y.to_i64())
            .ok_or_else(|| ImportSkip::InvalidAmount(entry.amount.clone()))?;

        let mut payments = Vec::new();
        let mut body = json!({
            "company_id": company_id,
            "issue_date": entry.date,
            "type": deal_type,
            "details": [{
                "tax_code": self.tax_code(&side.tax),
                "account_item_id": account_item_id,
                "amount": amount,
                "description": entry.description,
            }],
        });
        if let Some(wallet) = self.walletables.get(credit) {
            payments.push(json!({
                "amount": amount,
                "from_walletable_id": wallet.id,
                "from_walletable_type": wallet.walletable_type,
                "date": entry.date,
            }));
        } else if let Some(&partner_id) = self.partners.get(credit) {
            body["partner_id"] = json!(partner_id);
        }
        body["payments"] = Value::Array(payments);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallets(names: &[&str]) -> Vec<Wallet> {
        names
            .iter()
            .map(|n| Wallet {
                id: None,
                name: n.to_string(),
                walletable_type: None,
            })
            .collect()
    }

    fn entry(debit: (&str, &str), credit: (&str, &str)) -> MfEntry {
        MfEntry {
            date: "2024-01-31".to_string(),
            amount: "1100".to_string(),
            description: "memo".to_string(),
            debit: MfSide {
                account: debit.0.to_string(),
                sub_account: debit.1.to_string(),
                tax: "課対仕入 10%".to_string(),
            },
            credit: MfSide {
                account: credit.0.to_string(),
                sub_account: credit.1.to_string(),
                tax: String::new(),
            },
        }
    }

    #[test]
    fn test_wallet_name_substring_and_brand_rules() {
        let w = wallets(&[
            "楽天銀行",
            "PayPay銀行",
            "PayPayカード デビット",
            "NTTファイナンス",
            "三井住友カード(YP)",
        ]);
        assert_eq!(wallet_name("楽天銀行", "普通預金", &w), Some("楽天銀行"));
        assert_eq!(wallet_name("楽天", "普通預金", &w), Some("楽天銀行"));
        assert_eq!(wallet_name("楽天ビジネス口座", "", &w), Some("楽天銀行"));
        assert_eq!(wallet_name("PayPay銀行 本店", "", &w), Some("PayPay銀行"));
        assert_eq!(
            wallet_name("PayPayデビット", "", &w),
            Some("PayPayカード デビット")
        );
        assert_eq!(wallet_name("NTT Card", "", &w), Some("NTTファイナンス"));
        assert_eq!(wallet_name("YPカード", "", &w), Some("三井住友カード(YP)"));
        assert_eq!(wallet_name("みずほ", "", &w), None);
    }

    #[test]
    fn test_wallet_name_uses_account_when_sub_is_empty() {
        let w = wallets(&["現金", "楽天銀行"]);
        assert_eq!(wallet_name("", "現金", &w), Some("現金"));
        assert_eq!(wallet_name("  ", "", &w), None);
    }

    #[test]
    fn test_wallet_name_first_wallet_wins() {
        let w = wallets(&["楽天銀行 普通", "楽天銀行"]);
        assert_eq!(wallet_name("楽天銀行", "", &w), Some("楽天銀行 普通"));
    }

    #[test]
    fn test_is_wallet_cash() {
        // 現金 with a sub account that names nothing still resolves through the 現金 wallet.
        let w = wallets(&["現金", "楽天銀行"]);
        assert_eq!(is_wallet("現金", "小口", &w), Some("現金"));
        assert_eq!(is_wallet("現金", "小口", &wallets(&["楽天銀行"])), None);
        assert_eq!(is_wallet("消耗品費", "", &w), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_account(" 外注工賃 "), "外注費");
        assert_eq!(normalize_account("nan"), "");
        assert_eq!(normalize_tax("課税仕入 10%"), "課対仕入 10%");
        assert_eq!(normalize_tax("課税仕入-返還等 10%"), "課対仕入 10%");
        assert_eq!(normalize_tax("対象外"), "対象外");
        assert_eq!(normalize_date("2024/01/31 00:00:00"), "2024-01-31");
        assert_eq!(normalize_date("2024-02-01"), "2024-02-01");
    }

    #[test]
    fn test_classify_transfer_is_journal() {
        let w = wallets(&["楽天銀行", "PayPay銀行"]);
        let converted = classify(&entry(("普通預金", "楽天銀行"), ("普通預金", "PayPay銀行")), &w);
        let Converted::Journal(row) = converted else {
            panic!("expected a journal");
        };
        assert_eq!(row.debit_account, "楽天銀行");
        assert_eq!(row.credit_account, "PayPay銀行");
        assert_eq!(row.debit_sub, "");
        assert_eq!(row.credit_amount, "1100");
    }

    #[test]
    fn test_classify_settled_expense() {
        let w = wallets(&["楽天銀行"]);
        let Converted::Deal(row) = classify(&entry(("消耗品費", "文具"), ("普通預金", "楽天銀行")), &w)
        else {
            panic!("expected a deal");
        };
        assert_eq!(row.kind, "支出");
        assert_eq!(row.account, "消耗品費");
        assert_eq!(row.item, "文具");
        assert_eq!(row.tax, "課対仕入 10%");
        assert_eq!(row.settlement, "完了");
        assert_eq!(row.settlement_wallet, "楽天銀行");
        assert_eq!(row.settlement_amount, "1100");
        assert_eq!(row.settlement_date, "2024-01-31");
        assert_eq!(row.partner, "");
    }

    #[test]
    fn test_classify_unsettled_expense_with_partner() {
        let Converted::Deal(row) = classify(&entry(("外注費", ""), ("未払金", "山田商店")), &[])
        else {
            panic!("expected a deal");
        };
        assert_eq!(row.settlement, "未決済");
        assert_eq!(row.partner, "山田商店");
        assert_eq!(row.settlement_wallet, "");
    }

    #[test]
    fn test_classify_income() {
        let w = wallets(&["楽天銀行"]);
        let Converted::Deal(row) = classify(&entry(("普通預金", "楽天銀行"), ("売上高", "")), &w)
        else {
            panic!("expected a deal");
        };
        assert_eq!(row.kind, "収入");
        assert_eq!(row.account, "売上高");
        assert_eq!(row.settlement, "完了");
        assert_eq!(row.settlement_wallet, "楽天銀行");
    }

    #[test]
    fn test_columns_and_entry() {
        let headers: Vec<String> = [
            "取引No", "発生日", "借方勘定科目", "借方補助科目", "借方税区分", "借方金額",
            "貸方勘定科目", "貸方補助科目", "貸方税区分", "摘要",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let columns = MfColumns::locate(&headers).unwrap();
        let row: Vec<String> = [
            "1", "2024/03/05 00:00:00", "外注工賃", "nan", "課税仕入 10%", "5500",
            "未払金", "山田商店", "", "nan",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let entry = columns.entry(&row).unwrap();
        assert_eq!(entry.date, "2024-03-05");
        assert_eq!(entry.debit.account, "外注費");
        assert_eq!(entry.debit.sub_account, "");
        assert_eq!(entry.debit.tax, "課対仕入 10%");
        assert_eq!(entry.description, "");
        assert_eq!(entry.credit.sub_account, "山田商店");

        let mut blank = row.clone();
        blank[1] = String::new();
        assert!(columns.entry(&blank).is_err());
        assert!(MfColumns::locate(&headers[..3]).is_err());
    }

    fn metadata() -> ImportMetadata {
        let master = |id: i64, name: &str, code: Option<&str>| Master {
            id,
            name: name.to_string(),
            code: code.map(str::to_string),
        };
        ImportMetadata::new(
            &[master(10, "消耗品費", None), master(20, "売上高", None)],
            &[Tax {
                code: 136,
                name: "purchase_with_tax_10".to_string(),
                name_ja: Some("課対仕入10%".to_string()),
            }],
            &[master(300, "山田商店", Some("YAMADA"))],
            &[Walletable {
                id: 7,
                name: "楽天銀行".to_string(),
                walletable_type: "bank_account".to_string(),
            }],
        )
    }

    #[test]
    fn test_tax_code_fallbacks() {
        let meta = metadata();
        assert_eq!(meta.tax_code("課対仕入10%"), 136);
        assert_eq!(meta.tax_code("課対仕入 10%"), 108);
        assert_eq!(meta.tax_code("対象外"), 1);
        assert_eq!(meta.tax_code(""), 108);
    }

    #[test]
    fn test_deal_request_expense_paid_from_wallet() {
        let body = metadata()
            .deal_request(&entry(("消耗品費", ""), ("楽天銀行", "")), 1)
            .unwrap();
        assert_eq!(body["type"], "expense");
        assert_eq!(body["details"][0]["account_item_id"], 10);
        assert_eq!(body["details"][0]["amount"], 1100);
        assert_eq!(body["payments"][0]["from_walletable_id"], 7);
        assert_eq!(body["payments"][0]["from_walletable_type"], "bank_account");
        assert!(body.get("partner_id").is_none());
    }

    #[test]
    fn test_deal_request_income_and_partner() {
        let meta = metadata();
        let body = meta
            .deal_request(&entry(("売掛金", ""), ("売上高", "")), 1)
            .unwrap();
        assert_eq!(body["type"], "income");
        assert_eq!(body["details"][0]["account_item_id"], 20);

        let body = meta
            .deal_request(&entry(("消耗品費", ""), ("YAMADA", "")), 1)
            .unwrap();
        assert_eq!(body["partner_id"], 300);
        assert_eq!(body["payments"], json!([]));
    }

    #[test]
    fn test_deal_request_skips() {
        let meta = metadata();
        assert_eq!(
            meta.deal_request(&entry(("楽天銀行", ""), ("売上高", "")), 1),
            Err(ImportSkip::DebitIsWallet("楽天銀行".to_string()))
        );
        assert_eq!(
            meta.deal_request(&entry(("旅費交通費", ""), ("楽天銀行", "")), 1),
            Err(ImportSkip::UnknownAccount("旅費交通費".to_string()))
        );
        let mut bad = entry(("消耗品費", ""), ("楽天銀行", ""));
        bad.amount = "abc".to_string();
        assert!(matches!(
            meta.deal_request(&bad, 1),
            Err(ImportSkip::InvalidAmount(_))
        ));
    }
}

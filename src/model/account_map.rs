//! Logical account keys used by settlement journals and their freee account items.

use crate::model::freee::{Master, Tax};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Logical key and the freee account item name it maps to.
pub(crate) const ACCOUNT_DEFS: &[(&str, &str)] = &[
    ("sales_product", "売上高"),
    ("sales_shipping", "売上高"),
    ("sales_refunds", "売上戻り高"),
    ("sales_promotions", "売上値引高"),
    ("income_reimbursement", "雑収入"),
    ("expense_commission", "販売手数料"),
    ("expense_fba_shipping", "荷造運賃"),
    ("expense_advertising", "広告宣伝費"),
    ("expense_points", "広告宣伝費"),
    ("expense_storage", "地代家賃"),
    ("expense_subscription", "諸会費"),
    ("expense_other", "支払手数料"),
    ("reserve", "仮払金"),
    ("net_amount", "Amazon出品アカウント"),
    ("expense_cogs", "売上原価"),
    ("asset_inventory", "商品"),
];

/// Keys that move assets rather than record income or expense.
const NON_TAXABLE_KEYS: &[&str] = &["expense_cogs", "net_amount", "reserve", "asset_inventory"];

/// The three default tax codes a logical key can resolve to.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub(crate) struct TaxDefaults {
    pub(crate) sales: Option<i64>,
    pub(crate) purchase: Option<i64>,
    pub(crate) none: Option<i64>,
}

impl TaxDefaults {
    pub(crate) fn from_taxes(taxes: &[Tax]) -> Self {
        let find = |name: &str| taxes.iter().find(|t| t.name == name).map(|t| t.code);
        Self {
            sales: find("sales_with_tax_10").or_else(|| find("taxable_10")),
            purchase: find("purchase_with_tax_10"),
            none: find("non_taxable"),
        }
    }

    pub(crate) fn for_key(&self, key: &str) -> Option<i64> {
        if NON_TAXABLE_KEYS.contains(&key) {
            self.none
        } else if key.starts_with("sales_") {
            self.sales
        } else if key.starts_with("expense_") {
            self.purchase
        } else {
            self.none
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub(crate) struct AccountMapRow {
    pub(crate) logical_key: String,
    pub(crate) account_item_id: i64,
    pub(crate) tax_code: Option<i64>,
    pub(crate) account_name_debug: String,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Resolves every logical key. Keys whose account item does not exist are logged and skipped.
pub(crate) fn build_account_map(
    account_items: &[Master],
    taxes: &TaxDefaults,
    updated_at: DateTime<Utc>,
) -> Vec<AccountMapRow> {
    let ids: HashMap<&str, i64> = account_items
        .iter()
        .map(|item| (item.name.as_str(), item.id))
        .collect();
    ACCOUNT_DEFS
        .iter()
        .filter_map(|&(key, name)| {
            let Some(&id) = ids.get(name) else {
                warn!("Account '{name}' not found for key '{key}'");
                return None;
            };
            Some(AccountMapRow {
                logical_key: key.to_string(),
                account_item_id: id,
                tax_code: taxes.for_key(key),
                account_name_debug: name.to_string(),
                updated_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax(code: i64, name: &str) -> Tax {
        Tax {
            code,
            name: name.to_string(),
            name_ja: None,
        }
    }

    fn item(id: i64, name: &str) -> Master {
        Master {
            id,
            name: name.to_string(),
            code: None,
        }
    }

    #[test]
    fn test_tax_defaults() {
        let taxes = TaxDefaults::from_taxes(&[
            tax(129, "sales_with_tax_10"),
            tax(136, "purchase_with_tax_10"),
            tax(2, "non_taxable"),
        ]);
        assert_eq!(taxes.for_key("sales_refunds"), Some(129));
        assert_eq!(taxes.for_key("expense_commission"), Some(136));
        assert_eq!(taxes.for_key("expense_cogs"), Some(2));
        assert_eq!(taxes.for_key("net_amount"), Some(2));
        assert_eq!(taxes.for_key("income_reimbursement"), Some(2));
    }

    #[test]
    fn test_tax_defaults_taxable_10_fallback() {
        let taxes = TaxDefaults::from_taxes(&[tax(21, "taxable_10")]);
        assert_eq!(taxes.sales, Some(21));
        assert_eq!(taxes.purchase, None);
    }

    #[test]
    fn test_build_account_map_skips_unknown() {
        let now = Utc::now();
        let taxes = TaxDefaults {
            sales: Some(129),
            purchase: Some(136),
            none: Some(2),
        };
        let rows = build_account_map(&[item(10, "売上高"), item(20, "販売手数料")], &taxes, now);
        let keys: Vec<&str> = rows.iter().map(|r| r.logical_key.as_str()).collect();
        assert_eq!(keys, vec!["sales_product", "sales_shipping", "expense_commission"]);
        assert_eq!(rows[0].account_item_id, 10);
        assert_eq!(rows[0].tax_code, Some(129));
        assert_eq!(rows[2].tax_code, Some(136));
        assert_eq!(rows[2].updated_at, now);
    }
}

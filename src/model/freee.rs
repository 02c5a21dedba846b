//! Typed views of the freee resources the commands display or look up.
//!
//! freee returns many more fields than are modelled here; unknown fields are ignored.

use crate::model::Yen;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Whether a deal is income or expense.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(DealType);
serde_plain::derive_fromstr_from_deserialize!(DealType);

/// The master resources that can be listed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum MasterKind {
    Partners,
    Items,
    AccountItems,
}

serde_plain::derive_display_from_serialize!(MasterKind);
serde_plain::derive_fromstr_from_deserialize!(MasterKind);

/// The master resources that can be created.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CreatableMaster {
    Partners,
    Items,
}

serde_plain::derive_display_from_serialize!(CreatableMaster);
serde_plain::derive_fromstr_from_deserialize!(CreatableMaster);

impl CreatableMaster {
    /// The key of the created object in the response, e.g. `partner`.
    pub(crate) fn singular(&self) -> &'static str {
        match self {
            CreatableMaster::Partners => "partner",
            CreatableMaster::Items => "item",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Deal {
    pub(crate) id: i64,
    pub(crate) issue_date: String,
    pub(crate) amount: Yen,
    #[serde(rename = "type")]
    pub(crate) deal_type: DealType,
    #[serde(default)]
    pub(crate) details: Vec<DealDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DealDetail {
    #[serde(default)]
    pub(crate) account_item_name: Option<String>,
    #[serde(default)]
    pub(crate) tax_code_name: Option<String>,
    #[serde(default)]
    pub(crate) account_item_id: Option<i64>,
    #[serde(default)]
    pub(crate) tax_code: Option<i64>,
    pub(crate) amount: Yen,
}

impl Display for Deal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "ID: {} | Date: {} | Amount: {} | Type: {}",
            self.id, self.issue_date, self.amount, self.deal_type
        )?;
        for detail in &self.details {
            // Older API versions only return ids.
            let account = match (&detail.account_item_name, detail.account_item_id) {
                (Some(name), _) => name.clone(),
                (None, Some(id)) => id.to_string(),
                (None, None) => "-".to_string(),
            };
            let tax = match (&detail.tax_code_name, detail.tax_code) {
                (Some(name), _) => name.clone(),
                (None, Some(code)) => code.to_string(),
                (None, None) => "-".to_string(),
            };
            writeln!(f, "  - {account} / {tax} : {}", detail.amount)?;
        }
        write!(f, "{}", "-".repeat(20))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Receipt {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) issue_date: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) file_name: Option<String>,
}

impl Display for Receipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ID: {} | Date: {} | Status: {} | File: {}",
            self.id,
            self.issue_date.as_deref().unwrap_or("-"),
            self.status.as_deref().unwrap_or("unknown"),
            self.file_name.as_deref().unwrap_or("-"),
        )
    }
}

/// A partner, item or account item. Only the fields shared by all three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Master {
    pub(crate) id: i64,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tax {
    pub(crate) code: i64,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) name_ja: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Walletable {
    pub(crate) id: i64,
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) walletable_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TrialBalanceLine {
    #[serde(default)]
    pub(crate) account_item_name: Option<String>,
    #[serde(default)]
    pub(crate) closing_balance: Option<Yen>,
}

impl Display for TrialBalanceLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.account_item_name.as_deref().unwrap_or("(total)");
        match self.closing_balance {
            Some(balance) => write!(f, "{name}: {balance}"),
            None => write!(f, "{name}: -"),
        }
    }
}

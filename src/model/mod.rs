//! Types for the data that moves between freee, Google Sheets and local files.
mod account_map;
mod amount;
mod freee;
mod journal;
mod mf;
mod spreadsheet;

pub(crate) use account_map::{build_account_map, AccountMapRow, TaxDefaults};
pub(crate) use amount::Yen;
pub use freee::{CreatableMaster, DealType, MasterKind};
pub(crate) use freee::{Deal, Master, Receipt, Tax, TrialBalanceLine, Walletable};
pub(crate) use journal::{pending, ImportLogEntry, SettlementPayload};
pub(crate) use mf::{classify, Converted, ImportMetadata, MfColumns, Wallet};
pub use spreadsheet::ReadFormat;
pub(crate) use spreadsheet::{
    extract_spreadsheet_id, parse_values, render_values, to_grid, ValueInput,
};

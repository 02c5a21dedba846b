//! Command handlers for the ledger-bridge CLI.
//!
//! Each handler performs one job and returns an `Out` describing the result. The `freee`,
//! `google`, `secret`, `render` and `scrape` functions route a parsed subcommand to its handler
//! and print the outcome.

mod auth;
mod deals;
mod export;
mod files;
mod init;
mod journals;
mod masters;
mod mf;
mod reports;
mod sheets;
mod tools;

use crate::api::{Freee, Google};
use crate::args::{
    DealsCommand, FilesCommand, FreeeArgs, FreeeCommand, GoogleArgs, GoogleCommand,
    InvoicesCommand, JournalsCommand, MastersCommand, MfCommand, ReceiptsCommand, RenderArgs,
    ScrapeArgs, SecretArgs, SecretCommand, SheetsCommand,
};
use crate::{Config, Result};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

pub use init::init;

/// The output type for a command: a message for the terminal and, optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Printed to stdout when the command finishes.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to stdout and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        if !self.message.is_empty() {
            println!("{}", self.message);
        }
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Reads API records into their typed views.
fn typed<T>(items: Vec<Value>, resource: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .with_context(|| format!("Unexpected {resource} record in the response"))
        })
        .collect()
}

/// The body pretty printed for confirmation prompts and results.
fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Routes `ledger-bridge secret ...`.
pub async fn secret(config: Config, args: &SecretArgs) -> Result<()> {
    match &args.command {
        SecretCommand::Set(set) => init::secret_set(&config, set).await?.print(),
    }
    Ok(())
}

/// Routes `ledger-bridge freee ...`.
pub async fn freee(config: Config, args: &FreeeArgs) -> Result<()> {
    let client = || Freee::new(&config);
    let _: () = match &args.command {
        FreeeCommand::Auth => auth::freee_auth(&config).await?.print(),
        FreeeCommand::Deals(deals) => match &deals.command {
            DealsCommand::List(a) => deals::list(&client().await?, a).await?.print(),
            DealsCommand::Create(a) => deals::create(&client().await?, a).await?.print(),
        },
        FreeeCommand::Invoices(invoices) => match &invoices.command {
            InvoicesCommand::Create(a) => {
                deals::create_invoice(&client().await?, a).await?.print()
            }
        },
        FreeeCommand::Masters(masters) => match &masters.command {
            MastersCommand::List(a) => masters::list(&client().await?, a).await?.print(),
            MastersCommand::Create(a) => masters::create(&client().await?, a).await?.print(),
        },
        FreeeCommand::Receipts(receipts) => match &receipts.command {
            ReceiptsCommand::List(a) => masters::list_receipts(&client().await?, a).await?.print(),
            ReceiptsCommand::Upload(a) => {
                masters::upload_receipt(&client().await?, a).await?.print()
            }
        },
        FreeeCommand::TrialBalance(a) => {
            reports::trial_balance(&client().await?, a).await?.print()
        }
        FreeeCommand::AccountMap(a) => reports::account_map(&client().await?, a).await?.print(),
        FreeeCommand::Export(a) => export::export(&client().await?, &config, a).await?.print(),
        FreeeCommand::Journals(journals) => match &journals.command {
            JournalsCommand::Post(a) => {
                journals::post(&client().await?, &config, a).await?.print()
            }
        },
        FreeeCommand::Mf(mf) => match &mf.command {
            MfCommand::Convert(a) => mf::convert(a).await?.print(),
            MfCommand::Import(a) => mf::import(&client().await?, a).await?.print(),
            MfCommand::Inspect(a) => mf::inspect(a)?.print(),
            MfCommand::Xlsx(a) => mf::xlsx(a)?.print(),
        },
    };
    Ok(())
}

/// Routes `ledger-bridge google ...`.
pub async fn google(config: Config, args: &GoogleArgs) -> Result<()> {
    let client = || Google::new(&config);
    let _: () = match &args.command {
        GoogleCommand::Auth(a) if a.verify => auth::google_auth_verify(&config).await?.print(),
        GoogleCommand::Auth(_) => auth::google_auth(&config).await?.print(),
        GoogleCommand::Files(files) => match &files.command {
            FilesCommand::List(a) => files::list(&mut client().await?, a).await?.print(),
            FilesCommand::Download(a) => files::download(&mut client().await?, a).await?.print(),
        },
        GoogleCommand::Sheets(sheets) => match &sheets.command {
            SheetsCommand::Read(a) => sheets::read(&mut client().await?, a).await?.print(),
            SheetsCommand::Write(a) => sheets::write(&mut client().await?, a).await?.print(),
            SheetsCommand::Export(a) => sheets::export(&mut client().await?, a).await?.print(),
        },
    };
    Ok(())
}

/// Runs `ledger-bridge render`.
pub async fn render(args: &RenderArgs) -> Result<()> {
    tools::render(args).await?.print();
    Ok(())
}

/// Runs `ledger-bridge scrape`.
pub async fn scrape(args: &ScrapeArgs) -> Result<()> {
    tools::scrape(args).await?.print();
    Ok(())
}

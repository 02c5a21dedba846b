//! These structs provide the CLI interface for ledger-bridge.

use crate::model::{CreatableMaster, DealType, MasterKind, ReadFormat};
use crate::SecretBackend;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ledger-bridge: bookkeeping glue between freee, Google Drive/Sheets and local files.
///
/// Each subcommand performs one bounded job: list or create freee records, export freee data to
/// JSON-lines, convert Money Forward journal exports for freee, read and write Google Sheets,
/// download Drive files, render HTML to images, or scrape documentation sites.
///
/// Credentials live in a secret store under $LEDGER_BRIDGE_HOME (or in GCP Secret Manager). Run
/// `ledger-bridge init` first, then `ledger-bridge freee auth` and `ledger-bridge google auth`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the initial config.json.
    ///
    /// Secrets are kept as files under $LEDGER_BRIDGE_HOME/.secrets unless you choose
    /// `--secret-backend secret_manager`, in which case they are read from and written to GCP
    /// Secret Manager in `--gcp-project-id` (or $GCP_PROJECT_ID).
    Init(InitArgs),
    /// Store a secret, e.g. the Google OAuth client JSON.
    Secret(SecretArgs),
    /// Work with the freee accounting API.
    Freee(FreeeArgs),
    /// Work with Google Drive and Google Sheets.
    Google(GoogleArgs),
    /// Render an HTML file to PNG or PDF with headless Chrome (requires node and puppeteer).
    Render(RenderArgs),
    /// Download the pages of a documentation site as markdown (requires firecrawl).
    Scrape(ScrapeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and file-backed secrets are held. Defaults to
    /// ~/ledger-bridge
    #[arg(long, env = "LEDGER_BRIDGE_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// Where secrets are stored: file or secret_manager.
    #[arg(long, default_value_t = SecretBackend::File)]
    pub secret_backend: SecretBackend,

    /// The GCP project holding the secrets when using secret_manager.
    #[arg(long)]
    pub gcp_project_id: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct SecretArgs {
    #[command(subcommand)]
    pub command: SecretCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SecretCommand {
    /// Store a secret value under NAME, e.g. GOOGLE_WORKSPACE_CREDENTIALS.
    Set(SecretSetArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SecretSetArgs {
    /// The secret name, e.g. FREEE_CLIENT_ID or GOOGLE_WORKSPACE_CREDENTIALS.
    pub name: String,

    /// Read the value from this file.
    #[arg(long, conflicts_with = "value")]
    pub file: Option<PathBuf>,

    /// Use this value. When neither --file nor --value is given you are prompted.
    #[arg(long)]
    pub value: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct FreeeArgs {
    #[command(subcommand)]
    pub command: FreeeCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FreeeCommand {
    /// Authorize ledger-bridge with freee and store the refresh token.
    Auth,
    /// List or create deals (income and expense transactions).
    Deals(DealsArgs),
    /// Create invoices.
    Invoices(InvoicesArgs),
    /// List or create partners, items and account items.
    Masters(MastersArgs),
    /// List or upload receipts in the file box.
    Receipts(ReceiptsArgs),
    /// Print the closing balances of the trial balance.
    TrialBalance(TrialBalanceArgs),
    /// Dump deals, journals, wallet transactions and masters to JSON-lines files.
    Export(ExportArgs),
    /// Resolve the logical account keys to account item ids and tax codes.
    AccountMap(AccountMapArgs),
    /// Post manual journals.
    Journals(JournalsArgs),
    /// Convert and import Money Forward journal exports.
    Mf(MfArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct DealsArgs {
    #[command(subcommand)]
    pub command: DealsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DealsCommand {
    List(DealsListArgs),
    /// Create a single-line deal.
    Create(DealCreateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct DealsListArgs {
    /// Number of deals to fetch.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct DealCreateArgs {
    /// Issue date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    #[arg(long = "type", value_enum)]
    pub deal_type: DealType,

    #[arg(long)]
    pub amount: i64,

    #[arg(long)]
    pub account_item_id: i64,

    /// e.g. 108
    #[arg(long)]
    pub tax_code: i64,

    #[arg(long)]
    pub partner_id: Option<i64>,

    #[arg(long)]
    pub description: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct InvoicesArgs {
    #[command(subcommand)]
    pub command: InvoicesCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum InvoicesCommand {
    /// Create a one-line invoice. VAT is 10% of the amount, rounded down.
    Create(InvoiceCreateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct InvoiceCreateArgs {
    #[arg(long)]
    pub partner_id: i64,

    /// YYYY-MM-DD
    #[arg(long)]
    pub issue_date: String,

    /// YYYY-MM-DD
    #[arg(long)]
    pub due_date: String,

    /// Unit price before tax.
    #[arg(long)]
    pub amount: i64,

    #[arg(long)]
    pub description: String,

    #[arg(long)]
    pub account_item_id: Option<i64>,

    #[arg(long, default_value_t = 129)]
    pub tax_code: i64,

    /// Do not ask for confirmation.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct MastersArgs {
    #[command(subcommand)]
    pub command: MastersCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MastersCommand {
    List(MastersListArgs),
    Create(MasterCreateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct MastersListArgs {
    #[arg(value_enum)]
    pub kind: MasterKind,
}

#[derive(Debug, Parser, Clone)]
pub struct MasterCreateArgs {
    #[arg(value_enum)]
    pub kind: CreatableMaster,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub code: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ReceiptsArgs {
    #[command(subcommand)]
    pub command: ReceiptsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReceiptsCommand {
    List(ReceiptsListArgs),
    Upload(ReceiptUploadArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ReceiptsListArgs {
    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct ReceiptUploadArgs {
    /// The receipt image or PDF.
    pub file: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct TrialBalanceArgs {
    /// e.g. 2024
    #[arg(long)]
    pub fiscal_year: i32,
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    /// Where the `{name}.jsonl` files are written.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Only export records on or after this date (deals, manual journals, wallet transactions).
    #[arg(long)]
    pub start_date: Option<String>,

    /// Comma separated resource names, e.g. deals,partners
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Upload every file to this gs:// prefix. Defaults to gcs_bucket from config.json when
    /// --bq-dataset is given.
    #[arg(long)]
    pub upload: Option<String>,

    /// Replace the table `{dataset}.{name}` in BigQuery with each uploaded file.
    #[arg(long)]
    pub bq_dataset: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct AccountMapArgs {
    #[arg(long, default_value = "account_map.csv")]
    pub out: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct JournalsArgs {
    #[command(subcommand)]
    pub command: JournalsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum JournalsCommand {
    /// Post settlement journals from a JSON-lines file of payloads.
    Post(JournalsPostArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct JournalsPostArgs {
    /// One settlement per line: {"settlement_id", "issue_date", "details": [...]}
    #[arg(long)]
    pub input: PathBuf,

    /// Print the settlements without posting.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask before each post.
    #[arg(long)]
    pub yes: bool,

    /// Also post settlements already recorded in the import log.
    #[arg(long)]
    pub ignore_log: bool,

    /// Only this settlement.
    #[arg(long)]
    pub settlement_id: Option<i64>,
}

#[derive(Debug, Parser, Clone)]
pub struct MfArgs {
    #[command(subcommand)]
    pub command: MfCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MfCommand {
    /// Write freee import CSVs (Shift_JIS) for Money Forward journal exports.
    Convert(MfConvertArgs),
    /// Post each Money Forward journal row as a deal through the API.
    Import(MfImportArgs),
    /// Print the header and the first rows of a file.
    Inspect(MfInspectArgs),
    /// Convert the import CSVs in a directory to xlsx.
    Xlsx(MfXlsxArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct MfConvertArgs {
    /// Money Forward exports (xlsx or csv).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Walletables exported from freee; without it every row becomes an unsettled deal.
    #[arg(long, default_value = "wallets.json")]
    pub wallets: PathBuf,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct MfImportArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print the requests without posting.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct MfInspectArgs {
    pub file: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct MfXlsxArgs {
    pub dir: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct GoogleArgs {
    #[command(subcommand)]
    pub command: GoogleCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoogleCommand {
    /// Authenticate with Google via OAuth in the browser.
    Auth(AuthArgs),
    /// List or download Drive files.
    Files(FilesArgs),
    /// Read, write or export Google Sheets.
    Sheets(SheetsArgs),
}

/// (Not shown): Args for the `google auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh the stored token without opening a browser.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub command: FilesCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FilesCommand {
    List(FilesListArgs),
    /// Download a file. Google Docs formats are exported.
    Download(FileDownloadArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FilesListArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: u32,

    /// Drive query, e.g. "name contains 'report'"
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct FileDownloadArgs {
    #[arg(long)]
    pub file_id: String,

    #[arg(long)]
    pub output: PathBuf,

    /// Export format for Google Docs files, e.g. text/csv
    #[arg(long)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsArgs {
    #[command(subcommand)]
    pub command: SheetsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SheetsCommand {
    Read(SheetsReadArgs),
    Write(SheetsWriteArgs),
    /// Save sheet ranges as CSV files and optionally upload them.
    Export(SheetsExportArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsReadArgs {
    /// Spreadsheet id or URL.
    #[arg(long)]
    pub spreadsheet: String,

    #[arg(long, default_value = "Sheet1!A1:Z100")]
    pub range: String,

    /// Show the title and the sheets instead of reading values.
    #[arg(long)]
    pub info: bool,

    #[arg(long, value_enum, default_value_t = ReadFormat::Table)]
    pub format: ReadFormat,
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsWriteArgs {
    /// Spreadsheet id or URL.
    #[arg(long)]
    pub spreadsheet: String,

    #[command(subcommand)]
    pub action: WriteAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WriteAction {
    /// Overwrite the cells of a range.
    Update(ValuesArgs),
    /// Append rows after the last row of a range.
    Append(ValuesArgs),
    /// Clear the values of a range.
    Clear(RangeArgs),
    AddSheet(AddSheetArgs),
    DeleteSheet(DeleteSheetArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ValuesArgs {
    /// e.g. Sheet1!A1:C3
    #[arg(long)]
    pub range: String,

    /// A JSON array (1-D or 2-D) or "a,b;c,d".
    #[arg(long)]
    pub values: String,

    /// Store values as typed instead of parsing them like the Sheets UI does.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct RangeArgs {
    #[arg(long)]
    pub range: String,
}

#[derive(Debug, Parser, Clone)]
pub struct AddSheetArgs {
    #[arg(long)]
    pub title: String,
}

#[derive(Debug, Parser, Clone)]
pub struct DeleteSheetArgs {
    /// The numeric sheet id, see `sheets read --info`.
    #[arg(long)]
    pub sheet_id: i64,
}

#[derive(Debug, Parser, Clone)]
pub struct SheetsExportArgs {
    /// Spreadsheet id or URL.
    #[arg(long)]
    pub spreadsheet: String,

    /// `name` (the whole sheet) or `name=range`, e.g. agency_ledger=agency_ledger!A:Z
    #[arg(long = "sheet", required = true)]
    pub sheets: Vec<String>,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Upload each CSV to this gs:// prefix.
    #[arg(long)]
    pub upload: Option<String>,

    /// Keep the local CSV files after uploading.
    #[arg(long)]
    pub keep: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct RenderArgs {
    pub input: PathBuf,

    /// `.pdf` renders a PDF, anything else a PNG.
    pub output: PathBuf,

    #[arg(long, default_value_t = 2000)]
    pub width: u32,

    #[arg(long, default_value_t = 2000)]
    pub height: u32,

    /// Device scale factor.
    #[arg(long, default_value_t = 1)]
    pub scale: u32,

    /// Milliseconds to wait after fonts are loaded.
    #[arg(long, default_value_t = 2000)]
    pub wait: u64,

    /// Transparent PNG background.
    #[arg(long)]
    pub transparent: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ScrapeArgs {
    pub url: String,

    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ledger-bridge"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or LEDGER_BRIDGE_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("ledger-bridge")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        <Args as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_sheets_write() {
        let args = Args::try_parse_from([
            "ledger-bridge",
            "--home",
            "/tmp/lb",
            "google",
            "sheets",
            "write",
            "--spreadsheet",
            "abc",
            "append",
            "--range",
            "Sheet1!A:C",
            "--values",
            "a,b;c,d",
            "--raw",
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/lb"));
        let Command::Google(google) = args.command() else {
            panic!("expected google");
        };
        let GoogleCommand::Sheets(sheets) = &google.command else {
            panic!("expected sheets");
        };
        let SheetsCommand::Write(write) = &sheets.command else {
            panic!("expected write");
        };
        let WriteAction::Append(values) = &write.action else {
            panic!("expected append");
        };
        assert!(values.raw);
        assert_eq!(values.values, "a,b;c,d");
    }

    #[test]
    fn test_parse_deal_create_and_export_only() {
        let args = Args::try_parse_from([
            "ledger-bridge",
            "freee",
            "deals",
            "create",
            "--date",
            "2024-05-01",
            "--type",
            "expense",
            "--amount",
            "1100",
            "--account-item-id",
            "10",
            "--tax-code",
            "108",
        ])
        .unwrap();
        let Command::Freee(FreeeArgs {
            command: FreeeCommand::Deals(DealsArgs {
                command: DealsCommand::Create(create),
            }),
        }) = args.command()
        else {
            panic!("expected deals create");
        };
        assert_eq!(create.deal_type, DealType::Expense);
        assert!(!create.yes);

        let args = Args::try_parse_from([
            "ledger-bridge",
            "freee",
            "export",
            "--only",
            "deals,partners",
        ])
        .unwrap();
        let Command::Freee(FreeeArgs {
            command: FreeeCommand::Export(export),
        }) = args.command()
        else {
            panic!("expected export");
        };
        assert_eq!(export.only, vec!["deals", "partners"]);
    }
}

use clap::Parser;
use ledger_bridge::args::{Args, Command};
use ledger_bridge::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),
        Command::Secret(secret_args) => {
            commands::secret(Config::load(home).await?, secret_args).await?
        }
        Command::Freee(freee_args) => commands::freee(Config::load(home).await?, freee_args).await?,
        Command::Google(google_args) => {
            commands::google(Config::load(home).await?, google_args).await?
        }
        Command::Render(render_args) => commands::render(render_args).await?,
        Command::Scrape(scrape_args) => commands::scrape(scrape_args).await?,
    }
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only. The binary and
            // the library share the crate name.
            EnvFilter::new(format!("{}={level}", env!("CARGO_CRATE_NAME")))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

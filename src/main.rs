//! `fiscalqr` command-line entry point.
//!
//! Usage:
//!   fiscalqr scan <IMAGE>     - Decode a receipt photo and register its access key
//!   fiscalqr key <PAYLOAD>    - Extract and describe the access key of a decoded payload
//!   fiscalqr list             - Print the ledger with per-source counts

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fiscalqr::ledger::{StoreError, DEFAULT_LEDGER_PATH};
use fiscalqr::{
    CsvStore, KeyMatcher, KeyPolicy, ReceiptLedger, Registration, Scanner, SearchOptions, Source,
    SymbolPolicy,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fiscalqr", version, about = "Fiscal receipt QR reader and ledger")]
struct Cli {
    /// Log to stderr, filtered by RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a receipt image and register its access key
    Scan {
        image: PathBuf,

        #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
        ledger: PathBuf,

        /// camera, camera_manual or upload
        #[arg(long, default_value = "upload")]
        source: Source,

        /// Register every decoded symbol instead of the first one with a key
        #[arg(long)]
        all: bool,

        /// Accept only payloads starting with one of these prefixes
        #[arg(long = "authority", value_name = "PREFIX")]
        authorities: Vec<String>,

        #[arg(long, default_value_t = 12)]
        max_attempts: usize,
    },

    /// Extract the access key of an already decoded payload
    Key {
        payload: String,

        #[arg(long = "authority", value_name = "PREFIX")]
        authorities: Vec<String>,
    },

    /// List ledger contents
    List {
        #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
        ledger: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        init_logging();
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fiscalqr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn key_policy(authorities: Vec<String>) -> KeyPolicy {
    if authorities.is_empty() {
        KeyPolicy::Permissive
    } else {
        KeyPolicy::Authorities(authorities)
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Scan { image, ledger, source, all, authorities, max_attempts } => {
            let bytes = std::fs::read(&image)?;
            let ledger = Arc::new(ReceiptLedger::open_csv(&ledger)?);
            let scanner = Scanner::builder(ledger)
                .search_options(SearchOptions::new().max_attempts(max_attempts))
                .key_policy(key_policy(authorities))
                .symbol_policy(if all { SymbolPolicy::ProcessAll } else { SymbolPolicy::FirstOnly })
                .build();

            let report = scanner.scan_encoded(&bytes, source);
            let search = &report.search;
            match &search.method_used {
                Some(method) => println!(
                    "decoded {} symbol(s) with {method} after {} attempt(s) in {:?}",
                    search.results.len(),
                    search.attempts,
                    search.elapsed
                ),
                None => println!("no symbol after {} attempt(s)", search.attempts),
            }
            if let Some(warning) = search.lighting_warning() {
                println!("warning: {warning}");
            }

            for read in report.reads.iter() {
                match read {
                    Ok(Registration::Accepted(rec)) => println!("accepted  {}", rec.access_key),
                    Ok(Registration::Duplicate(key)) => println!("duplicate {key}"),
                    Err(e) => println!("rejected  {e}"),
                }
            }
        }

        Command::Key { payload, authorities } => {
            let key = KeyMatcher::with_policy(key_policy(authorities)).extract(&payload)?;
            println!("access key    {key}");
            println!("state         {}", key.state_code());
            println!("issued        {}", key.year_month());
            println!("cnpj          {}", key.cnpj());
            println!("model         {}", key.model());
            println!("series        {}", key.series());
            println!("number        {}", key.number());
            println!(
                "check digit   {} ({})",
                key.check_digit(),
                if key.check_digit_valid() { "valid" } else { "mismatch" }
            );
        }

        Command::List { ledger: path } => {
            let store = match CsvStore::open_existing(&path) {
                Ok(store) => store,
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    println!("no ledger at {}", path.display());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let ledger = ReceiptLedger::open(store)?;
            for rec in ledger.all() {
                println!(
                    "{}  {:<13}  {}",
                    rec.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    rec.source,
                    rec.access_key
                );
            }

            let summary = ledger.summary();
            println!("{} receipt(s)", summary.total);
            for source in Source::ALL {
                println!("  {:<13} {}", source.as_str(), summary.count(source));
            }
        }
    }

    Ok(())
}

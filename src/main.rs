//! `shelf`: resolve barcode scans against a JSON catalog.
//!
//! ```text
//! shelf --catalog items.json resolve SKU0099 ABC123
//! some-scanner-wedge | shelf --catalog items.json scan
//! ```

mod catalog;
mod error;

use crate::catalog::CatalogLookup;
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use serde_json::Value;
use shelf_config::Config;
use shelf_scan::error::{Error as ScanError, ErrorKind as ScanErrorKind};
use shelf_scan::{FeedbackHandle, NoFeedback, ResolvedItem, ScanHandler, Scanner, TerminalBell};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// The surface `scan` feeds standard input into.
const STDIN_SURFACE: &str = "stdin";

#[derive(Parser)]
#[command(name = "shelf", version, about = "Resolve barcode scans into inventory items")]
struct Cli {
    /// Config file (TOML, YAML or JSON), applied over the user config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more; repeat for even more. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// JSON object mapping codes to item payloads.
    #[arg(long)]
    catalog: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve each code and print its item.
    Resolve {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Treat every line on stdin as a scan terminated by Enter.
    Scan,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let lookup = CatalogLookup::open(&cli.catalog).await?;
    let feedback: FeedbackHandle = if config.feedback.bell { Arc::new(TerminalBell) } else { Arc::new(NoFeedback) };
    let scanner = Scanner::builder(config.scanner, Arc::new(lookup))
        .feedback(feedback)
        .build()
        .or_raise(|| ErrorKind::Scanner)?;
    let all_resolved = match &cli.command {
        Command::Resolve { codes } => resolve(&scanner, codes).await,
        Command::Scan => scan(&scanner).await?,
    };
    Ok(if all_resolved { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn resolve(scanner: &Scanner, codes: &[String]) -> bool {
    let mut all_resolved = true;
    for code in codes {
        let outcome = scanner.resolve(code).await;
        if let Err(err) = &outcome {
            tracing::debug!(code = %code, error = ?err, "Resolution failed");
        }
        all_resolved &= report(code, outcome.as_ref().map_err(|err| &**err));
    }
    all_resolved
}

type Outcome = std::result::Result<ResolvedItem, ScanErrorKind>;

/// Hands every resolution on the stdin surface back to the read loop.
struct Forward(mpsc::UnboundedSender<(String, Outcome)>);

impl ScanHandler for Forward {
    fn on_success(&self, item: &ResolvedItem, code: &str) {
        let _ = self.0.send((code.to_string(), Ok(item.clone())));
    }

    fn on_error(&self, error: &ScanError, code: &str) {
        let _ = self.0.send((code.to_string(), Err((**error).clone())));
    }
}

async fn scan(scanner: &Scanner) -> Result<bool> {
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    scanner.attach(STDIN_SURFACE, Forward(tx));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut all_resolved = true;
    while let Some(line) = lines.next_line().await.or_raise(|| ErrorKind::Stdin)? {
        if line.trim().is_empty() {
            continue;
        }
        if !scanner.on_terminal_key(STDIN_SURFACE, &line).or_raise(|| ErrorKind::Scanner)? {
            if scanner.is_in_progress(STDIN_SURFACE) == Some(true) {
                tracing::warn!(code = %line, "Previous scan still resolving; dropped");
                all_resolved = false;
            } else {
                tracing::warn!(code = %line, "Too short to be a code; ignored");
            }
            continue;
        }
        // The surface is idle again by the time its handler reports, so the
        // next line is never dropped by the single-flight guard.
        let Some((code, outcome)) = outcomes.recv().await else {
            break;
        };
        all_resolved &= report(&code, outcome.as_ref());
    }
    scanner.dispose(STDIN_SURFACE);
    Ok(all_resolved)
}

/// Print one outcome: items to stdout as `code<TAB>json`, failures to stderr.
fn report(code: &str, outcome: std::result::Result<&ResolvedItem, &ScanErrorKind>) -> bool {
    match outcome {
        Ok(item) => {
            println!("{code}\t{}", Value::Object(item.payload().clone()));
            true
        },
        Err(kind) => {
            eprintln!("{code}\t{kind}");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from(["shelf", "-vv", "--catalog", "items.json", "resolve", "SKU0099", "ABC123"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.catalog, PathBuf::from("items.json"));
        assert!(matches!(cli.command, Command::Resolve { ref codes } if codes == &["SKU0099", "ABC123"]));
    }

    #[test]
    fn test_resolve_needs_codes() {
        assert!(Cli::try_parse_from(["shelf", "--catalog", "items.json", "resolve"]).is_err());
    }

    #[test]
    fn test_catalog_is_required() {
        assert!(Cli::try_parse_from(["shelf", "scan"]).is_err());
    }

    #[tokio::test]
    async fn test_forward_relays_outcomes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let forward = Forward(tx);
        forward.on_error(&ScanError::from(ScanErrorKind::ShortCode("AB".into())), "AB");
        let (code, outcome) = rx.recv().await.unwrap();
        assert_eq!(code, "AB");
        assert_eq!(outcome.unwrap_err(), ScanErrorKind::ShortCode("AB".into()));
    }
}

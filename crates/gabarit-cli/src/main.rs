//! `gabarit` command line: fill a template from a base64-encoded JSON
//! payload.
//!
//! One subcommand per processor, all with the same shape:
//! `gabarit <processor> <template> <payload-b64> <output>`. Exit code 0 on
//! success, 1 on failure with a single human-readable line on stderr.
//! Input decoding and template loading are fatal before any output is
//! written; per-cell problems and repair failures are logged and skipped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use gabarit_model::FillRecord;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gabarit")]
#[command(about = "Fill DOCX/XLSX templates from a base64-encoded JSON payload.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill a contract document: placeholder substitution, strike-through
    /// rules, raw-markup repair.
    Docx(FillArgs),
    /// Substitute contract placeholders in every sheet of a workbook.
    Xlsx(FillArgs),
    /// Fill a merchandising workbook: tokens, then one bordered row per
    /// product under the located table header.
    Merch(FillArgs),
    /// Write the 21-column summary record into row 2 of the first sheet.
    Summary(FillArgs),
}

#[derive(Debug, Parser)]
struct FillArgs {
    /// Template to fill.
    template: PathBuf,
    /// Base64-encoded JSON object payload.
    payload: String,
    /// Output path, replaced atomically.
    output: PathBuf,
}

impl Command {
    fn processor(&self) -> &'static str {
        match self {
            Command::Docx(_) => "docx",
            Command::Xlsx(_) => "xlsx",
            Command::Merch(_) => "merch",
            Command::Summary(_) => "summary",
        }
    }

    fn args(&self) -> &FillArgs {
        match self {
            Command::Docx(args)
            | Command::Xlsx(args)
            | Command::Merch(args)
            | Command::Summary(args) => args,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let processor = cli.command.processor();
    let _guard = init_logging(processor);

    let args = cli.command.args();
    info!(
        processor,
        template = %args.template.display(),
        output = %args.output.display(),
        payload_len = args.payload.len(),
        "processing started"
    );

    let record = decode_payload(&args.payload)?;

    match &cli.command {
        Command::Docx(args) => {
            let report = gabarit_docx::fill_docx(&args.template, &record, &args.output)
                .context("docx fill failed")?;
            info!(
                blocks = report.blocks_scanned,
                edited = report.blocks_edited,
                struck = report.runs_struck,
                repaired = report.repair_applied,
                "contract document filled"
            );
        }
        Command::Xlsx(args) => {
            let report = gabarit_xlsx::fill_contract_xlsx(&args.template, &record, &args.output)
                .context("xlsx fill failed")?;
            info!(
                sheets = report.sheets,
                replaced = report.cells_replaced,
                merged_skipped = report.merged_skipped,
                "contract workbook filled"
            );
        }
        Command::Merch(args) => {
            let report = gabarit_xlsx::fill_merch_xlsx(&args.template, &record, &args.output)
                .context("merch fill failed")?;
            info!(
                sheets = report.sheets,
                replaced = report.cells_replaced,
                merged_skipped = report.merged_skipped,
                products = report.products,
                "merch workbook filled"
            );
        }
        Command::Summary(args) => {
            let report = gabarit_xlsx::fill_summary_xlsx(&args.template, &record, &args.output)
                .context("summary fill failed")?;
            info!(
                replaced = report.cells_replaced,
                merged_skipped = report.merged_skipped,
                "summary row written"
            );
        }
    }

    info!("processing completed");
    Ok(())
}

fn decode_payload(encoded: &str) -> Result<FillRecord> {
    let bytes = BASE64
        .decode(encoded.trim())
        .context("payload is not valid base64")?;
    let json = std::str::from_utf8(&bytes).context("decoded payload is not UTF-8")?;
    let value: serde_json::Value =
        serde_json::from_str(json).context("payload is not valid JSON")?;
    Ok(FillRecord::from_value(value).context("payload must be a JSON object")?)
}

/// Log to stdout and, when possible, to a per-invocation file under
/// `logs/`. A missing log directory downgrades to stdout-only.
fn init_logging(processor: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match open_log_file(processor) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        Err(err) => {
            registry.init();
            warn!(error = %err, "log file unavailable, logging to stdout only");
            None
        }
    }
}

fn open_log_file(processor: &str) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all("logs")?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::fs::File::create(format!("logs/gabarit-{processor}-{stamp}.log"))
}

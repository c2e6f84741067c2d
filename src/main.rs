use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use workbook_extract::cli::{self, ExtractOptions};
use workbook_extract::error::EXIT_USAGE;

#[derive(Parser)]
#[command(name = "extract")]
#[command(about = "Dump every sheet of a spreadsheet to a lossless JSON document.")]
#[command(long_about = "Extract - lossless spreadsheet to JSON

Reads every sheet of a workbook and writes one JSON document with, per cell:
value, formula, cached result, displayed text, number format, style and
data-validation rule, plus merge regions, column/row metadata and the
workbook's defined names.

FORMATS:
  .xlsx .xlsm .xltx .xltm   full fidelity
  .xls .xlsb .ods           values, formulas and defined names

EXIT CODES:
  0  success
  1  missing or invalid arguments
  2  the workbook could not be read or the output could not be written

EXAMPLES:
  extract grades.xlsx                  # writes grades.raw.json here
  extract grades.xlsx out/grades.json
  extract grades.xlsx --compact -v")]
#[command(version)]
struct Cli {
    /// Spreadsheet file to read
    input: PathBuf,

    /// Output JSON path (default: <input-name>.raw.json in the current directory)
    output: Option<PathBuf>,

    /// Write single-line JSON instead of indented output
    #[arg(long, env = "EXTRACT_COMPACT")]
    compact: bool,

    /// Log per-sheet progress to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    /// Do not print the success line
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "workbook_extract=debug"
    } else {
        "workbook_extract=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE as u8),
            };
        }
    };

    init_logging(cli.verbose);

    let options = ExtractOptions {
        pretty: !cli.compact,
        quiet: cli.quiet,
    };

    match cli::extract(cli.input, cli.output, options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "❌ Error:".bold().red(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

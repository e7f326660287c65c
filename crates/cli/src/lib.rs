pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pricepromo",
    about = "PricePromo pricing and promotion CLI",
    long_about = "Enrich product tables with pricing metrics and promotion recommendations, inspect configuration, and check readiness.",
    after_help = "Examples:\n  pricepromo process products.csv --view simple\n  pricepromo process products.xlsx --output enriched.json\n  pricepromo doctor --json\n  pricepromo config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Process a product table and write the enriched result")]
    Process {
        #[arg(help = "Input table (.csv, .xlsx or .json)")]
        input: PathBuf,
        #[arg(long, short, help = "Output path; defaults to <input>_enriched.<format>")]
        output: Option<PathBuf>,
        #[arg(long, help = "Output format: csv, xlsx or json")]
        format: Option<String>,
        #[arg(long, default_value = "full", help = "Output columns: full or simple")]
        view: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, holiday calendar and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one short test prompt to the configured LLM service")]
    LlmCheck,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Process { input, output, format, view } => {
            commands::process::run(commands::process::ProcessArgs { input, output, format, view })
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::LlmCheck => commands::llm_check::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

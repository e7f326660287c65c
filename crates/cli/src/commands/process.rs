use std::fs;
use std::path::{Path, PathBuf};

use pricepromo_agent::RecommendationStrategy;
use pricepromo_core::config::{AppConfig, LoadOptions};
use pricepromo_core::domain::enriched::TableView;
use pricepromo_core::errors::{PipelineError, TableError};
use pricepromo_core::metrics::MetricsSettings;
use pricepromo_core::pipeline::PricingPipeline;
use pricepromo_core::{decode_table, encode_table, TableFormat};

use crate::commands::{init_logging, CommandResult};

const COMMAND: &str = "process";

#[derive(Debug, Clone)]
pub struct ProcessArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub view: String,
}

pub fn run(args: ProcessArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    run_with_config(&config, args)
}

pub fn run_with_config(config: &AppConfig, args: ProcessArgs) -> CommandResult {
    init_logging(config);

    let view: TableView = match args.view.parse() {
        Ok(view) => view,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_argument", error.to_string(), 1);
        }
    };
    let input_format = match TableFormat::from_path(&args.input) {
        Ok(format) => format,
        Err(error) => {
            return CommandResult::failure(COMMAND, "unsupported_format", error.to_string(), 5);
        }
    };
    let output_format = match output_format(&args, input_format) {
        Ok(format) => format,
        Err(error) => {
            return CommandResult::failure(COMMAND, "unsupported_format", error.to_string(), 5);
        }
    };
    let output_path =
        args.output.clone().unwrap_or_else(|| default_output_path(&args.input, output_format));

    let bytes = match fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "io",
                format!("could not read `{}`: {error}", args.input.display()),
                4,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let raw = decode_table(&bytes, input_format)?;
        let strategy = RecommendationStrategy::from_config(&config.llm);
        let pipeline =
            PricingPipeline::new(MetricsSettings::from_config(&config.pipeline), strategy);
        pipeline.process(&raw).await
    });

    let table = match result {
        Ok(table) => table,
        Err(error) => {
            let (error_class, exit_code) = classify(&error);
            return CommandResult::failure(COMMAND, error_class, error.to_string(), exit_code);
        }
    };

    let encoded = match encode_table(&table, view, output_format) {
        Ok(encoded) => encoded,
        Err(error) => return CommandResult::failure(COMMAND, "export", error.to_string(), 7),
    };
    if let Err(error) = fs::write(&output_path, encoded) {
        return CommandResult::failure(
            COMMAND,
            "io",
            format!("could not write `{}`: {error}", output_path.display()),
            4,
        );
    }

    CommandResult::success(
        COMMAND,
        format!(
            "processed {} rows ({} degraded) with {} recommendations; wrote {} ({}, {} view, run {})",
            table.len(),
            table.degraded_rows(),
            table.strategy,
            output_path.display(),
            output_format,
            view.as_str(),
            table.correlation_id,
        ),
    )
}

fn output_format(
    args: &ProcessArgs,
    input_format: TableFormat,
) -> Result<TableFormat, pricepromo_core::UnsupportedFormatError> {
    if let Some(format) = args.format.as_deref() {
        return format.parse();
    }
    match args.output.as_deref() {
        Some(path) => TableFormat::from_path(path),
        None => Ok(input_format),
    }
}

fn default_output_path(input: &Path, format: TableFormat) -> PathBuf {
    let stem = input.file_stem().and_then(|stem| stem.to_str()).unwrap_or("products");
    input.with_file_name(format!("{stem}_enriched.{format}"))
}

fn classify(error: &PipelineError) -> (&'static str, u8) {
    match error {
        PipelineError::MissingColumns(_) => ("missing_columns", 6),
        PipelineError::Table(TableError::UnsupportedFormat(_)) => ("unsupported_format", 5),
        PipelineError::Table(_) => ("invalid_input", 6),
        PipelineError::NoData(_) => ("no_data", 6),
    }
}

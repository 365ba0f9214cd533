pub mod cli;
pub mod config;
pub mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Args;
use pipeline::batch::{discover_subjects, BatchRunner};
use pipeline::shell::ProcessRunner;
use pipeline::tools::ToolConfig;

/// Process entry: parse arguments, run the batch, map the outcome to an
/// exit status.
pub fn run() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match run_batch(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Batch failed");
            ExitCode::FAILURE
        }
    }
}

fn run_batch(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let params = args.to_parameters()?;
    let tools = ToolConfig::from_env();

    let subjects = discover_subjects(
        &args.input_dir,
        &args.output_dir,
        &args.pattern,
        config::OUTPUT_SUFFIX,
    )?;
    if subjects.is_empty() {
        tracing::warn!(
            input = %args.input_dir.display(),
            pattern = %args.pattern,
            "No input masks matched"
        );
        return Ok(());
    }

    let no_fail = params.no_fail;
    let runner = BatchRunner::new(params, tools, Box::new(ProcessRunner), args.threads);
    let summary = runner.run(&subjects)?;
    summary.into_result(no_fail)?;
    Ok(())
}

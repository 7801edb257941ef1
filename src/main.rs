use std::process::ExitCode;

use anyhow::{Context, Result};
use campaign_imagegen::catalog::PromptCatalog;
use campaign_imagegen::cli::CliOptions;
use campaign_imagegen::client::ImageClient;
use campaign_imagegen::config::{GeneratorConfig, setup_logging};
use campaign_imagegen::runner::Runner;
use clap::Parser;
use tracing::error;

fn load_catalog(cli: &CliOptions) -> Result<PromptCatalog> {
    let catalog = match &cli.prompts {
        Some(path) => PromptCatalog::from_path(path)
            .with_context(|| format!("Failed to load prompts from {}", path.display()))?,
        None => PromptCatalog::bundled().context("Bundled prompt catalog is invalid")?,
    };
    if cli.only.is_empty() {
        Ok(catalog)
    } else {
        Ok(catalog.select(&cli.only)?)
    }
}

async fn run(cli: &CliOptions) -> Result<ExitCode> {
    let catalog = load_catalog(cli)?;

    if cli.list {
        for entry in &catalog {
            println!("{}", entry.id);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = GeneratorConfig::from_cli(cli)?;
    let output_dir = config.output_dir.clone();
    let client = ImageClient::new(config).context("Failed to build HTTP client")?;

    let rule = "=".repeat(60);
    println!("{rule}");
    println!("CAMPAIGN IMAGE GENERATION");
    println!("{rule}");
    println!("Output directory: {}", output_dir.display());
    println!("Total prompts: {}", catalog.len());
    println!("{rule}");

    let report = Runner::new(client).run(&catalog).await;

    println!("\n{report}");
    println!("\nImages saved to: {}", output_dir.display());

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

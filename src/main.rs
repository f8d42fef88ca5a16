// src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info};

use webposture::core::errors::ClassifiedError;
use webposture::{AnalyzeOptions, AnalyzerConfig, SecurityAnalyzer};

mod logging;

/// Grade the security posture of a web endpoint.
#[derive(Debug, Parser)]
#[command(name = "webposture", version, about)]
struct Cli {
    /// URL or bare host name to analyze.
    url: String,

    #[arg(long)]
    no_ssl: bool,
    #[arg(long)]
    no_headers: bool,
    #[arg(long)]
    no_cookies: bool,
    #[arg(long)]
    no_html: bool,

    /// Only validate and normalize the URL, without fetching it.
    #[arg(long)]
    validate_only: bool,

    /// JSON file with analyzer settings; missing fields keep their defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print single-line JSON.
    #[arg(long)]
    compact: bool,

    /// Mirror log output to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            check_cookies: !self.no_cookies,
            check_ssl: !self.no_ssl,
            check_headers: !self.no_headers,
            check_html: !self.no_html,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("could not read config file {}", path.display()))?;
            serde_json::from_str(&raw).wrap_err_with(|| format!("invalid config file {}", path.display()))
        }
        None => Ok(AnalyzerConfig::default()),
    }
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let out = if compact { serde_json::to_string(value)? } else { serde_json::to_string_pretty(value)? };
    println!("{}", out);
    Ok(())
}

fn print_failure(classified: &ClassifiedError) {
    eprintln!("error: {}", classified.user_message);
    for suggestion in &classified.suggestions {
        eprintln!("  - {}", suggestion);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_path = logging::initialize_logging(cli.verbose)?;
    info!(log = %log_path.display(), "webposture starting.");

    let config = load_config(cli.config.as_ref())?;
    let analyzer = SecurityAnalyzer::new(config)?;

    if cli.validate_only {
        return match analyzer.validate_url(&cli.url).await {
            Ok(normalized) => {
                print_json(&normalized, cli.compact)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(failure) => {
                error!(error = %failure, "Validation failed.");
                print_failure(&failure.classified());
                Ok(ExitCode::FAILURE)
            }
        };
    }

    match analyzer.analyze(&cli.url, cli.options()).await {
        Ok(report) => {
            print_json(&report, cli.compact)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Analysis failed.");
            print_failure(&e.classified());
            Ok(ExitCode::FAILURE)
        }
    }
}

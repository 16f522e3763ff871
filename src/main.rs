mod classify;
mod config;
mod extract;
mod http;
mod lens;
mod metrics;
mod models;
mod pipeline;
mod report;
mod snapshot;

use clap::Parser;
use config::{ConfigError, DEFAULT_IMAGE_URL, LensConfig, parse_mode};
use models::SearchMode;
use pipeline::Pipeline;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

const EXIT_PIPELINE_FAILURE: u8 = 1;
// sysexits EX_CONFIG
const EXIT_CONFIG: u8 = 78;

#[derive(Parser)]
#[command(
    name = "lens-scout",
    about = "Reverse image search through Google Lens, filtered to Amazon matches"
)]
struct Cli {
    /// Publicly reachable URL of the image to search for
    #[arg(default_value = DEFAULT_IMAGE_URL, value_parser = parse_image_url)]
    image_url: String,
    /// `direct` (one request) or `expanded` (page-token product search)
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<SearchMode>,
    /// Language sent as `hl` in expanded mode
    #[arg(long)]
    locale: Option<String>,
    /// Country sent as `country` in expanded mode
    #[arg(long)]
    region: Option<String>,
    /// Directory for the JSON snapshot
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Print the full report as JSON instead of the text summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, mut config: LensConfig) -> LensConfig {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(locale) = &self.locale {
            config.locale = locale.clone();
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = dir.clone();
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(target: "lens.cli", "lens-scout crashed: {err:#}");
            eprintln!("Unexpected error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> eyre::Result<ExitCode> {
    let config = match LensConfig::load() {
        Ok(config) => cli.apply(config),
        Err(err) => return Ok(config_failure(&err)),
    };
    info!(target: "lens.cli", config = ?config, "configuration loaded");

    let mode = config.mode;
    let pipeline = Pipeline::new(config)?;
    if !cli.json {
        println!("Starting Google Lens {} search for image: {}", mode.as_str(), cli.image_url);
    }

    match pipeline.run(&cli.image_url).await {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report::render_summary(&report));
                println!("\nSearch completed successfully!");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(
                target: "lens.pipeline",
                stage = err.stage(),
                kind = ?err.kind(),
                error = %err,
                "lens search failed"
            );
            eprintln!("{}", report::render_failure(&err));
            Ok(ExitCode::from(EXIT_PIPELINE_FAILURE))
        }
    }
}

fn config_failure(err: &ConfigError) -> ExitCode {
    error!(target: "lens.cli", error = %err, "configuration invalid");
    eprintln!("Configuration error: {err}");
    ExitCode::from(EXIT_CONFIG)
}

// Validated only; the provider receives the url as typed.
fn parse_image_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    let parsed = reqwest::Url::parse(trimmed).map_err(|err| format!("invalid image url: {err}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme: {}", parsed.scheme()));
    }
    Ok(trimmed.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_must_be_http() {
        assert!(parse_image_url("https://i.imgur.com/8VmjcR5.png").is_ok());
        assert!(parse_image_url("file:///etc/passwd").is_err());
        assert!(parse_image_url("not a url").is_err());
    }

    #[test]
    fn image_url_is_passed_through_unnormalized() {
        assert_eq!(
            parse_image_url("  https://IMG.Example/photos/desk lamp.png?size=L  "),
            Ok("https://IMG.Example/photos/desk lamp.png?size=L".to_string())
        );
    }

    #[test]
    fn cli_overrides_environment() {
        let cli = Cli::parse_from([
            "lens-scout",
            "https://img.example/a.png",
            "--mode",
            "direct",
            "--snapshot-dir",
            "snaps",
        ]);
        let base = LensConfig::from_lookup(|key| match key {
            "SERPAPI_KEY" => Ok("k".to_string()),
            _ => Err(std::env::VarError::NotPresent),
        })
        .expect("config");
        let config = cli.apply(base);
        assert_eq!(config.mode, SearchMode::Direct);
        assert_eq!(config.snapshot_dir, PathBuf::from("snaps"));
        assert_eq!(config.locale, "en");
        assert_eq!(cli.image_url, "https://img.example/a.png");
    }

    #[test]
    fn default_image_is_used() {
        let cli = Cli::parse_from(["lens-scout"]);
        assert_eq!(cli.image_url, DEFAULT_IMAGE_URL);
        assert!(cli.mode.is_none());
        assert!(!cli.json);
    }
}

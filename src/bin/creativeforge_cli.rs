//! CreativeForge CLI
//!
//! Commands: ratios, compile, check-legal, check-brand
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on compliance failure, 1 on error

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use creativeforge_core::{
    export_png, ComplianceChecker, ConfigError, CreativePipeline, CreativeRequest, PipelineConfig,
    PipelineError, TextPosition,
};

#[derive(Parser)]
#[command(name = "creativeforge-cli")]
#[command(about = "CreativeForge CLI - Creative Variant Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON pipeline config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered aspect ratios
    Ratios,

    /// Crop, caption and check one image
    Compile {
        #[arg(short, long)]
        image: PathBuf,

        #[arg(short, long)]
        message: String,

        /// Region-specific message, replaces --message
        #[arg(short, long)]
        localized: Option<String>,

        /// Comma-separated ratio ids, e.g. 1:1,9:16
        #[arg(short, long, value_delimiter = ',')]
        ratios: Option<Vec<String>>,

        #[arg(short, long)]
        position: Option<TextPosition>,

        /// Embed base64 PNGs in the output
        #[arg(long)]
        inline: bool,
    },

    /// Screen text for prohibited terms
    CheckLegal {
        #[arg(short, long)]
        text: String,
    },

    /// Check an image for brand logo and colors
    CheckBrand {
        #[arg(short, long)]
        image: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to open image {0}: {1}")]
    Image(String, image::ImageError),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Pipeline(e.into())
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "creativeforge_core=debug" } else { "creativeforge_core=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!("{}", serde_json::json!({"success": false, "error": e.to_string()})),
    }
}

fn open_image(path: &Path) -> Result<image::DynamicImage, CliError> {
    image::open(path).map_err(|e| CliError::Image(path.display().to_string(), e))
}

fn load_pipeline(config: Option<&Path>) -> Result<CreativePipeline, CliError> {
    let config = match config {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::default(),
    };
    Ok(CreativePipeline::new(config)?)
}

fn passed_code(passed: bool) -> ExitCode {
    if passed { ExitCode::SUCCESS } else { ExitCode::from(2) }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let pipeline = load_pipeline(cli.config.as_deref())?;

    match cli.command {
        Commands::Ratios => {
            let ratios: Vec<_> = pipeline.compositor().registry().list()
                .iter()
                .map(|r| serde_json::json!({
                    "id": r.id,
                    "value": r.value(),
                    "anchor": r.anchor,
                }))
                .collect();
            print_json(&ratios);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Compile { image, message, localized, ratios, position, inline } => {
            let source = open_image(&image)?;
            let request = CreativeRequest {
                message,
                localized_message: localized,
                aspect_ratios: ratios,
                position,
            };
            let creative = pipeline.compile(&source, &request)?;
            let passed = creative.passed();

            let exports = if inline {
                creative.variants.iter().map(export_png).collect::<Result<Vec<_>, _>>()?
            } else {
                Vec::new()
            };
            print_json(&serde_json::json!({
                "success": true,
                "passed": passed,
                "creative": creative,
                "exports": exports,
            }));
            Ok(passed_code(passed))
        }

        Commands::CheckLegal { text } => {
            let result = checker(&pipeline).check_legal(&text);
            print_json(&result);
            Ok(passed_code(result.passed))
        }

        Commands::CheckBrand { image } => {
            let source = open_image(&image)?;
            let result = checker(&pipeline)
                .check_brand(&source)
                .map_err(PipelineError::from)?;
            print_json(&result);
            Ok(passed_code(result.passed))
        }
    }
}

/// Standalone checks run the configured policy even when the pipeline has
/// compliance switched off.
fn checker(pipeline: &CreativePipeline) -> ComplianceChecker {
    match pipeline.checker() {
        Some(c) => c.clone(),
        None => {
            let compliance = &pipeline.config().compliance;
            ComplianceChecker::new(compliance.brand.clone(), compliance.legal.clone())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            let output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
            });
            println!("{}", output);
            ExitCode::FAILURE
        }
    }
}

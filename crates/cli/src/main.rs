//! `aigc` -- command-line client for the AIGC image-generation service.
//!
//! Submits a prompt, waits for the task to finish, and saves every image
//! the service returns. Default image size comes from the preferences
//! file; service endpoints and polling limits come from the environment
//! (see [`GeneratorConfig::from_env`]), and flags override both.
//!
//! # Environment variables
//!
//! | Variable   | Default                                  | Description        |
//! |------------|------------------------------------------|--------------------|
//! | `RUST_LOG` | `aigc_cli=info,aigc_client=info`         | Log filter         |
//! | `AIGC_*`   | see [`GeneratorConfig::from_env`]        | Service and limits |

mod args;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aigc_client::{Generator, GeneratorConfig, WorkflowError};
use aigc_core::settings::Preferences;
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::{Cli, Command, GenerateArgs, SettingsArgs};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aigc_cli=info,aigc_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => match generate(&cli.settings, &args).await {
            Ok(paths) => {
                for path in &paths {
                    println!("{}", path.display());
                }
                println!("Successfully generated {} images", paths.len());
                ExitCode::SUCCESS
            }
            Err(e) => {
                // A workflow error already names its cause.
                match e.downcast_ref::<WorkflowError>() {
                    Some(workflow) => eprintln!("Failed to generate image: {workflow}"),
                    None => eprintln!("Failed to generate image: {e:#}"),
                }
                ExitCode::FAILURE
            }
        },
        Command::Settings(args) => match settings(&cli.settings, &args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to update settings: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Run one generation and return the saved paths.
async fn generate(settings_path: &Path, args: &GenerateArgs) -> anyhow::Result<Vec<PathBuf>> {
    let prefs = Preferences::load_or_init(settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;
    let dimensions = args.dimensions(&prefs);

    let mut config = GeneratorConfig::from_env().context("Invalid environment configuration")?;
    args.apply_overrides(&mut config);

    tracing::info!(
        width = dimensions.width,
        height = dimensions.height,
        output_dir = %config.output_dir.display(),
        max_attempts = config.poll.max_attempts,
        "Starting image generation",
    );

    let generator = Generator::new(config).context("Failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling generation");
                cancel.cancel();
            }
        }
    });

    let result = generator
        .generate_with_cancel(&args.prompt, dimensions.width, dimensions.height, &cancel)
        .await;
    interrupt.abort();

    Ok(result?)
}

/// Print the stored preferences, saving first if any flag changed them.
fn settings(settings_path: &Path, args: &SettingsArgs) -> anyhow::Result<()> {
    let mut prefs = Preferences::load_or_init(settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;

    if args.apply(&mut prefs) {
        prefs
            .save(settings_path)
            .with_context(|| format!("Failed to save {}", settings_path.display()))?;
        tracing::info!(path = %settings_path.display(), "Preferences updated");
    }

    println!("Settings file: {}", settings_path.display());
    println!("width = {}", prefs.width);
    println!("height = {}", prefs.height);
    println!("compression_quality = {}", prefs.compression_quality);
    Ok(())
}

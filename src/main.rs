//! srtlate - Streaming SRT Subtitle Translation
//!
//! Command-line entry point: loads configuration, sets up logging and
//! dispatches to the translation workflow.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use srtlate::cli::{Args, Commands, ConfigAction, JobAction};
use srtlate::config::Config;
use srtlate::error::SubtitleError;
use srtlate::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Config { action: ConfigAction::Init { output, force } } => {
            if output.exists() && !force {
                return Err(SubtitleError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                ))
                .into());
            }
            Config::default().save_to_file(&output)?;
            eprintln!("Wrote default configuration to {}", output.display());
        }
        Commands::Plan { input } => {
            let workflow = Workflow::new(config)?;
            let groups = workflow.plan_file(&input).await?;

            println!("{:<8} {:<10} {:<10} {:<30}", "Group", "Segments", "Tokens", "First cue");
            println!("{}", "-".repeat(60));
            for (idx, group) in groups.iter().enumerate() {
                let first = group
                    .segments
                    .first()
                    .map(|s| preview(&s.text, 27))
                    .unwrap_or_default();
                println!("{:<8} {:<10} {:<10} {:<30}", idx + 1, group.segments.len(), group.tokens, first);
            }
            let total: usize = groups.iter().map(|g| g.segments.len()).sum();
            println!("\n{} segments in {} requests", total, groups.len());
        }
        Commands::Translate { input, language, output } => {
            let workflow = Workflow::new(config)?;
            let count = workflow.translate_file(&input, &language, output.as_deref()).await?;
            info!("Translated {} cues from {}", count, input.display());
        }
        Commands::Batch { input_dir, language, output_dir } => {
            let workflow = Workflow::new(config)?;
            let summary = workflow
                .translate_directory(&input_dir, &language, output_dir.as_deref())
                .await?;
            eprintln!(
                "Translated {} files, {} failed",
                summary.translated, summary.failed
            );
        }
        Commands::Job { action } => {
            let workflow = Workflow::new(config)?;
            match action {
                JobAction::Create { input, language, payment_ref } => {
                    let job = workflow.create_job(&input, &language, &payment_ref).await?;
                    println!("{}", job.id);
                }
                JobAction::Show { id } => {
                    let job = workflow.load_job(id).await?;
                    print!("{}", job.content);
                }
                JobAction::Run { id, output } => {
                    let count = workflow.run_job(id, output.as_deref()).await?;
                    info!("Job {} translated {} cues", id, count);
                }
            }
        }
    }

    Ok(())
}

/// Setup logging to stderr and a daily log file. Stdout is reserved for
/// translated subtitles.
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".srtlate").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "srtlate.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("srtlate.log").display());

    Ok(guard)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

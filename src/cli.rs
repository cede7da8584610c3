use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a subtitle file, streaming cues as they are translated
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Target language (e.g. "French", "Brazilian Portuguese")
        #[arg(short, long)]
        language: String,

        /// Output file; cues go to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate every SRT file in a directory
    Batch {
        /// Input directory containing subtitle files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Target language
        #[arg(short, long)]
        language: String,

        /// Output directory for translated files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show how a file would be split into requests, without translating
    Plan {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Manage stored translation jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum JobAction {
    /// Store a subtitle file as a new job
    Create {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Target language
        #[arg(short, long)]
        language: String,

        /// Payment reference issued at checkout
        #[arg(short, long, default_value = "")]
        payment_ref: String,
    },

    /// Print the original content of a job
    Show {
        /// Job identifier
        id: Uuid,
    },

    /// Translate a stored job once its payment is authorized
    Run {
        /// Job identifier
        id: Uuid,

        /// Output file; cues go to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

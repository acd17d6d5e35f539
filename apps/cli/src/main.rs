//! Prism CLI - Command-line interface for multi-model report generation
//!
//! This CLI provides a `prism` command that fans a topic out to several
//! language models, renders their reports, and manages the saved-report
//! archive and the local knowledge base.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{archive, chat, generate, ingest};

/// Prism CLI - Multi-model analytical reports
#[derive(Parser, Debug)]
#[command(
    name = "prism",
    author,
    version,
    about = "Prism - Multi-model analytical report generation",
    long_about = "Prism (prism) asks several language models for the same analytical report in parallel,\nrenders each answer to markdown, and keeps an archive of saved reports searchable by topic."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Configuration file (skips ~/.prism/config.toml and ./prism.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one report per model
    ///
    /// Runs query expansion, knowledge retrieval and report generation for
    /// every selected model concurrently and prints each rendered report.
    Generate {
        /// Report topic
        topic: String,

        /// Model identifier (repeatable; defaults to the configured selection)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Template file (.md, .txt or .docx) with formatting instructions
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Archive every successful report
        #[arg(long)]
        save: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat with a model by alias (gemini, deepseek, qwen)
    Chat {
        /// Model alias
        #[arg(short, long, default_value = "deepseek")]
        model: String,

        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,

        /// Message to send
        message: String,
    },

    /// Save a markdown report to the archive
    Save {
        /// Topic the report was generated for
        #[arg(long)]
        topic: String,

        /// Model that produced the report
        #[arg(long)]
        model: String,

        /// Markdown file to save
        file: PathBuf,
    },

    /// List saved report themes
    Themes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List saved reports of a theme, newest first
    List {
        /// Theme name
        theme: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a saved report
    Show {
        /// Report id
        id: i64,
    },

    /// Find saved reports with a similar topic
    Similar {
        /// Topic to compare against
        topic: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a directory of documents into the knowledge base
    ///
    /// Reads .md, .markdown and .txt files recursively, splits them into
    /// chunks and replaces the knowledge base with their embeddings.
    Ingest {
        /// Directory to ingest
        dir: PathBuf,
    },
}

fn parse_level(name: &str) -> Level {
    match name {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = config::load_settings(args.config.as_deref())?;

    let level_name = args.log_level.as_deref().or(settings.log_level.as_deref()).unwrap_or("info");
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level_name))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Generate { topic, models, template, save, json } => {
            generate::execute(&settings, &topic, models, template.as_deref(), save, json).await?;
        }
        Command::Chat { model, system, message } => {
            chat::execute(&settings, &model, system, message).await?;
        }
        Command::Save { topic, model, file } => {
            archive::save(&settings, &topic, &model, &file).await?;
        }
        Command::Themes { json } => {
            archive::themes(&settings, json)?;
        }
        Command::List { theme, json } => {
            archive::list(&settings, &theme, json)?;
        }
        Command::Show { id } => {
            archive::show(&settings, id)?;
        }
        Command::Similar { topic, json } => {
            archive::similar(&settings, &topic, json).await?;
        }
        Command::Ingest { dir } => {
            ingest::execute(&settings, &dir).await?;
        }
    }

    Ok(())
}

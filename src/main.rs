//! CLI entry point for the semantic passage retrieval service.
//!
//! Provides commands for querying a corpus file and inspecting the active
//! configuration. The index is rebuilt from the corpus on every invocation;
//! persistence across runs is deliberately out of scope.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use semrank::{OpenAiEmbedder, RetrievalService, Settings};
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic passage retrieval
#[derive(Parser)]
#[command(
    name = "semrank",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic passage retrieval over embedded document corpora",
    long_about = "Embed a corpus of passages, build an exact nearest-neighbor index, \
                  and rank passages by similarity to a question.",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom semrank.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Rank corpus passages by similarity to a question
    #[command(about = "Embed a corpus file and retrieve the k nearest passages")]
    Query {
        /// Text file containing passages separated by blank lines
        corpus: PathBuf,

        /// The question to retrieve passages for
        question: String,

        /// Number of passages to return (defaults to search.default_k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Display active settings
    #[command(about = "Print the resolved configuration as TOML")]
    Config,
}

/// Splits a corpus file into passages on blank lines. Lines within one
/// passage are joined with spaces; empty blocks are discarded here at the
/// ingestion boundary so they never reach the embedder.
fn split_passages(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|block| {
            block
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|passage| !passage.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if settings.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        Commands::Query {
            corpus,
            question,
            k,
        } => {
            let text = std::fs::read_to_string(&corpus)
                .with_context(|| format!("failed to read corpus file '{}'", corpus.display()))?;
            let passages = split_passages(&text);
            if passages.is_empty() {
                bail!("no passages found in '{}'", corpus.display());
            }

            let embedder = Arc::new(OpenAiEmbedder::from_config(&settings.embedding)?);
            let service = RetrievalService::new(embedder);
            service.rebuild(passages).await?;

            let k = k.unwrap_or(settings.search.default_k);
            let results = service.query(&question, k).await?;
            for (rank, scored) in results.iter().enumerate() {
                println!(
                    "{:>2}. (distance {:.4}) {}",
                    rank + 1,
                    scored.distance,
                    scored.text
                );
            }
        }
    }

    Ok(())
}

//! # Study Retrieval CLI (`study`)
//!
//! Builds the vector index over the lesson and book corpus, runs searches
//! against it, and serves the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study build` | Embed the corpus and write the index artifacts |
//! | `study search "<query>"` | Search the index |
//! | `study status` | Show whether the artifacts load, and their size |
//! | `study serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Build with the offline hashing embedder
//! study build --config ./config/study.toml
//!
//! # Top 3 book passages about faith
//! study search "faith" --top-k 3 --type book
//!
//! # Debug logging for one run
//! STUDY_LOG=study_retrieval=debug study search "grace"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use study_retrieval::search::TypeFilter;
use study_retrieval::{build, config, search, server, store};

/// Study Retrieval: semantic search over lesson and book study material.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/study.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Retrieval: semantic search over lesson and book study material",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/study.toml`. Corpus, index, embedding,
    /// retrieval, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Embed the corpus and write the index artifacts.
    ///
    /// Walks the lesson and book collections, embeds every chunk with the
    /// configured provider, and replaces the index and metadata files.
    /// An empty corpus leaves existing artifacts untouched.
    Build,

    /// Search the index.
    ///
    /// Results are filtered by type and sorted by normalized score, best first.
    Search {
        /// The search query.
        query: String,

        /// Number of nearest neighbors to fetch (default: retrieval.default_top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Result type: all, lesson, or book.
        #[arg(long = "type", default_value = "all")]
        kind: String,
    },

    /// Show whether the artifacts load, with chunk count and dimensions.
    Status,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("STUDY_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => {
            build::run_build(&cfg).await?;
        }
        Commands::Search { query, top_k, kind } => {
            let filter = TypeFilter::parse_lenient(Some(&kind));
            search::run_search(&cfg, &query, top_k, filter).await?;
        }
        Commands::Status => {
            store::run_status(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

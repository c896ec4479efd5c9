//! CLI module for DocQA
//!
//! Provides command-line interface parsing for the docqa-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DocQA - grounded question answering over your documents
#[derive(Parser, Debug)]
#[command(
    name = "docqa-server",
    version,
    about = "DocQA - grounded question answering over your documents",
    long_about = "Indexes text documents into a vector database and answers questions\n\
                  using only the retrieved passages.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  docqa-server                          # Start the server (uses docqa.toml if present)\n    \
                  docqa-server ingest notes.txt faq.txt # Index documents without the server\n    \
                  docqa-server ask \"When is rent due?\"  # Ask a question from the terminal\n    \
                  docqa-server config --validate        # Check the effective configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "docqa.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (the default)
    Serve,

    /// Index UTF-8 text files into the collection
    Ingest {
        /// Files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a single question against the indexed collection
    ///
    /// Only documents ingested in this process count toward the cache
    /// fingerprint; retrieval searches the whole collection.
    Ask {
        /// The question
        question: String,

        /// Number of passages to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show the effective configuration
    Config {
        /// Only validate, do not print
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

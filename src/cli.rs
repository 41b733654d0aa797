use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "boilerkb",
    about = "Question answering over boiler maintenance documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable embeddings; every search matches by keyword
    #[arg(long, global = true)]
    pub keyword_only: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, tag and index a document directory
    Index(IndexArgs),
    /// Answer a question from the indexed documents
    Query(QueryArgs),
    /// Hybrid search without answer generation
    Search(SearchArgs),
    /// Show record count, backend and sample sources
    Stats(JsonArgs),
    /// Show service health and configuration
    Status(JsonArgs),
    /// Remove every indexed record
    Clear,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Document directory (defaults to documents/ in the data directory)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Rebuild even when the index is already populated
    #[arg(long)]
    pub force: bool,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The question
    pub question: String,

    /// Maximum context length in characters
    #[arg(long)]
    pub max_context: Option<usize>,

    /// Skip generation once this many milliseconds have elapsed
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output the full response as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "6")]
    pub count: usize,

    /// Minimum final score threshold
    #[arg(long, default_value = "0.0")]
    pub min_score: f32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "boilerkb",
            &mut std::io::stdout(),
        );
    }
}

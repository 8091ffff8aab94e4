use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use vectorq::Dialect;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors (default)
    Warn,
    /// Informational messages
    Info,
    /// Render start/finish events
    Debug,
    /// Every filter node visited
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "vq")]
#[command(about = "vq - render vector database queries from a provider-agnostic IR")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (TOML)
    #[arg(short = 'C', long, global = true, env = "VECTORQ_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Effective log level: explicit level, then --verbose, then warn
    pub fn level(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::WARN,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a query and render it for one backend
    Render {
        /// Target backend (pinecone, qdrant, milvus, weaviate)
        #[arg(short, long)]
        dialect: Dialect,

        /// Query IR as JSON; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        query: PathBuf,

        /// Print only the backend document, without required params
        #[arg(long)]
        raw: bool,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a query against the configured limits
    Validate {
        /// Query IR as JSON; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        query: PathBuf,
    },

    /// Show what a backend supports
    Capabilities {
        /// Target backend (pinecone, qdrant, milvus, weaviate)
        #[arg(short, long)]
        dialect: Dialect,
    },

    /// Print the effective configuration as TOML
    Config,
}

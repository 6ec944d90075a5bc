//! CLI module for zoneqa
//!
//! Provides command-line interface parsing and handling for the zoneqa binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use crate::types::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// zoneqa - Zoning regulation question answering
///
/// Answers questions about what may be built at a location, grounded in the
/// articles of the municipal zoning regulation.
#[derive(Parser, Debug)]
#[command(
    name = "zoneqa",
    version,
    about = "zoneqa - Zoning regulation question answering",
    long_about = "Answers questions about a location's zoning, grounded in the articles of the\n\
                  municipal regulation. Build the corpus once with 'build', then ask questions.",
    after_help = "EXAMPLES:\n    \
                  zoneqa build regulamento.pdf                          # Segment, embed and index\n    \
                  zoneqa ask --lat 41.1496 --lon -8.6110 \"Posso construir?\"\n    \
                  zoneqa chat \"Qual a altura máxima de fachada?\"\n    \
                  zoneqa layers --lat 41.1496 --lon -8.6110               # Show zoning attributes"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "ZONEQA_CONFIG",
        default_value = "zoneqa.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a regulation document into article units
    ///
    /// Writes the chunk file without embedding anything.
    Segment {
        /// Regulation document (.txt or .pdf)
        input: PathBuf,

        /// Chunk file to write (defaults to corpus.chunks_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Segment, embed and index a regulation document
    Build {
        /// Regulation document (defaults to corpus.source_path)
        input: Option<PathBuf>,
    },

    /// Ask a question about a location
    Ask {
        /// Latitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Half-width of the lookup box in degrees
        #[arg(long)]
        margin: Option<f64>,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// The question
        question: String,
    },

    /// Ask a question without a location
    Chat {
        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// The question
        question: String,
    },

    /// Show the zoning attributes at a location
    Layers {
        /// Latitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Half-width of the lookup box in degrees
        #[arg(long)]
        margin: Option<f64>,
    },

    /// Show configuration information
    Config {
        /// Only validate the configuration file
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

impl Commands {
    /// How a failure of this command is shown on the terminal.
    ///
    /// Corpus preparation is run by an operator and gets the full error;
    /// question answering gets the end-user wording.
    pub fn failure_message(&self, err: &AppError) -> String {
        match self {
            Commands::Segment { .. } | Commands::Build { .. } => err.to_string(),
            _ => err.user_message(),
        }
    }
}

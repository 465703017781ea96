//! Command-line interface for flow-rsvp
//!
//! Provides argument parsing using clap derive macros.

use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Terminal speed reader
#[derive(Parser, Debug)]
#[command(
    name = "flow-rsvp",
    version,
    about = "Read text one word at a time at a steady pace"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a text file word by word
    Read(ReadArgs),
    /// Print the token stream for a text file
    Tokens {
        /// Text file to tokenize (`-` for stdin)
        file: PathBuf,
        /// Emit one JSON object per token
        #[arg(long)]
        json: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments for `flow-rsvp read`.
#[derive(Args, Debug, Clone, PartialEq)]
#[command(group(ArgGroup::new("start").args(["index", "offset", "progress"])))]
pub struct ReadArgs {
    /// Text file to read (`-` for stdin)
    pub file: PathBuf,

    /// Reading speed in words per minute
    #[arg(long, short = 'w', value_name = "WPM")]
    pub wpm: Option<u32>,

    /// Start at this token index
    #[arg(long, value_name = "N")]
    pub index: Option<usize>,

    /// Start at the first word at or after this character offset
    #[arg(long, value_name = "CHARS")]
    pub offset: Option<usize>,

    /// Start at a fraction of the text (0.0 to 1.0)
    #[arg(long, value_name = "FRACTION", value_parser = parse_fraction)]
    pub progress: Option<f64>,

    /// Ignore and do not update the saved reading position
    #[arg(long)]
    pub no_resume: bool,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse a fraction in `0.0..=1.0`.
fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("expected a value between 0.0 and 1.0, got {value}"))
    }
}

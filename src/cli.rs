use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Keep one value from an XML file pinned on screen.
///
/// xml-overlay reads its configuration once, extracts the configured node from
/// the XML file, and redraws the value whenever the file changes on disk.
#[derive(Parser, Debug)]
#[command(name = "xml-overlay", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON, or TOML when the name ends in `.toml`).
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// How updates are written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Overlay)]
    pub format: OutputFormat,

    /// Read the file once, print the value, and exit.
    #[arg(long)]
    pub once: bool,
}

/// Display surface for readings.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single status line redrawn in place (plain lines when stdout is not a terminal).
    #[default]
    Overlay,
    /// One line per update.
    Lines,
    /// One JSON object per update.
    Json,
}

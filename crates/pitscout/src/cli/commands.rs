//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::export::ExportChannel;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Index of the submission
    pub index: usize,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// JSON file holding one submission
    pub file: PathBuf,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Index of the submission
    pub index: usize,

    /// Field path, e.g. "Team Number" or "Teleop Cycles.Net"
    pub path: String,

    /// New value as text
    pub value: String,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Channel to export through
    #[arg(value_enum)]
    pub channel: ChannelArg,

    /// Submission indices to export, in order (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub select: Vec<usize>,

    /// Directory for the file channel (overrides configuration)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding an array of submissions
    pub file: PathBuf,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Fields command arguments.
#[derive(Debug, Args)]
pub struct FieldsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Settings commands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show every setting
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Set the remote spreadsheet identifier
    SetSpreadsheet {
        /// Spreadsheet identifier (empty to unset)
        id: String,
    },

    /// Set the sheet identifier
    SetSheet {
        /// Sheet identifier (empty to unset)
        id: String,
    },

    /// Replace the team-name table from a JSON object file
    ImportTeams {
        /// File mapping team numbers to names
        file: PathBuf,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Export channel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelArg {
    /// QR code printed to the terminal, limited in size
    Qr,
    /// System clipboard
    Clipboard,
    /// JSON file in the export directory
    File,
}

impl From<ChannelArg> for ExportChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Qr => Self::VisualCode,
            ChannelArg::Clipboard => Self::Clipboard,
            ChannelArg::File => Self::File,
        }
    }
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

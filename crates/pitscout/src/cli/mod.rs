//! Command-line interface for pitscout.
//!
//! This module provides the CLI structure for the `pitscout` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AddCommand, ChannelArg, ClearCommand, ConfigCommand, EditCommand, ExportCommand,
    FieldsCommand, ImportCommand, ListCommand, OutputFormat, SettingsCommand, ShowCommand,
    StatsCommand,
};

/// pitscout - Offline scouting records for robotics competitions
///
/// Stores match submissions locally, edits them field by field with
/// validation, and exports selections as a visual code, to the clipboard,
/// or to a file.
#[derive(Debug, Parser)]
#[command(name = "pitscout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored submissions
    List(ListCommand),

    /// Print one submission as JSON
    Show(ShowCommand),

    /// Validate and append a submission from a JSON file
    Add(AddCommand),

    /// Edit one field of a stored submission
    Edit(EditCommand),

    /// Delete every stored submission
    Clear(ClearCommand),

    /// Export submissions through a channel
    Export(ExportCommand),

    /// Validate and append submissions from a JSON array file
    Import(ImportCommand),

    /// List editable field paths and their rules
    Fields(FieldsCommand),

    /// Show storage statistics
    Stats(StatsCommand),

    /// View or modify settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "pitscout");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["pitscout", "-vv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Debug);

        let cli = Cli::try_parse_from(["pitscout", "-q", "list"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_edit() {
        let cli =
            Cli::try_parse_from(["pitscout", "edit", "0", "Qualification Number", "5"]).unwrap();
        let Command::Edit(edit) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(edit.index, 0);
        assert_eq!(edit.path, "Qualification Number");
        assert_eq!(edit.value, "5");
    }

    #[test]
    fn test_parse_export_selection() {
        let cli = Cli::try_parse_from(["pitscout", "export", "qr", "--select", "3,1,2"]).unwrap();
        let Command::Export(export) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(export.channel, ChannelArg::Qr);
        assert_eq!(export.select, vec![3, 1, 2]);
        assert!(export.dir.is_none());
    }

    #[test]
    fn test_parse_export_rejects_unknown_channel() {
        assert!(Cli::try_parse_from(["pitscout", "export", "fax"]).is_err());
    }

    #[test]
    fn test_parse_settings() {
        let cli = Cli::try_parse_from(["pitscout", "settings", "set-sheet", "Quals"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Settings(SettingsCommand::SetSheet { .. })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["pitscout", "-c", "/custom/config.toml", "fields"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::try_parse_from(["pitscout", "stats", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Stats(StatsCommand { json: true })));
    }

    #[test]
    fn test_parse_clear_needs_no_args() {
        let cli = Cli::try_parse_from(["pitscout", "clear"]).unwrap();
        assert!(matches!(cli.command, Command::Clear(ClearCommand { yes: false })));
    }
}

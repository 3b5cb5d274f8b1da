//! `pitscout` - CLI for the scouting submission store
//!
//! This binary lists, edits, imports and exports the submissions kept in the
//! local store, and manages the settings stored next to them.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use pitscout::cli::{
    Cli, Command, ConfigCommand, EditCommand, ExportCommand, ListCommand, OutputFormat,
    SettingsCommand,
};
use pitscout::export::{self, ExportReceipt};
use pitscout::schema::{self, FieldPath};
use pitscout::{
    init_logging, Config, Exporter, SettingsStore, Storage, Submission, SubmissionStore, SyncBus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::Fields(fields_cmd) => handle_fields(fields_cmd.json),
        command => {
            let app = App::open(&config)?;
            match command {
                Command::List(cmd) => app.list(&cmd),
                Command::Show(cmd) => app.show(cmd.index),
                Command::Add(cmd) => app.add(&cmd.file),
                Command::Edit(cmd) => app.edit(&cmd),
                Command::Clear(cmd) => app.clear(cmd.yes),
                Command::Import(cmd) => app.import(&cmd.file),
                Command::Stats(cmd) => app.stats(cmd.json),
                Command::Export(cmd) => app.export(&config, cmd).await,
                Command::Settings(cmd) => app.settings(cmd),
                Command::Config(_) | Command::Fields(_) => Ok(()),
            }
        }
    }
}

/// Stores opened over the configured database.
struct App {
    storage: Arc<Storage>,
    store: SubmissionStore,
    settings: SettingsStore,
}

impl App {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let storage = Storage::open(config.database_path(), config.storage.quota_bytes)?;
        let storage = Arc::new(storage);
        let bus = SyncBus::with_capacity(config.sync.channel_capacity);
        Ok(Self {
            store: SubmissionStore::open(Arc::clone(&storage), bus.clone()),
            settings: SettingsStore::open(Arc::clone(&storage), bus),
            storage,
        })
    }

    fn list(&self, cmd: &ListCommand) -> anyhow::Result<()> {
        let records = self.store.snapshot()?;
        match cmd.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            OutputFormat::Plain => {
                for (index, record) in records.iter().enumerate() {
                    println!(
                        "{index}: team {} qual {} ({})",
                        record.team_number, record.qualification_number, record.scouter_name
                    );
                }
            }
            OutputFormat::Table => {
                if records.is_empty() {
                    println!("No submissions stored.");
                    return Ok(());
                }
                println!(
                    "{:>5}  {:>6}  {:>5}  {:<8}  {:<20}  {:<20}",
                    "#", "Team", "Qual", "Alliance", "Team Name", "Scouter"
                );
                for (index, record) in records.iter().enumerate() {
                    let team_name = self
                        .settings
                        .team_name(record.team_number)?
                        .unwrap_or_default();
                    println!(
                        "{:>5}  {:>6}  {:>5}  {:<8}  {:<20}  {:<20}",
                        index,
                        record.team_number,
                        record.qualification_number,
                        record.alliance,
                        team_name,
                        record.scouter_name
                    );
                }
                println!();
                println!("{} submission(s)", records.len());
            }
        }
        Ok(())
    }

    fn show(&self, index: usize) -> anyhow::Result<()> {
        let Some(record) = self.store.get(index)? else {
            bail!("no submission at index {index} (store holds {})", self.store.len()?);
        };
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }

    fn add(&self, file: &Path) -> anyhow::Result<()> {
        let record: Submission = read_json(file)?;
        record.validate()?;
        let index = self.store.append(record)?;
        println!("Stored submission {index}.");
        Ok(())
    }

    fn edit(&self, cmd: &EditCommand) -> anyhow::Result<()> {
        let value = self.store.edit_field(cmd.index, &cmd.path, &cmd.value)?;
        println!("{} of submission {} is now {value}.", cmd.path, cmd.index);
        Ok(())
    }

    fn clear(&self, yes: bool) -> anyhow::Result<()> {
        let count = self.store.len()?;
        if !yes {
            println!("This will delete all {count} stored submission(s).");
            println!("Use --yes to confirm.");
            return Ok(());
        }
        self.store.clear()?;
        println!("Deleted {count} submission(s).");
        Ok(())
    }

    fn import(&self, file: &Path) -> anyhow::Result<()> {
        let records: Vec<Submission> = read_json(file)?;
        let added = self.store.import(records)?;
        println!("Imported {added} submission(s).");
        Ok(())
    }

    fn stats(&self, json: bool) -> anyhow::Result<()> {
        let stats = self.storage.stats()?;
        let submissions = self.store.len()?;
        let last_write = stats.last_write.map(|at| at.to_rfc3339());
        if json {
            let value = serde_json::json!({
                "database_path": self.storage.path(),
                "submissions": submissions,
                "entries": stats.entries,
                "value_bytes": stats.value_bytes,
                "quota_bytes": self.storage.quota(),
                "db_size_bytes": stats.db_size_bytes,
                "last_write": last_write,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("pitscout stats");
            println!("--------------");
            println!("Database:      {}", self.storage.path().display());
            println!("Submissions:   {submissions}");
            println!("Entries:       {}", stats.entries);
            println!("Value bytes:   {}", stats.value_bytes);
            println!("Quota:         {} bytes per value", self.storage.quota());
            println!("File size:     {} bytes", stats.db_size_bytes);
            println!(
                "Last write:    {}",
                last_write.as_deref().unwrap_or("(never)")
            );
        }
        Ok(())
    }

    async fn export(&self, config: &Config, cmd: ExportCommand) -> anyhow::Result<()> {
        let records = self.store.snapshot()?;
        let selection = if cmd.select.is_empty() {
            records
        } else {
            export::select(&records, &cmd.select)?
        };
        let directory = cmd.dir.unwrap_or_else(|| config.export_dir());
        let exporter = Exporter::with_system_clipboard(directory);

        match exporter.export(&selection, cmd.channel.into()).await? {
            ExportReceipt::VisualCode { payload, rendered } => {
                println!("{rendered}");
                println!(
                    "{} submission(s) in a {}-byte visual code.",
                    selection.len(),
                    payload.len()
                );
            }
            ExportReceipt::Clipboard { bytes } => {
                println!(
                    "Copied {} submission(s) ({bytes} bytes) to the clipboard.",
                    selection.len()
                );
            }
            ExportReceipt::File { path, bytes } => {
                println!("Wrote {bytes} bytes to {}", path.display());
            }
        }
        Ok(())
    }

    fn settings(&self, cmd: SettingsCommand) -> anyhow::Result<()> {
        match cmd {
            SettingsCommand::Show { json } => {
                let settings = self.settings.snapshot()?;
                if json {
                    let value = serde_json::json!({
                        "spreadsheet_id": settings.spreadsheet_id,
                        "sheet_id": settings.sheet_id,
                        "team_names": settings.team_names,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    println!("Settings");
                    println!("========");
                    println!(
                        "  Spreadsheet:  {}",
                        settings.spreadsheet_id.as_deref().unwrap_or("(unset)")
                    );
                    println!(
                        "  Sheet:        {}",
                        settings.sheet_id.as_deref().unwrap_or("(unset)")
                    );
                    println!("  Team names:   {}", settings.team_names.len());
                }
            }
            SettingsCommand::SetSpreadsheet { id } => {
                self.settings.set_spreadsheet_id(&id)?;
                println!("Spreadsheet identifier updated.");
            }
            SettingsCommand::SetSheet { id } => {
                self.settings.set_sheet_id(&id)?;
                println!("Sheet identifier updated.");
            }
            SettingsCommand::ImportTeams { file } => {
                let teams: BTreeMap<String, String> = read_json(&file)?;
                let count = teams.len();
                self.settings.set_team_names(teams)?;
                println!("Stored {count} team name(s).");
            }
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", file.display()))
}

fn handle_fields(json: bool) -> anyhow::Result<()> {
    let paths = FieldPath::all();
    if json {
        let rows: Vec<_> = paths
            .iter()
            .map(|&path| {
                let descriptor = path.field().descriptor();
                serde_json::json!({
                    "path": path.to_string(),
                    "phase": descriptor.phase.as_str(),
                    "required": descriptor.required,
                    "rule": schema::constraint(path).describe(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<34}  {:<10}  {:<8}  Rule", "Path", "Phase", "Required");
    for path in paths {
        let descriptor = path.field().descriptor();
        println!(
            "{:<34}  {:<10}  {:<8}  {}",
            path.to_string(),
            descriptor.phase.as_str(),
            if descriptor.required { "yes" } else { "no" },
            schema::constraint(path).describe()
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Quota (bytes):      {}", config.storage.quota_bytes);
                println!();
                println!("[Export]");
                println!("  Directory:          {}", config.export_dir().display());
                println!();
                println!("[Sync]");
                println!("  Channel capacity:   {}", config.sync.channel_capacity);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

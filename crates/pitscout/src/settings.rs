//! Per-profile settings kept next to the submissions.
//!
//! The team-name table is stored as a JSON object; the spreadsheet and
//! sheet identifiers are stored as plain strings. Anything unreadable is
//! treated as absent.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::{Storage, StorageKey};
use crate::sync::{Mirror, Subscription, SyncBus, ViewId};

/// Keys mirrored by [`SettingsStore`].
const SETTINGS_KEYS: &[StorageKey] = &[
    StorageKey::TeamNames,
    StorageKey::SpreadsheetId,
    StorageKey::SheetId,
];

/// Snapshot of every setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Team number (as text) to team name.
    pub team_names: BTreeMap<String, String>,
    /// Remote spreadsheet identifier.
    pub spreadsheet_id: Option<String>,
    /// Sheet identifier inside the spreadsheet.
    pub sheet_id: Option<String>,
}

/// One view's handle on the persisted settings.
#[derive(Debug)]
pub struct SettingsStore {
    view: ViewId,
    storage: Arc<Storage>,
    bus: SyncBus,
    state: Mutex<Settings>,
}

fn read_team_names(storage: &Storage) -> BTreeMap<String, String> {
    match storage.get(StorageKey::TeamNames) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Stored team names are malformed, treating as absent");
            BTreeMap::new()
        }),
        Ok(None) => BTreeMap::new(),
        Err(e) => {
            warn!(error = %e, "Could not read team names");
            BTreeMap::new()
        }
    }
}

fn read_text(storage: &Storage, key: StorageKey) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            warn!(key = %key, error = %e, "Could not read setting");
            None
        }
    }
}

impl SettingsStore {
    /// Open a view on the shared storage and load every setting.
    #[must_use]
    pub fn open(storage: Arc<Storage>, bus: SyncBus) -> Self {
        let settings = Settings {
            team_names: read_team_names(&storage),
            spreadsheet_id: read_text(&storage, StorageKey::SpreadsheetId),
            sheet_id: read_text(&storage, StorageKey::SheetId),
        };
        Self {
            view: ViewId::next(),
            storage,
            bus,
            state: Mutex::new(settings),
        }
    }

    /// Subscribe this view to changes made by other views.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(self.view)
    }

    fn state(&self) -> Result<MutexGuard<'_, Settings>> {
        self.state.lock().map_err(|_| Error::poisoned("settings"))
    }

    /// A copy of every setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn snapshot(&self) -> Result<Settings> {
        Ok(self.state()?.clone())
    }

    /// Look up a team's name by number.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lock is poisoned.
    pub fn team_name(&self, team_number: u32) -> Result<Option<String>> {
        Ok(self
            .state()?
            .team_names
            .get(&team_number.to_string())
            .cloned())
    }

    /// Replace the team-name table.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails; the mirror is then unchanged.
    pub fn set_team_names(&self, team_names: BTreeMap<String, String>) -> Result<()> {
        let mut state = self.state()?;
        let text = serde_json::to_string(&team_names)?;
        self.storage.put(StorageKey::TeamNames, &text)?;
        info!(count = team_names.len(), "Team names updated");
        state.team_names = team_names;
        self.bus.notify(StorageKey::TeamNames, self.view);
        Ok(())
    }

    /// Set the remote spreadsheet identifier.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub fn set_spreadsheet_id(&self, id: &str) -> Result<()> {
        self.set_text(StorageKey::SpreadsheetId, id)
    }

    /// Set the sheet identifier.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub fn set_sheet_id(&self, id: &str) -> Result<()> {
        self.set_text(StorageKey::SheetId, id)
    }

    fn set_text(&self, key: StorageKey, value: &str) -> Result<()> {
        let mut state = self.state()?;
        let value = value.trim();
        let slot = match key {
            StorageKey::SpreadsheetId => &mut state.spreadsheet_id,
            StorageKey::SheetId => &mut state.sheet_id,
            _ => return Err(Error::internal(format!("'{key}' is not a text setting"))),
        };
        self.storage.put(key, value)?;
        *slot = (!value.is_empty()).then(|| value.to_string());
        debug!(key = %key, "Setting updated");
        self.bus.notify(key, self.view);
        Ok(())
    }
}

impl Mirror for SettingsStore {
    fn keys(&self) -> &'static [StorageKey] {
        SETTINGS_KEYS
    }

    fn reload(&self, key: StorageKey) -> Result<bool> {
        let mut state = self.state()?;
        let changed = match key {
            StorageKey::TeamNames => {
                let fresh = read_team_names(&self.storage);
                let changed = fresh != state.team_names;
                state.team_names = fresh;
                changed
            }
            StorageKey::SpreadsheetId => {
                let fresh = read_text(&self.storage, key);
                let changed = fresh != state.spreadsheet_id;
                state.spreadsheet_id = fresh;
                changed
            }
            StorageKey::SheetId => {
                let fresh = read_text(&self.storage, key);
                let changed = fresh != state.sheet_id;
                state.sheet_id = fresh;
                changed
            }
            StorageKey::Submissions => false,
        };
        Ok(changed)
    }
}

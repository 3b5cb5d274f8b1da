//! The submission repository.
//!
//! A [`SubmissionStore`] is one view's handle on the persisted submission
//! sequence. It keeps an in-memory mirror that only ever follows storage:
//! every mutation builds the next sequence, persists it, and swaps the
//! mirror only after the write succeeded. The mirror lock is held across
//! that whole sequence, so edits within one view never interleave.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::schema::{self, FieldPath, Value};
use crate::storage::{Storage, StorageKey};
use crate::submission::Submission;
use crate::sync::{self, Mirror, Subscription, SyncBus, ViewId};

#[derive(Debug, Default)]
struct MirrorState {
    records: Vec<Submission>,
    /// Digest of the stored text the mirror was last loaded from or written as.
    digest: Option<blake3::Hash>,
}

/// One view's handle on the persisted submission sequence.
#[derive(Debug)]
pub struct SubmissionStore {
    view: ViewId,
    storage: Arc<Storage>,
    bus: SyncBus,
    state: Mutex<MirrorState>,
}

/// Deserialize the persisted submission sequence.
///
/// Absent, unreadable or malformed state is treated as "no submissions yet".
#[must_use]
pub fn load(storage: &Storage) -> Vec<Submission> {
    read_persisted(storage).0
}

fn read_persisted(storage: &Storage) -> (Vec<Submission>, Option<blake3::Hash>) {
    let raw = match storage.get(StorageKey::Submissions) {
        Ok(Some(raw)) => raw,
        Ok(None) => return (Vec::new(), None),
        Err(e) => {
            warn!(error = %e, "Could not read stored submissions, starting empty");
            return (Vec::new(), None);
        }
    };
    let digest = sync::digest(&raw);
    (parse_records(&raw), Some(digest))
}

fn parse_records(raw: &str) -> Vec<Submission> {
    match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(
                error = %e,
                bytes = raw.len(),
                "Stored submissions are malformed, treating as empty"
            );
            Vec::new()
        }
    }
}

impl SubmissionStore {
    /// Open a view on the shared storage and load its mirror.
    #[must_use]
    pub fn open(storage: Arc<Storage>, bus: SyncBus) -> Self {
        let (records, digest) = read_persisted(&storage);
        let view = ViewId::next();
        debug!(view = %view, count = records.len(), "Submission store opened");
        Self {
            view,
            storage,
            bus,
            state: Mutex::new(MirrorState { records, digest }),
        }
    }

    /// This view's identity on the sync bus.
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Subscribe this view to changes made by other views.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(self.view)
    }

    fn state(&self) -> Result<MutexGuard<'_, MirrorState>> {
        self.state.lock().map_err(|_| Error::poisoned("submission mirror"))
    }

    /// A copy of every submission, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<Submission>> {
        Ok(self.state()?.records.clone())
    }

    /// The submission at `index`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror lock is poisoned.
    pub fn get(&self, index: usize) -> Result<Option<Submission>> {
        Ok(self.state()?.records.get(index).cloned())
    }

    /// Number of submissions in the mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state()?.records.len())
    }

    /// Whether the mirror holds no submissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.state()?.records.is_empty())
    }

    /// Append a submission and persist the sequence.
    ///
    /// The record is not validated here; the form validates whole records
    /// before calling. Returns the new record's index.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails; the mirror is then unchanged.
    pub fn append(&self, record: Submission) -> Result<usize> {
        let mut state = self.state()?;
        let mut next = state.records.clone();
        next.push(record);
        let index = next.len() - 1;
        self.commit(&mut state, next)?;
        info!(view = %self.view, index, "Submission appended");
        Ok(index)
    }

    /// Append many submissions at once, all or nothing.
    ///
    /// Unlike [`append`](Self::append) this validates every record, since
    /// imported data did not pass through the form. Returns the number added.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, or a persistence error.
    pub fn import(&self, records: Vec<Submission>) -> Result<usize> {
        for (i, record) in records.iter().enumerate() {
            record.validate().map_err(|e| match e {
                Error::Validation(mut rejection) => {
                    rejection.path = format!("record {i}: {}", rejection.path);
                    Error::Validation(rejection)
                }
                other => other,
            })?;
        }

        let added = records.len();
        let mut state = self.state()?;
        let mut next = state.records.clone();
        next.extend(records);
        self.commit(&mut state, next)?;
        info!(view = %self.view, added, "Submissions imported");
        Ok(added)
    }

    /// Edit one field of one submission from textual input.
    ///
    /// The path is resolved and the input coerced by the schema before
    /// anything is written. Returns the coerced value now stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown paths or rejected input, an
    /// index error, or a persistence error. Nothing is written on failure.
    pub fn edit_field(&self, index: usize, path: &str, raw: &str) -> Result<Value> {
        let path: FieldPath = path.parse()?;
        self.edit_path(index, path, raw)
    }

    /// Edit one field of one submission addressed by a typed path.
    ///
    /// # Errors
    ///
    /// See [`edit_field`](Self::edit_field).
    pub fn edit_path(&self, index: usize, path: FieldPath, raw: &str) -> Result<Value> {
        let value = schema::coerce(path, raw)?;

        let mut state = self.state()?;
        let len = state.records.len();
        let current = state
            .records
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        let updated = current.with(path, value.clone())?;

        let mut next = state.records.clone();
        next[index] = updated;
        self.commit(&mut state, next)?;
        debug!(view = %self.view, index, path = %path, value = %value, "Field edited");
        Ok(value)
    }

    /// Replace the persisted sequence with an empty one.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the write fails.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state()?;
        let removed = state.records.len();
        self.commit(&mut state, Vec::new())?;
        info!(view = %self.view, removed, "Submissions cleared");
        Ok(())
    }

    /// Build, persist, then swap the mirror and announce the change.
    fn commit(&self, state: &mut MirrorState, next: Vec<Submission>) -> Result<()> {
        let text = serde_json::to_string(&next)?;
        self.storage.put(StorageKey::Submissions, &text)?;
        state.digest = Some(sync::digest(&text));
        state.records = next;
        self.bus.notify(StorageKey::Submissions, self.view);
        Ok(())
    }
}

impl Mirror for SubmissionStore {
    fn keys(&self) -> &'static [StorageKey] {
        &[StorageKey::Submissions]
    }

    fn reload(&self, key: StorageKey) -> Result<bool> {
        if key != StorageKey::Submissions {
            return Ok(false);
        }
        let raw = self.storage.get(StorageKey::Submissions)?;
        let digest = raw.as_deref().map(sync::digest);

        let mut state = self.state()?;
        if digest.is_some() && digest == state.digest {
            return Ok(false);
        }
        state.records = raw.as_deref().map(parse_records).unwrap_or_default();
        state.digest = digest;
        debug!(view = %self.view, count = state.records.len(), "Submissions reloaded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_QUOTA_BYTES;
    use crate::submission::tests::sample;
    use crate::sync::SyncEvent;

    fn shared_storage() -> Arc<Storage> {
        Arc::new(Storage::open_in_memory(DEFAULT_QUOTA_BYTES).unwrap())
    }

    fn open_view(storage: &Arc<Storage>, bus: &SyncBus) -> SubmissionStore {
        SubmissionStore::open(Arc::clone(storage), bus.clone())
    }

    #[test]
    fn test_load_absent_is_empty() {
        let storage = shared_storage();
        assert!(load(&storage).is_empty());
    }

    #[test]
    fn test_load_malformed_is_empty() {
        let storage = shared_storage();
        storage.put(StorageKey::Submissions, "{not json").unwrap();
        assert!(load(&storage).is_empty());

        let store = open_view(&storage, &SyncBus::new());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_append_round_trips_in_order() {
        let storage = shared_storage();
        let bus = SyncBus::new();
        let store = open_view(&storage, &bus);

        let records: Vec<Submission> = [1114, 254, 33, 971].map(sample).into();
        for (i, record) in records.iter().enumerate() {
            assert_eq!(store.append(record.clone()).unwrap(), i);
        }

        assert_eq!(load(&storage), records);
        let reopened = open_view(&storage, &bus);
        assert_eq!(reopened.snapshot().unwrap(), records);
    }

    #[test]
    fn test_edit_stores_coerced_value() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1114)).unwrap();

        let value = store.edit_field(0, "Qualification Number", "5").unwrap();
        assert_eq!(value, Value::Integer(5));

        let path: FieldPath = "Qualification Number".parse().unwrap();
        assert_eq!(store.get(0).unwrap().unwrap().get(path), Value::Integer(5));

        // Scenario: reload from storage keeps the coerced value and other fields.
        let reloaded = load(&storage);
        assert_eq!(reloaded[0].qualification_number, 5);
        assert_eq!(reloaded[0].team_number, 1114);
        let json = storage.get(StorageKey::Submissions).unwrap().unwrap();
        assert!(json.contains(r#""Qualification Number":5"#));
    }

    #[test]
    fn test_edit_nested_field() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();
        store.append(sample(2)).unwrap();

        store
            .edit_field(1, "Teleop Cycles.Coral Level 3", "7")
            .unwrap();

        let records = load(&storage);
        assert_eq!(records[1].teleop.coral_level_3, 7);
        assert_eq!(records[0], sample(1));
    }

    #[test]
    fn test_rejected_edit_writes_nothing() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1114)).unwrap();
        let before = storage.get(StorageKey::Submissions).unwrap();

        for (path, raw) in [
            ("Alliance", "Green"),
            ("Team Number", "abc"),
            ("Defense Times", "[1,"),
            ("Notes.tags", "fast"),
            ("Bogus Field", "1"),
        ] {
            let err = store.edit_field(0, path, raw).unwrap_err();
            assert!(err.is_validation(), "{path}: {err}");
        }

        assert_eq!(storage.get(StorageKey::Submissions).unwrap(), before);
        assert_eq!(store.get(0).unwrap().unwrap(), sample(1114));
    }

    #[test]
    fn test_edit_out_of_range() {
        let store = open_view(&shared_storage(), &SyncBus::new());
        let err = store.edit_field(3, "Team Number", "1").unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 3, len: 0 }));
    }

    #[test]
    fn test_failed_persist_keeps_mirror() {
        let storage = Arc::new(Storage::open_in_memory(600).unwrap());
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();

        let err = store.append(sample(2)).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(load(&storage).len(), 1);

        let long_note = "x".repeat(600);
        let err = store.edit_field(0, "Notes.text", &long_note).unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.get(0).unwrap().unwrap().notes.text, "");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();

        store.clear().unwrap();
        let once = storage.get(StorageKey::Submissions).unwrap();
        store.clear().unwrap();
        let twice = storage.get(StorageKey::Submissions).unwrap();

        assert_eq!(once, Some("[]".to_string()));
        assert_eq!(once, twice);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();

        let mut bad = sample(3);
        bad.alliance = "Purple".to_string();
        let err = store.import(vec![sample(2), bad]).unwrap_err();
        assert!(err.to_string().starts_with("record 1: Alliance"));
        assert_eq!(store.len().unwrap(), 1);

        assert_eq!(store.import(vec![sample(2), sample(3)]).unwrap(), 2);
        assert_eq!(load(&storage).len(), 3);
    }

    #[test]
    fn test_mutations_notify_other_views() {
        let storage = shared_storage();
        let bus = SyncBus::new();
        let writer = open_view(&storage, &bus);
        let reader = open_view(&storage, &bus);
        let mut reader_sub = reader.subscribe();
        let mut writer_sub = writer.subscribe();

        writer.append(sample(1114)).unwrap();
        assert!(reader.is_empty().unwrap());

        let event = reader_sub.try_next().unwrap();
        assert_eq!(event, SyncEvent::Changed(StorageKey::Submissions));
        assert!(reader.apply(event).unwrap());
        assert_eq!(reader.snapshot().unwrap(), vec![sample(1114)]);

        // The writer does not hear its own notices.
        assert_eq!(writer_sub.try_next(), None);
    }

    #[test]
    fn test_failed_persist_sends_no_notice() {
        let storage = Arc::new(Storage::open_in_memory(10).unwrap());
        let bus = SyncBus::new();
        let writer = open_view(&storage, &bus);
        let mut sub = bus.subscribe(ViewId::next());

        assert!(writer.append(sample(1)).is_err());
        assert_eq!(sub.try_next(), None);
    }

    #[test]
    fn test_reload_skips_unchanged_text() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();

        assert!(!store.reload(StorageKey::Submissions).unwrap());
        assert!(!store.reload(StorageKey::TeamNames).unwrap());

        storage.put(StorageKey::Submissions, "[]").unwrap();
        assert!(store.reload(StorageKey::Submissions).unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_reload_after_external_clear_to_absent() {
        let storage = shared_storage();
        let store = open_view(&storage, &SyncBus::new());
        store.append(sample(1)).unwrap();

        storage.remove(StorageKey::Submissions).unwrap();
        assert!(store.reload(StorageKey::Submissions).unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_background_sync_updates_reader() {
        let storage = shared_storage();
        let bus = SyncBus::new();
        let writer = open_view(&storage, &bus);
        let reader = Arc::new(open_view(&storage, &bus));
        let task = sync::spawn_mirror_sync(Arc::clone(&reader), reader.subscribe());

        writer.append(sample(254)).unwrap();
        writer.edit_field(0, "Endgame", "Park").unwrap();

        for _ in 0..100 {
            let synced = reader
                .snapshot()
                .unwrap()
                .first()
                .is_some_and(|r| r.endgame == "Park");
            if synced {
                break;
            }
            tokio::task::yield_now().await;
        }
        task.abort();

        let records = reader.snapshot().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].endgame, "Park");
    }
}

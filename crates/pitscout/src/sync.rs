//! Change notification between views that share one storage.
//!
//! A notice says only *which key* changed. Receivers re-read that key from
//! storage; nothing else travels on the bus. Delivery is in emission order
//! per subscriber, with no acknowledgement or retry. A subscriber that falls
//! behind gets [`SyncEvent::Resync`] and reloads every key it mirrors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::storage::StorageKey;

/// Default number of notices buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

static NEXT_VIEW: AtomicU64 = AtomicU64::new(1);

/// Identity of one open view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    /// Allocate a fresh, process-unique view id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_VIEW.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// A key was rewritten by some view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    /// The key that changed.
    pub key: StorageKey,
    /// The view that wrote it.
    pub origin: ViewId,
    /// When the write was committed.
    pub at: DateTime<Utc>,
}

/// What a subscriber should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Reload this key.
    Changed(StorageKey),
    /// Notices were missed; reload everything.
    Resync,
}

/// Process-wide broadcast channel for change notices.
#[derive(Debug, Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<ChangeNotice>,
}

impl SyncBus {
    /// Create a bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering `capacity` notices per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announce that `origin` committed a new value for `key`.
    pub fn notify(&self, key: StorageKey, origin: ViewId) {
        let notice = ChangeNotice {
            key,
            origin,
            at: Utc::now(),
        };
        match self.tx.send(notice) {
            Ok(receivers) => {
                trace!(key = %key, origin = %origin, receivers, "Change notice sent");
            }
            Err(_) => {
                trace!(
                    key = %key,
                    origin = %origin,
                    "Change notice sent with no subscribers"
                );
            }
        }
    }

    /// Subscribe on behalf of `view`; its own notices are filtered out.
    #[must_use]
    pub fn subscribe(&self, view: ViewId) -> Subscription {
        Subscription {
            view,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One view's stream of change notices from other views.
#[derive(Debug)]
pub struct Subscription {
    view: ViewId,
    rx: broadcast::Receiver<ChangeNotice>,
}

impl Subscription {
    /// The view this subscription belongs to.
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Wait for the next notice from another view.
    ///
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.recv().await {
                Ok(notice) if notice.origin == self.view => {}
                Ok(notice) => return Some(SyncEvent::Changed(notice.key)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(view = %self.view, missed, "Missed change notices, resyncing");
                    return Some(SyncEvent::Resync);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending notice without waiting.
    pub fn try_next(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(notice) if notice.origin == self.view => {}
                Ok(notice) => return Some(SyncEvent::Changed(notice.key)),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(view = %self.view, missed, "Missed change notices, resyncing");
                    return Some(SyncEvent::Resync);
                }
                Err(_) => return None,
            }
        }
    }
}

/// A view-local copy of persisted state that can be refreshed from storage.
pub trait Mirror: Send + Sync {
    /// The keys this mirror tracks.
    fn keys(&self) -> &'static [StorageKey];

    /// Re-read one key from storage.
    ///
    /// Returns `true` if the mirror changed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    fn reload(&self, key: StorageKey) -> Result<bool>;

    /// Apply one sync event, ignoring keys this mirror does not track.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    fn apply(&self, event: SyncEvent) -> Result<bool> {
        match event {
            SyncEvent::Changed(key) if self.keys().contains(&key) => self.reload(key),
            SyncEvent::Changed(_) => Ok(false),
            SyncEvent::Resync => {
                let mut changed = false;
                for &key in self.keys() {
                    changed |= self.reload(key)?;
                }
                Ok(changed)
            }
        }
    }
}

/// Keep a mirror in step with the bus until the bus closes.
///
/// Reload failures are logged and skipped; the next notice or full load heals them.
pub fn spawn_mirror_sync<M>(mirror: Arc<M>, mut subscription: Subscription) -> JoinHandle<()>
where
    M: Mirror + ?Sized + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            match mirror.apply(event) {
                Ok(true) => debug!(view = %subscription.view(), ?event, "Mirror refreshed"),
                Ok(false) => trace!(view = %subscription.view(), ?event, "Mirror unchanged"),
                Err(e) => warn!(view = %subscription.view(), error = %e, "Mirror refresh failed"),
            }
        }
        debug!(view = %subscription.view(), "Sync bus closed");
    })
}

/// Digest of a persisted value, used to skip reloads of unchanged text.
#[must_use]
pub fn digest(text: &str) -> blake3::Hash {
    blake3::hash(text.as_bytes())
}

// ── Resource snapshot store ──
//
// Holds the latest normalized state of every resource kind and pushes
// change notification through a `watch` channel. A poll cycle mutates a
// working copy and publishes it whole, so subscribers observe either
// the fully-previous or fully-new snapshot -- never a mix -- and exactly
// one notification per cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::schema::{FieldMap, KeyedMap};

/// Normalized state of every polled resource kind.
///
/// `hwinfo` is a singleton; the rest map a resource-specific unique key
/// (filesystem uuid, device name, VM name...) to its field map. Every
/// field a schema declares is present -- readers need no existence checks.
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    pub hwinfo: FieldMap,
    pub disk: KeyedMap,
    pub fs: KeyedMap,
    pub network: KeyedMap,
    pub service: KeyedMap,
    pub plugin: KeyedMap,
    pub kvm: KeyedMap,
    pub compose: KeyedMap,
}

/// Publisher side of the snapshot channel.
pub struct SnapshotStore {
    snapshot: watch::Sender<Arc<ResourceSnapshot>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ResourceSnapshot::default()));
        let (last_refresh, _) = watch::channel(None);
        Self {
            snapshot,
            last_refresh,
        }
    }

    /// The current snapshot (cheap `Arc` clone).
    pub fn current(&self) -> Arc<ResourceSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ResourceSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Replace the snapshot and notify subscribers once.
    pub fn publish(&self, next: ResourceSnapshot) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|current| *current = Arc::new(next));
        let _ = self.last_refresh.send(Some(Utc::now()));
    }

    /// When the last cycle published, or `None` before the first one.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// How stale the snapshot is.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

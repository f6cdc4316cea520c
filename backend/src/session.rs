use dashmap::DashMap;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::form::Dashboard;

struct Entry {
    dashboard: Arc<Dashboard>,
    last_seen: Instant,
}

/// Live dashboard instances, one per rendered page, keyed by the id carried
/// in the form's hidden field.
pub struct DashboardRegistry {
    entries: DashMap<Uuid, Entry>,
    ttl: Duration,
}

impl DashboardRegistry {
    pub fn new(ttl: Duration) -> Self {
        DashboardRegistry {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn open(&self) -> (Uuid, Arc<Dashboard>) {
        let id = Uuid::new_v4();
        let dashboard = Arc::new(Dashboard::new());
        self.entries.insert(
            id,
            Entry {
                dashboard: Arc::clone(&dashboard),
                last_seen: Instant::now(),
            },
        );
        (id, dashboard)
    }

    /// Returns the instance and refreshes its idle timer. An expired instance
    /// is only dropped once its submission has finished.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Dashboard>> {
        let mut entry = self.entries.get_mut(id)?;
        if entry.last_seen.elapsed() > self.ttl && !entry.dashboard.form().is_busy() {
            drop(entry);
            self.entries.remove(id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.dashboard))
    }

    /// Drops idle instances that are not mid-submission.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.last_seen.elapsed() <= self.ttl || entry.dashboard.form().is_busy());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Expired {} idle dashboard instances", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use crate::state::location::Location;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Immutable view of the store handed to listeners
pub type Snapshot = Arc<Vec<Location>>;

/// In-memory map of driver id to last known location.
///
/// Owned by a single task; listeners observe it only through `watch`
/// receivers, so a listener can never re-enter `notify` while a
/// notification is being delivered.
pub struct LocationStore {
    entities: HashMap<String, Location>,

    /// Latest published snapshot
    snapshot_tx: watch::Sender<Snapshot>,
}

impl LocationStore {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            entities: HashMap::new(),
            snapshot_tx,
        }
    }

    /// Swap the entire map for the result of a bulk fetch.
    ///
    /// Drivers absent from `locations` are dropped.
    pub fn replace_all(&mut self, locations: Vec<Location>) {
        let before = self.entities.len();

        self.entities = locations
            .into_iter()
            .map(|location| (location.entity_id.clone(), location))
            .collect();

        debug!(before = before, after = self.entities.len(), "Replaced all locations");
        self.notify();
    }

    /// Insert or replace a single driver's location
    pub fn upsert(&mut self, location: Location) {
        match self.entities.get_mut(&location.entity_id) {
            Some(existing) => existing.merge_from(location),
            None => {
                self.entities.insert(location.entity_id.clone(), location);
            }
        }

        self.notify();
    }

    /// Owned copy of current state, sorted by driver id
    pub fn snapshot(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.entities.values().cloned().collect();
        locations.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        locations
    }

    /// Register a listener. Dropping the receiver unregisters it.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn get(&self, entity_id: &str) -> Option<Location> {
        self.entities.get(entity_id).cloned()
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Publish the committed state to every listener (one notification per call)
    fn notify(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.snapshot()));
    }
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}

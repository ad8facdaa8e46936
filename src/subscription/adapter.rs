use crate::hub::Command;
use crate::state::{Location, Snapshot};
use crate::supervisor::ConnectionStatus;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

/// A change delivered to an observer
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Locations(Vec<Location>),
    Status(ConnectionStatus),
}

/// Per-observer handle onto the location hub.
///
/// Holding a `Subscription` keeps the upstream connection open; dropping it
/// unregisters the observer immediately. Everything it hands out is a copy.
pub struct Subscription {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    locations: watch::Receiver<Snapshot>,
    status: watch::Receiver<ConnectionStatus>,
}

impl Subscription {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        mut locations: watch::Receiver<Snapshot>,
        mut status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        let id = Uuid::new_v4();

        // Only changes after registration count as notifications
        locations.borrow_and_update();
        status.borrow_and_update();

        let _ = commands.send(Command::Attach { observer: id });
        let _ = commands.send(Command::Refresh);
        debug!(observer = %id, "Subscription created");

        Self {
            id,
            commands,
            locations,
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Copy of the current location set
    pub fn current_snapshot(&self) -> Vec<Location> {
        self.locations.borrow().to_vec()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Request a full resync. Failures are never surfaced; the previous
    /// snapshot stays in place.
    pub fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh);
    }

    /// Wait for the next location notification.
    ///
    /// Returns None once the hub has stopped.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Location>> {
        self.locations.changed().await.ok()?;
        let snapshot = self.locations.borrow_and_update().to_vec();
        Some(snapshot)
    }

    /// Wait for the next status change
    pub async fn next_status(&mut self) -> Option<ConnectionStatus> {
        self.status.changed().await.ok()?;
        let status = *self.status.borrow_and_update();
        Some(status)
    }

    /// Wait for whichever changes first: locations or status
    pub async fn next_change(&mut self) -> Option<Change> {
        tokio::select! {
            changed = self.status.changed() => {
                changed.ok()?;
                let status = *self.status.borrow_and_update();
                Some(Change::Status(status))
            }
            changed = self.locations.changed() => {
                changed.ok()?;
                let snapshot = self.locations.borrow_and_update().to_vec();
                Some(Change::Locations(snapshot))
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Detach { observer: self.id });
        debug!(observer = %self.id, "Subscription dropped");
    }
}

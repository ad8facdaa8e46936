// Location hub: the single owner of store, throttle and connection state
//
// All mutations are serialized through one actor task. Observers hold
// `Subscription`s that read `watch` snapshots and send commands.

mod actor;


use crate::config::{SupervisorConfig, ThrottleConfig};
use crate::fetch::BulkFetcher;
use crate::state::{Location, Snapshot};
use crate::subscription::Subscription;
use crate::supervisor::{ConnectionState, ConnectionStatus, UpstreamConnector};
use actor::HubActor;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

/// Commands accepted by the hub actor
#[derive(Debug)]
pub(crate) enum Command {
    /// An observer registered interest
    Attach { observer: Uuid },
    /// An observer went away
    Detach { observer: Uuid },
    /// Manual or observer-triggered resync
    Refresh,
}

/// Supervisor state and observer count as last published by the hub
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HubState {
    pub connection: ConnectionState,
    pub observers: usize,
}

/// Hub settings
#[derive(Clone, Debug, Default)]
pub struct HubConfig {
    pub throttle: ThrottleConfig,
    pub supervisor: SupervisorConfig,
}

/// Handle to a running location hub.
///
/// Cheap to clone. The actor stops once the hub handle and every
/// subscription have been dropped.
#[derive(Clone)]
pub struct LocationHub {
    commands: mpsc::UnboundedSender<Command>,
    locations: watch::Receiver<Snapshot>,
    status: watch::Receiver<ConnectionStatus>,
    state: watch::Receiver<HubState>,
}

impl LocationHub {
    /// Spawn the hub actor on the current tokio runtime
    pub fn new(
        config: HubConfig,
        fetcher: Arc<dyn BulkFetcher>,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let (actor, internal_rx) = HubActor::new(config, fetcher, connector);
        let locations = actor.subscribe_locations();
        let status = actor.subscribe_status();
        let state = actor.subscribe_state();

        tokio::spawn(actor.run(commands_rx, internal_rx));
        info!("Location hub started");

        Self {
            commands,
            locations,
            status,
            state,
        }
    }

    /// Register a new observer.
    ///
    /// Opens the upstream connection if this is the first observer and
    /// triggers a bulk fetch so the observer sees current state promptly.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(
            self.commands.clone(),
            self.locations.clone(),
            self.status.clone(),
        )
    }

    /// Current cached locations (copy)
    pub fn snapshot(&self) -> Vec<Location> {
        self.locations.borrow().to_vec()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> HubState {
        *self.state.borrow()
    }

    /// Request a resync without registering as an observer
    pub fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh);
    }

    /// Wait until the published hub state satisfies `predicate`
    pub async fn wait_for_state(&self, predicate: impl FnMut(&HubState) -> bool) -> HubState {
        let mut state = self.state.clone();
        if let Ok(current) = state.wait_for(predicate).await {
            return *current;
        }

        // Actor gone: report whatever was last published
        let last = *state.borrow();
        last
    }
}

use super::{Command, HubConfig, HubState};
use crate::config::UnknownEntityPolicy;
use crate::event::LocationUpdate;
use crate::fetch::BulkFetcher;
use crate::state::{Location, LocationStore, Snapshot, ThrottleGate};
use crate::supervisor::{
    ConnectionLoss, ConnectionStatus, ConnectionSupervisor, UpstreamConnector, UpstreamSignal,
};
use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Results reported back to the actor by tasks it spawned
pub(super) enum Internal {
    Upstream {
        generation: u64,
        signal: UpstreamSignal,
    },
    FetchDone {
        session: u64,
        result: Result<Vec<Location>>,
    },
    ReconnectDue {
        session: u64,
    },
}

/// The live connection task; aborted on drop
struct ActiveConnection {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns every piece of shared mutable state; runs as a single task
pub(super) struct HubActor {
    store: LocationStore,
    throttle: ThrottleGate,
    supervisor: ConnectionSupervisor,

    status_tx: watch::Sender<ConnectionStatus>,
    state_tx: watch::Sender<HubState>,

    fetcher: Arc<dyn BulkFetcher>,
    connector: Arc<dyn UpstreamConnector>,
    unknown_entity_policy: UnknownEntityPolicy,
    reconnect_delay: Duration,

    internal_tx: mpsc::UnboundedSender<Internal>,
    connection: Option<ActiveConnection>,
    reconnect_timer: Option<JoinHandle<()>>,

    /// Incremented for every opened connection
    next_generation: u64,
    /// Incremented on every teardown; stale fetches and timers are ignored
    session: u64,
    fetch_in_flight: bool,
    fetch_pending: bool,
}

impl HubActor {
    pub(super) fn new(
        config: HubConfig,
        fetcher: Arc<dyn BulkFetcher>,
        connector: Arc<dyn UpstreamConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<Internal>) {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new();
        let (status_tx, _) = watch::channel(supervisor.status());
        let (state_tx, _) = watch::channel(HubState {
            connection: supervisor.state(),
            observers: 0,
        });

        let actor = Self {
            store: LocationStore::new(),
            throttle: ThrottleGate::new(&config.throttle),
            supervisor,
            status_tx,
            state_tx,
            fetcher,
            connector,
            unknown_entity_policy: config.supervisor.unknown_entity_policy,
            reconnect_delay: Duration::from_secs(config.supervisor.reconnect_delay_seconds),
            internal_tx,
            connection: None,
            reconnect_timer: None,
            next_generation: 0,
            session: 0,
            fetch_in_flight: false,
            fetch_pending: false,
        };

        (actor, internal_rx)
    }

    pub(super) fn subscribe_locations(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    pub(super) fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub(super) fn subscribe_state(&self) -> watch::Receiver<HubState> {
        self.state_tx.subscribe()
    }

    /// Process commands until every hub handle and subscription is gone
    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                // Commands first so a detach is never starved by upstream traffic
                biased;

                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },

                Some(msg) = internal.recv() => self.handle_internal(msg),
            }
        }

        self.teardown();
        info!("Location hub stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Attach { observer } => {
                let first = self.supervisor.observer_joined();
                info!(
                    observer = %observer,
                    observers = self.supervisor.observers(),
                    "Observer attached"
                );

                if first {
                    self.open_connection();
                    self.request_fetch();
                }
            }
            Command::Detach { observer } => {
                let last = self.supervisor.observer_left();
                info!(
                    observer = %observer,
                    observers = self.supervisor.observers(),
                    "Observer detached"
                );

                if last {
                    self.teardown();
                }
            }
            Command::Refresh => self.request_fetch(),
        }

        self.publish();
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Upstream { generation, signal } => self.handle_signal(generation, signal),
            Internal::FetchDone { session, result } => self.handle_fetch_done(session, result),
            Internal::ReconnectDue { session } => {
                if session != self.session {
                    return;
                }
                self.reconnect_timer = None;

                if self.supervisor.reconnect_due() {
                    info!("Reconnecting to upstream");
                    self.open_connection();
                }
            }
        }

        self.publish();
    }

    fn handle_signal(&mut self, generation: u64, signal: UpstreamSignal) {
        let live = self
            .connection
            .as_ref()
            .is_some_and(|conn| conn.generation == generation);
        if !live {
            debug!(generation = generation, "Ignoring signal from released connection");
            return;
        }

        match signal {
            UpstreamSignal::Opened => {
                if self.supervisor.handshake_succeeded() {
                    info!(
                        connector = self.connector.name(),
                        generation = generation,
                        "Upstream connected"
                    );
                }
            }
            UpstreamSignal::Message(payload) => {
                if self.supervisor.accepts_events() {
                    self.handle_event(&payload);
                }
            }
            UpstreamSignal::Error(reason) => {
                warn!(error = %reason, "Upstream connection failed");
                self.connection_lost(ConnectionLoss::Failed);
            }
            UpstreamSignal::Closed => {
                warn!("Upstream closed the connection");
                self.connection_lost(ConnectionLoss::ClosedRemotely);
            }
        }
    }

    /// Validate, throttle and apply one raw event
    fn handle_event(&mut self, payload: &Value) {
        let update = match LocationUpdate::from_payload(payload) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Malformed location event, resyncing");
                self.request_fetch();
                return;
            }
        };

        // Unknown drivers are throttled too: at most one resync per throttle window
        let now = tokio::time::Instant::now().into_std();
        if !self
            .throttle
            .admit(&update.entity_id, update.latitude, update.longitude, now)
        {
            debug!(entity_id = %update.entity_id, "Location update throttled");
            return;
        }

        if self.unknown_entity_policy == UnknownEntityPolicy::Resync
            && !self.store.contains(&update.entity_id)
        {
            info!(entity_id = %update.entity_id, "Event for unknown driver, resyncing");
            self.request_fetch();
            return;
        }

        debug!(entity_id = %update.entity_id, "Location update admitted");
        self.store.upsert(update.into_location(Utc::now()));
    }

    fn handle_fetch_done(&mut self, session: u64, result: Result<Vec<Location>>) {
        if session != self.session {
            debug!(session = session, "Discarding fetch from torn-down session");
            return;
        }
        self.fetch_in_flight = false;

        match result {
            Ok(locations) => self.store.replace_all(locations),
            Err(e) => {
                // Keep the previous snapshot rather than flashing an empty map
                let reason = format!("{:#}", e);
                warn!(error = %reason, drivers = self.store.len(), "Location resync failed, keeping cached state");
            }
        }

        if self.fetch_pending {
            self.fetch_pending = false;
            self.request_fetch();
        }
    }

    /// Start a resync, coalescing with one already in flight
    fn request_fetch(&mut self) {
        if self.fetch_in_flight {
            self.fetch_pending = true;
            return;
        }
        self.fetch_in_flight = true;

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.internal_tx.clone();
        let session = self.session;

        // FetchDone is always reported, even if the fetcher panics
        tokio::spawn(async move {
            let result = match tokio::spawn(async move { fetcher.fetch_all().await }).await {
                Ok(result) => result,
                Err(e) => Err(anyhow!("Location fetch task failed: {}", e)),
            };
            let _ = tx.send(Internal::FetchDone { session, result });
        });
    }

    fn open_connection(&mut self) {
        self.next_generation += 1;
        let generation = self.next_generation;

        let connector = Arc::clone(&self.connector);
        let tx = self.internal_tx.clone();

        let task = tokio::spawn(async move {
            let mut signals = match connector.connect().await {
                Ok(signals) => signals,
                Err(e) => {
                    let _ = tx.send(Internal::Upstream {
                        generation,
                        signal: UpstreamSignal::Error(format!("{:#}", e)),
                    });
                    return;
                }
            };

            while let Some(signal) = signals.next().await {
                if tx.send(Internal::Upstream { generation, signal }).is_err() {
                    return;
                }
            }

            let _ = tx.send(Internal::Upstream {
                generation,
                signal: UpstreamSignal::Closed,
            });
        });

        debug!(generation = generation, "Opening upstream connection");
        self.connection = Some(ActiveConnection { generation, task });
    }

    fn connection_lost(&mut self, loss: ConnectionLoss) {
        self.connection = None;

        if self.supervisor.connection_lost(loss) {
            let delay = self.reconnect_delay;
            let tx = self.internal_tx.clone();
            let session = self.session;

            info!(delay_secs = delay.as_secs(), "Scheduling upstream reconnect");
            self.reconnect_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Internal::ReconnectDue { session });
            }));
        }
    }

    /// Release the connection and cancel pending work
    fn teardown(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        let had_connection = self.connection.take().is_some();

        self.supervisor.close();
        self.session += 1;
        self.fetch_in_flight = false;
        self.fetch_pending = false;

        if had_connection {
            info!("Upstream connection closed");
        }
    }

    /// Push status and hub state to observers when they changed
    fn publish(&self) {
        let status = self.supervisor.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        let state = HubState {
            connection: self.supervisor.state(),
            observers: self.supervisor.observers(),
        };
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

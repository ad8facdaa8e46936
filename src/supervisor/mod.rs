// Connection supervision: ref-counted lifecycle of the upstream feed
//
// The state machine here is pure; the hub actor performs the I/O each
// transition asks for (open, teardown, schedule reconnect).

mod upstream;

#[cfg(test)]
mod tests;

pub use upstream::{UpstreamConnector, UpstreamSignal};

use serde::Serialize;
use std::fmt;

/// Observer-facing connection status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Reconnecting => write!(f, "Reconnecting"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Supervisor state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No connection, no observers
    Closed,
    Connecting,
    Connected,
    Reconnecting,
}

/// Why a live connection went away
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionLoss {
    /// Error or timeout
    Failed,
    /// Closed by the upstream without a teardown request
    ClosedRemotely,
}

/// Ref-counted connection state machine.
///
/// A connection is wanted exactly when `observers > 0`; only `close()`
/// (hub shutdown) may leave observers registered in `Closed`.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    state: ConnectionState,
    status: ConnectionStatus,
    observers: usize,
    /// A reconnect attempt is pending
    retry_scheduled: bool,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Closed,
            status: ConnectionStatus::Disconnected,
            observers: 0,
            retry_scheduled: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn observers(&self) -> usize {
        self.observers
    }

    pub fn retry_scheduled(&self) -> bool {
        self.retry_scheduled
    }

    /// Raw events are only applied while the feed is live
    pub fn accepts_events(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Register an observer.
    ///
    /// Returns true on 0→1: the caller must open the connection and run
    /// the initial bulk fetch.
    pub fn observer_joined(&mut self) -> bool {
        self.observers += 1;

        if self.state == ConnectionState::Closed {
            self.state = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    /// Unregister an observer.
    ///
    /// Returns true on N→0: the caller must tear the connection down.
    pub fn observer_left(&mut self) -> bool {
        self.observers = self.observers.saturating_sub(1);

        if self.observers == 0 && self.state != ConnectionState::Closed {
            self.close();
            true
        } else {
            false
        }
    }

    /// Handshake completed. Returns true when the transition was taken.
    pub fn handshake_succeeded(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connected;
                self.status = ConnectionStatus::Connected;
                self.retry_scheduled = false;
                true
            }
            ConnectionState::Connected | ConnectionState::Closed => false,
        }
    }

    /// The live connection (or an attempt to open one) failed.
    ///
    /// Returns true when the caller must schedule a reconnect attempt; at
    /// most one attempt is pending at a time.
    pub fn connection_lost(&mut self, loss: ConnectionLoss) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }

        self.state = ConnectionState::Reconnecting;
        self.status = match loss {
            ConnectionLoss::Failed => ConnectionStatus::Reconnecting,
            ConnectionLoss::ClosedRemotely => ConnectionStatus::Disconnected,
        };

        if self.retry_scheduled {
            false
        } else {
            self.retry_scheduled = true;
            true
        }
    }

    /// The reconnect delay elapsed.
    ///
    /// Returns true when the caller must open a new connection: observers
    /// remain and the supervisor is still reconnecting.
    pub fn reconnect_due(&mut self) -> bool {
        if !self.retry_scheduled {
            return false;
        }
        self.retry_scheduled = false;

        self.observers > 0 && self.state == ConnectionState::Reconnecting
    }

    /// Explicit teardown: any state → Closed
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.status = ConnectionStatus::Disconnected;
        self.retry_scheduled = false;
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

use super::*;

fn connected(observers: usize) -> ConnectionSupervisor {
    let mut sup = ConnectionSupervisor::new();
    for _ in 0..observers {
        sup.observer_joined();
    }
    assert!(sup.handshake_succeeded());
    sup
}

#[test]
fn test_starts_closed_and_disconnected() {
    let sup = ConnectionSupervisor::new();
    assert_eq!(sup.state(), ConnectionState::Closed);
    assert_eq!(sup.status(), ConnectionStatus::Disconnected);
    assert_eq!(sup.observers(), 0);
    assert!(!sup.accepts_events());
}

#[test]
fn test_first_observer_opens() {
    let mut sup = ConnectionSupervisor::new();

    assert!(sup.observer_joined());
    assert_eq!(sup.state(), ConnectionState::Connecting);
    assert_eq!(sup.status(), ConnectionStatus::Disconnected);

    // Second observer shares the connection
    assert!(!sup.observer_joined());
    assert_eq!(sup.observers(), 2);
}

#[test]
fn test_handshake_connects() {
    let mut sup = ConnectionSupervisor::new();
    sup.observer_joined();

    assert!(sup.handshake_succeeded());
    assert_eq!(sup.state(), ConnectionState::Connected);
    assert_eq!(sup.status(), ConnectionStatus::Connected);
    assert!(sup.accepts_events());

    // Duplicate handshake is not a transition
    assert!(!sup.handshake_succeeded());
}

#[test]
fn test_handshake_ignored_when_closed() {
    let mut sup = ConnectionSupervisor::new();
    assert!(!sup.handshake_succeeded());
    assert_eq!(sup.state(), ConnectionState::Closed);
}

#[test]
fn test_last_observer_tears_down() {
    let mut sup = connected(2);

    assert!(!sup.observer_left());
    assert_eq!(sup.state(), ConnectionState::Connected);

    assert!(sup.observer_left());
    assert_eq!(sup.state(), ConnectionState::Closed);
    assert_eq!(sup.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_observer_left_never_underflows() {
    let mut sup = ConnectionSupervisor::new();
    assert!(!sup.observer_left());
    assert_eq!(sup.observers(), 0);
}

#[test]
fn test_error_while_connected_schedules_one_retry() {
    let mut sup = connected(1);

    assert!(sup.connection_lost(ConnectionLoss::Failed));
    assert_eq!(sup.state(), ConnectionState::Reconnecting);
    assert_eq!(sup.status(), ConnectionStatus::Reconnecting);
    assert!(sup.retry_scheduled());
    assert!(!sup.accepts_events());

    // A second error before the retry fires does not schedule another
    assert!(!sup.connection_lost(ConnectionLoss::Failed));
}

#[test]
fn test_remote_close_reports_disconnected() {
    let mut sup = connected(1);

    assert!(sup.connection_lost(ConnectionLoss::ClosedRemotely));
    assert_eq!(sup.state(), ConnectionState::Reconnecting);
    assert_eq!(sup.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_reconnect_due_reopens_with_observers() {
    let mut sup = connected(1);
    sup.connection_lost(ConnectionLoss::Failed);

    assert!(sup.reconnect_due());
    assert!(!sup.retry_scheduled());
    assert_eq!(sup.state(), ConnectionState::Reconnecting);

    assert!(sup.handshake_succeeded());
    assert_eq!(sup.status(), ConnectionStatus::Connected);
}

#[test]
fn test_reconnect_cancelled_without_observers() {
    let mut sup = connected(1);
    sup.connection_lost(ConnectionLoss::Failed);

    assert!(sup.observer_left());
    assert_eq!(sup.state(), ConnectionState::Closed);
    assert!(!sup.retry_scheduled());

    assert!(!sup.reconnect_due());
    assert_eq!(sup.state(), ConnectionState::Closed);
}

#[test]
fn test_failed_attempt_schedules_next_retry() {
    let mut sup = connected(1);
    sup.connection_lost(ConnectionLoss::Failed);
    assert!(sup.reconnect_due());

    // The reconnect attempt itself fails
    assert!(sup.connection_lost(ConnectionLoss::Failed));
    assert!(sup.retry_scheduled());
}

#[test]
fn test_failed_initial_open_schedules_retry() {
    let mut sup = ConnectionSupervisor::new();
    sup.observer_joined();

    assert!(sup.connection_lost(ConnectionLoss::Failed));
    assert_eq!(sup.state(), ConnectionState::Reconnecting);
    assert_eq!(sup.status(), ConnectionStatus::Reconnecting);
}

#[test]
fn test_loss_ignored_when_closed() {
    let mut sup = ConnectionSupervisor::new();
    assert!(!sup.connection_lost(ConnectionLoss::Failed));
    assert_eq!(sup.state(), ConnectionState::Closed);
}

#[test]
fn test_rejoin_after_teardown_reopens() {
    let mut sup = connected(1);
    assert!(sup.observer_left());

    assert!(sup.observer_joined());
    assert_eq!(sup.state(), ConnectionState::Connecting);
}

#[test]
fn test_status_display_is_verbatim() {
    assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
    assert_eq!(ConnectionStatus::Reconnecting.to_string(), "Reconnecting");
    assert_eq!(ConnectionStatus::Disconnected.to_string(), "Disconnected");
    assert_eq!(
        serde_json::to_string(&ConnectionStatus::Reconnecting).unwrap(),
        "\"Reconnecting\""
    );
}

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Connection manager tests against the scripted mock connector.
//!
//! Timing-sensitive tests run on a paused clock, so backoff delays elapse
//! instantly but in order.

mod common;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use somo_client::protocol::{ClientAction, ServerEvent, ServerEventKind};
use somo_client::transport::{CloseCode, CloseFrame};
use somo_client::{ClientConfig, ConnectionManager, ConnectionSignal, ConnectionState, SomoError};

use common::{
    lobby_room, next_signal, number, record_events, record_signals, room_state, settle,
    MockConnector, Plan,
};

fn manager(connector: &MockConnector) -> ConnectionManager<MockConnector> {
    ConnectionManager::new(connector.clone(), ClientConfig::new("ws://somo.test/ws"))
}

// ════════════════════════════════════════════════════════════════════
// connect / send
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn connect_opens_and_signals_connected() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);

    manager.connect().await.unwrap();

    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_open_one_transport() {
    let connector = MockConnector::new();
    connector.set_open_delay(Duration::from_millis(100));
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);

    let (first, second) = tokio::join!(manager.connect(), manager.connect());
    first.unwrap();
    second.unwrap();

    // A third call on an open connection is also a no-op.
    manager.connect().await.unwrap();

    assert_eq!(connector.attempts(), 1);
    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);
    settle().await;
    assert!(signals.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_returns_false() {
    let connector = MockConnector::new();
    let manager = manager(&connector);

    let sent = manager.send(ClientAction::StartGame {
        room_id: "ABC123".into(),
    });

    assert!(!sent);
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_while_open_reaches_the_server() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    manager.connect().await.unwrap();

    let action = ClientAction::JoinRoom {
        room_id: "ABC123".into(),
        nickname: "Ana".into(),
    };
    assert!(manager.send(action.clone()));
    settle().await;

    let server = connector.server(0);
    assert_eq!(server.sent_actions(), vec![action]);
    assert_eq!(
        server.sent(),
        vec![r#"{"action":"join_room","room_id":"ABC123","nickname":"Ana"}"#]
    );
}

#[tokio::test(start_paused = true)]
async fn actions_are_not_replayed_after_reconnect() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    connector.server(0).close(1006, "lost");

    // Drain Connected, Disconnected, ReconnectScheduled.
    for _ in 0..3 {
        next_signal(&mut signals).await;
    }
    assert!(!manager.send(ClientAction::PassTurn {
        room_id: "ABC123".into()
    }));

    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);
    settle().await;
    assert!(connector.server(1).sent().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Reconnection
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn backoff_doubles_and_stops_after_five_attempts() {
    let connector = MockConnector::new();
    connector.script([Plan::Accept]);
    connector.script([Plan::Refuse("down"); 5]);
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);

    manager.connect().await.unwrap();
    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);
    connector.server(0).close(1006, "lost");

    let mut scheduled = Vec::new();
    loop {
        match next_signal(&mut signals).await {
            ConnectionSignal::ReconnectScheduled { attempt, delay } => {
                scheduled.push((attempt, delay.as_millis() as u64));
            }
            ConnectionSignal::ReconnectExhausted { attempts } => {
                assert_eq!(attempts, 5);
                break;
            }
            ConnectionSignal::Connected => panic!("no attempt should have succeeded"),
            ConnectionSignal::Disconnected { .. } | ConnectionSignal::Error { .. } => {}
        }
    }

    assert_eq!(
        scheduled,
        vec![(1, 1000), (2, 2000), (3, 4000), (4, 8000), (5, 16000)]
    );

    let times = connector.attempt_times();
    assert_eq!(times.len(), 6);
    for (gap, expected) in times.windows(2).zip([1000u64, 2000, 4000, 8000, 16000]) {
        let waited = gap[1].duration_since(gap[0]);
        assert!(
            waited >= Duration::from_millis(expected)
                && waited < Duration::from_millis(expected + 5),
            "expected ~{expected}ms, waited {waited:?}"
        );
    }

    // Nothing else is scheduled once exhausted.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempts(), 6);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn manual_connect_after_exhaustion_resets_counter() {
    let connector = MockConnector::new();
    connector.script([Plan::Refuse("down"); 6]);
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, SomoError::ConnectionFailed(_)));

    loop {
        if let ConnectionSignal::ReconnectExhausted { .. } = next_signal(&mut signals).await {
            break;
        }
    }
    assert_eq!(manager.reconnect_attempts(), 5);

    manager.connect().await.unwrap();
    assert_eq!(manager.reconnect_attempts(), 0);
    assert!(manager.is_open());
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_resets_counter() {
    let connector = MockConnector::new();
    connector.script([Plan::Accept, Plan::Refuse("down"), Plan::Accept]);
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    connector.server(0).close(4001, "kicked");

    let mut seen = Vec::new();
    loop {
        let signal = next_signal(&mut signals).await;
        seen.push(signal.clone());
        if seen.len() > 1 && signal == ConnectionSignal::Connected {
            break;
        }
    }
    assert!(seen.contains(&ConnectionSignal::ReconnectScheduled {
        attempt: 2,
        delay: Duration::from_millis(2000)
    }));
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn server_normal_close_does_not_reconnect() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    next_signal(&mut signals).await;

    connector.server(0).close(1000, "bye");
    assert_eq!(
        next_signal(&mut signals).await,
        ConnectionSignal::Disconnected {
            code: CloseCode::NORMAL,
            reason: "bye".into()
        }
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(signals.try_recv().is_err());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_normally_without_reconnect() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    next_signal(&mut signals).await;

    manager.disconnect();

    match next_signal(&mut signals).await {
        ConnectionSignal::Disconnected { code, .. } => assert_eq!(code, CloseCode::NORMAL),
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert_eq!(
        connector.server(0).closed_with(),
        Some(CloseFrame::normal("Client disconnect"))
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(signals.try_recv().is_err());
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connecting_aborts_attempt() {
    let connector = MockConnector::new();
    connector.set_open_delay(Duration::from_millis(100));
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Connecting);
    manager.disconnect();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(SomoError::ConnectAborted)));
    assert_eq!(
        connector.server(0).closed_with(),
        Some(CloseFrame::normal("Client disconnect"))
    );
    assert!(matches!(
        next_signal(&mut signals).await,
        ConnectionSignal::Disconnected {
            code: CloseCode::NORMAL,
            ..
        }
    ));
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn disconnect_after_manual_reconnect_cancels_earlier_timer() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    connector.server(0).close(1006, "lost");

    // Drain Connected, Disconnected, ReconnectScheduled.
    for _ in 0..3 {
        next_signal(&mut signals).await;
    }

    // Reconnect by hand before the 1 s timer fires, then leave.
    tokio::time::sleep(Duration::from_millis(10)).await;
    manager.connect().await.unwrap();
    manager.disconnect();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn earlier_timer_does_not_touch_a_newer_connection() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    connector.server(0).close(1006, "lost");
    for _ in 0..3 {
        next_signal(&mut signals).await;
    }

    manager.connect().await.unwrap();
    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);

    // The new connection drops normally after the old timer's deadline passed.
    tokio::time::sleep(Duration::from_secs(2)).await;
    connector.server(1).close(1000, "bye");
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.attempts(), 2);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_one_abnormal_close() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut signals = record_signals(&manager);
    manager.connect().await.unwrap();
    next_signal(&mut signals).await;

    connector.server(0).fail("connection reset");

    assert!(matches!(
        next_signal(&mut signals).await,
        ConnectionSignal::Error { .. }
    ));
    assert!(matches!(
        next_signal(&mut signals).await,
        ConnectionSignal::Disconnected {
            code: CloseCode::ABNORMAL,
            ..
        }
    ));
    assert_eq!(
        next_signal(&mut signals).await,
        ConnectionSignal::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(1000)
        }
    );
    assert_eq!(next_signal(&mut signals).await, ConnectionSignal::Connected);
    assert_eq!(connector.attempts(), 2);
}

// ════════════════════════════════════════════════════════════════════
// Event dispatch
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut events = record_events(&manager);
    manager.connect().await.unwrap();

    let server = connector.server(0);
    server.push("this is not json");
    server.push(r#"{"event":"penalty","player_id":"p1"}"#);
    server.push(r#"{"event":"round_started","limit":17}"#);
    settle().await;

    assert_eq!(
        events.try_recv().unwrap(),
        ServerEvent::RoundStarted { limit: 17 }
    );
    assert!(events.try_recv().is_err());
    assert!(manager.is_open());
}

#[tokio::test(start_paused = true)]
async fn unknown_events_reach_the_wildcard_only() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let mut events = record_events(&manager);
    let specific = Arc::new(StdMutex::new(0));
    let counter = Arc::clone(&specific);
    manager.on(ServerEventKind::RoundStarted, move |_| {
        *counter.lock().unwrap() += 1;
    });
    manager.connect().await.unwrap();

    connector.server(0).push(r#"{"event":"dice_rolled","faces":[3,4]}"#);
    settle().await;

    assert_eq!(events.try_recv().unwrap(), ServerEvent::Unknown);
    assert_eq!(*specific.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn specific_handler_runs_before_wildcard() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let order = Arc::new(StdMutex::new(Vec::new()));

    let log = Arc::clone(&order);
    manager.on(ServerEventKind::RoomState, move |_| {
        log.lock().unwrap().push("specific");
    });
    let log = Arc::clone(&order);
    manager.on_any(move |_| log.lock().unwrap().push("any"));
    manager.connect().await.unwrap();

    connector
        .server(0)
        .push_event(&room_state(lobby_room(), vec![number("c1", 3)], "p1"));
    settle().await;

    assert_eq!(*order.lock().unwrap(), vec!["specific", "any"]);
}

#[tokio::test(start_paused = true)]
async fn later_handler_replaces_earlier_and_off_removes() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let hits = Arc::new(StdMutex::new(Vec::new()));

    let log = Arc::clone(&hits);
    manager.on(ServerEventKind::RoundStarted, move |_| {
        log.lock().unwrap().push("first");
    });
    let log = Arc::clone(&hits);
    manager.on(ServerEventKind::RoundStarted, move |_| {
        log.lock().unwrap().push("second");
    });
    manager.connect().await.unwrap();

    let server = connector.server(0);
    server.push(r#"{"event":"round_started","limit":12}"#);
    settle().await;
    manager.off(ServerEventKind::RoundStarted);
    server.push(r#"{"event":"round_started","limit":13}"#);
    settle().await;

    assert_eq!(*hits.lock().unwrap(), vec!["second"]);
}

//! Session connector driving the phase machine end to end

mod helpers;

use countgame_client::audio::PlaybackController;
use countgame_client::events::{ClientEvent, GamePhase};
use countgame_client::game::machine::FATAL_CONNECTION_MESSAGE;
use countgame_client::session::{
    BackoffPolicy, ConnectionSignal, ConnectionState, SessionConnector, SessionInput,
};
use countgame_client::{ClientConfig, UserAction};
use helpers::harness::{camera_started, number_started, play};
use helpers::{Harness, MockConnector, ServerEnd};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn wait_until_received(server: &ServerEnd, expected: &ClientEvent) {
    for _ in 0..200 {
        if server.received().contains(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server never received {:?}", expected);
}

#[tokio::test(start_paused = true)]
async fn test_game_session_over_connector() {
    let connector = Arc::new(MockConnector::new());
    let server = connector.accept_next();
    let config = ClientConfig::default();
    let (handle, inputs, session) =
        SessionConnector::start(connector.clone(), config.connection.backoff());

    let Harness {
        machine,
        output,
        ui,
        audio,
        ..
    } = Harness::build(config, &[], handle).await;
    let controller: Arc<PlaybackController> = Arc::clone(&audio.controller);
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let running = tokio::spawn(machine.run(inputs, action_rx));

    server.push(camera_started());
    server.push(number_started(1));
    server.push(play("number_1"));
    wait_until_received(
        &server,
        &ClientEvent::AudioFinished {
            file: "number_1".to_string(),
        },
    )
    .await;
    assert_eq!(output.played(), vec!["numbers/one.mp3"]);

    action_tx.send(UserAction::Restart).unwrap();
    wait_until_received(&server, &ClientEvent::RestartGame {}).await;

    // Server goes away for good: one loss, then the retry budget runs out
    drop(server);
    let snapshot = running.await.unwrap();

    assert_eq!(snapshot.phase, GamePhase::CountingGame);
    assert_eq!(snapshot.connection, ConnectionState::Error);
    assert_eq!(snapshot.active_number.map(|c| c.number), Some(1));
    assert!(!snapshot.muted);
    assert!(!controller.is_muted());
    assert_eq!(ui.errors(), vec![FATAL_CONNECTION_MESSAGE.to_string()]);
    assert_eq!(connector.attempts(), 6);
    assert_eq!(session.join().await, ConnectionState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_events_sent_while_connecting_are_delivered() {
    let connector = Arc::new(MockConnector::new());
    connector.refuse_next();
    let server = connector.accept_next();
    let backoff = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 3);
    let (handle, mut inputs, session) = SessionConnector::start(connector.clone(), backoff);

    handle.send(ClientEvent::RequestCameraTest {}).unwrap();
    wait_until_received(&server, &ClientEvent::RequestCameraTest {}).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    server.push(camera_started());
    let mut received = Vec::new();
    while received.len() < 3 {
        received.push(inputs.recv().await.unwrap());
    }

    assert!(matches!(
        received[0],
        SessionInput::Connection(ConnectionSignal::Retrying { attempt: 1, delay, .. })
            if delay == Duration::from_millis(200)
    ));
    assert!(matches!(
        received[1],
        SessionInput::Connection(ConnectionSignal::Connected)
    ));
    assert!(matches!(received[2], SessionInput::Server(_)));

    assert_eq!(session.shutdown().await, ConnectionState::Disconnected);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_drop_resumes_game() {
    let connector = Arc::new(MockConnector::new());
    let first = connector.accept_next();
    let second = connector.accept_next();
    let config = ClientConfig::default();
    let (handle, inputs, session) =
        SessionConnector::start(connector.clone(), config.connection.backoff());

    let Harness { machine, ui, .. } = Harness::build(config, &[], handle).await;
    let (_action_tx, action_rx) = mpsc::unbounded_channel();
    let running = tokio::spawn(machine.run(inputs, action_rx));

    first.push(camera_started());
    drop(first);

    second.push(number_started(2));
    second.push(play("number_2"));
    wait_until_received(
        &second,
        &ClientEvent::AudioFinished {
            file: "number_2".to_string(),
        },
    )
    .await;

    assert!(ui.errors().is_empty());
    assert_eq!(session.shutdown().await, ConnectionState::Disconnected);
    let snapshot = running.await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::CountingGame);
    assert_eq!(snapshot.active_number.map(|c| c.number), Some(2));
}

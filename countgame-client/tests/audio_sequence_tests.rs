//! Cue playback through the phase machine
//!
//! Uses paused tokio time: clip and speech durations, inter-cue pauses and
//! retries all advance instantly once every task is idle.

mod helpers;

use countgame_client::audio::FallbackPolicy;
use countgame_client::events::{ClientEvent, GamePhase, ServerEvent};
use countgame_client::session::SessionHandle;
use countgame_client::{ClientConfig, UserAction};
use helpers::harness::{camera_started, play, sequence};
use helpers::Harness;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_sequence_plays_in_order_and_reports_each_cue() {
    let mut h = Harness::new().await;
    h.start_counting();

    h.machine
        .handle_server_event(sequence(&["number_1", "number_2", "try_again"]));
    h.machine.settle().await;

    assert_eq!(
        h.output.played(),
        vec![
            "numbers/one.mp3",
            "numbers/two.mp3",
            "feedback/try-again.mp3"
        ]
    );
    assert_eq!(h.finished_cues(), vec!["number_1", "number_2", "try_again"]);

    // 500 ms clip followed by the 1000 ms pause
    let starts = h.output.start_times();
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(1500));
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_interrupts_sequence() {
    let mut h = Harness::new().await;
    h.start_counting();

    h.machine
        .handle_server_event(sequence(&["number_1", "number_2", "number_3"]));
    while h.output.played().is_empty() {
        tokio::task::yield_now().await;
    }

    h.machine.handle_server_event(ServerEvent::GameRestarted {});
    h.machine.settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.output.played(), vec!["numbers/one.mp3"]);
    assert!(h.finished_cues().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_phase_change_discards_greeting_started_while_waiting() {
    let mut h = Harness::new().await;
    h.feed(vec![camera_started()]);

    h.machine
        .handle_server_event(sequence(&["hi_ready_to_play", "show_me_your_fingers"]));
    while h.output.played().is_empty() {
        tokio::task::yield_now().await;
    }
    h.feed(vec![helpers::harness::number_started(1)]);
    h.machine.settle().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.output.played(), vec!["feedback/hi-there.mp3"]);
    assert!(h.finished_cues().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_cue_skipped_and_counted() {
    let mut h = Harness::new().await;
    h.start_counting();

    h.machine
        .handle_server_event(sequence(&["number_1", "number_99", "number_2"]));
    h.machine.settle().await;

    assert_eq!(
        h.output.played(),
        vec!["numbers/one.mp3", "numbers/two.mp3"]
    );
    assert_eq!(h.finished_cues(), vec!["number_1", "number_2"]);
    assert_eq!(h.machine.diagnostics().unknown_cues(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_number_spoken_instead() {
    let mut h = Harness::with_missing(&["numbers/two.mp3"]).await;
    h.start_counting();

    h.machine.handle_server_event(play("number_2"));
    h.machine.settle().await;

    assert!(h.output.played().is_empty());
    assert_eq!(h.speech.spoken(), vec!["two"]);
    assert_eq!(h.finished_cues(), vec!["number_2"]);
}

#[tokio::test(start_paused = true)]
async fn test_strict_category_reports_nothing_on_missing_asset() {
    let mut config = ClientConfig::default();
    config.audio.fallback.numbers = FallbackPolicy::Strict;
    let (handle, mut outbound) = SessionHandle::detached();
    let mut h = Harness::build(config, &["numbers/two.mp3"], handle).await;
    h.start_counting();

    h.machine.handle_server_event(play("number_2"));
    h.machine.settle().await;

    assert!(h.output.played().is_empty());
    assert!(h.speech.spoken().is_empty());
    assert!(outbound.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_retried_on_next_request() {
    let mut h = Harness::with_missing(&["numbers/three.mp3"]).await;
    h.start_counting();

    h.machine.handle_server_event(play("number_3"));
    h.machine.settle().await;
    assert_eq!(h.speech.spoken(), vec!["three"]);

    h.loader.set_missing("numbers/three.mp3", false);
    h.machine.handle_server_event(play("number_3"));
    h.machine.settle().await;

    assert_eq!(h.output.played(), vec!["numbers/three.mp3"]);
    assert_eq!(
        h.loader.calls(),
        vec!["numbers/three.mp3", "numbers/three.mp3"]
    );
    assert_eq!(h.finished_cues(), vec!["number_3", "number_3"]);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_cue_loaded_once() {
    let mut h = Harness::new().await;
    h.start_counting();

    h.machine
        .handle_server_event(sequence(&["number_1", "number_1"]));
    h.machine.settle().await;

    assert_eq!(h.output.played().len(), 2);
    assert_eq!(h.loader.calls(), vec!["numbers/one.mp3"]);
}

#[tokio::test(start_paused = true)]
async fn test_muted_cues_still_reported() {
    let mut h = Harness::new().await;
    h.start_counting();
    h.machine.handle_user_action(UserAction::ToggleMute).await;

    h.machine.handle_server_event(play("lets_start_counting"));
    h.machine.settle().await;

    assert!(h.output.played().is_empty());
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.finished_cues(), vec!["lets_start_counting"]);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_cue_replayed_after_user_gesture() {
    let mut h = Harness::new().await;
    h.feed(vec![camera_started()]);
    h.output.refuse_until_resumed();

    h.machine.handle_server_event(play("hi_ready_to_play"));
    h.machine.settle().await;
    assert!(h.output.played().is_empty());
    assert!(h.finished_cues().is_empty());
    assert!(h.audio.controller.has_deferred().await);

    h.machine.handle_user_action(UserAction::Gesture).await;
    h.machine.settle().await;

    assert_eq!(h.output.played(), vec!["feedback/hi-there.mp3"]);
    assert!(!h.audio.controller.has_deferred().await);
    assert_eq!(h.finished_cues(), vec!["hi_ready_to_play"]);
}

#[tokio::test(start_paused = true)]
async fn test_refused_cue_stops_its_sequence() {
    let mut h = Harness::new().await;
    h.start_counting();
    h.output.refuse_until_resumed();

    h.machine
        .handle_server_event(sequence(&["number_1", "number_2", "number_3"]));
    h.machine.settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.output.played().is_empty());

    h.machine.handle_user_action(UserAction::Gesture).await;
    h.machine.settle().await;

    // Only the refused cue comes back; the rest of the sequence was dropped
    assert_eq!(h.output.played(), vec!["numbers/one.mp3"]);
    assert_eq!(h.finished_cues(), vec!["number_1"]);
}

#[tokio::test(start_paused = true)]
async fn test_cue_refused_before_restart_not_replayed_later() {
    let mut h = Harness::new().await;
    h.start_counting();
    h.output.refuse_until_resumed();

    h.machine.handle_server_event(play("number_1"));
    h.machine.settle().await;
    assert!(h.audio.controller.has_deferred().await);

    h.machine.handle_server_event(ServerEvent::GameRestarted {});
    h.machine
        .handle_user_action(UserAction::RequestCameraTest)
        .await;
    h.machine.settle().await;

    assert!(h.output.played().is_empty());
    assert!(!h.audio.controller.has_deferred().await);
    let sent = h.sent();
    assert!(sent.contains(&ClientEvent::RequestCameraTest {}));
    assert!(sent
        .iter()
        .all(|e| !matches!(e, ClientEvent::AudioFinished { .. })));
    assert_eq!(h.machine.phase(), GamePhase::CameraTest);
}

#[tokio::test(start_paused = true)]
async fn test_positive_feedback_not_reported() {
    let mut h = Harness::new().await;
    h.start_counting();

    h.machine
        .handle_server_event(ServerEvent::PlayRandomPositiveFeedback {});
    h.machine.settle().await;

    let played = h.output.played();
    assert_eq!(played.len(), 1);
    assert!(["feedback/great-job.mp3", "feedback/amazing.mp3"].contains(&played[0].as_str()));
    assert!(h
        .sent()
        .iter()
        .all(|e| !matches!(e, ClientEvent::AudioFinished { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_audio_events_ignored_during_setup() {
    let mut h = Harness::new().await;

    h.machine.handle_server_event(play("number_1"));
    h.machine.settle().await;

    assert!(h.output.played().is_empty());
    assert!(h.loader.calls().is_empty());
    assert_eq!(h.machine.diagnostics().unexpected_total(), 1);
}

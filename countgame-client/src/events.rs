//! Event system for the counting game client
//!
//! Two kinds of traffic flow through the client:
//! - **Wire events** (re-exported from countgame-common): server → client and
//!   client → server messages, carried by the session connector.
//! - **Audio events** (this module): in-process "finished" signals from the
//!   playback controller, broadcast on an [`EventBus`].

pub use countgame_common::events::{
    CameraInfo, CameraState, ClientEvent, GamePhase, GestureObservation, ServerEvent,
};

use tokio::sync::broadcast;

/// Completion signals published by the playback controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// A recorded resource played to its natural end
    PlaybackFinished {
        /// Resource key (resolved asset path)
        resource: String,
    },

    /// A synthetic utterance finished (not cancelled)
    SpeechFinished { text: String },
}

/// Broadcast bus for [`AudioEvent`]s
///
/// Uses tokio::broadcast: publishing never blocks, subscribers that fall
/// behind observe a `Lagged` error instead of stalling playback.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudioEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.tx.subscribe()
    }

    /// Publish without caring whether anyone listens
    pub fn emit_lossy(&self, event: AudioEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_harmless() {
        let bus = EventBus::new(10);
        bus.emit_lossy(AudioEvent::SpeechFinished { text: "one".into() });

        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(AudioEvent::PlaybackFinished {
            resource: "numbers/one.mp3".into(),
        });
        bus.emit_lossy(AudioEvent::SpeechFinished { text: "two".into() });

        assert_eq!(
            rx.recv().await.unwrap(),
            AudioEvent::PlaybackFinished {
                resource: "numbers/one.mp3".into()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AudioEvent::SpeechFinished { text: "two".into() }
        );
    }
}

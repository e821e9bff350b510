//! Camera event bus
//!
//! Pipelines, the health monitor and the control surface publish
//! [`SystemEvent`]s here. WebSocket clients pick the ones they care about
//! with a [`TopicFilter`] (`*`, `motion.*`, `recording.started`, ...).

pub mod types;

pub use types::SystemEvent;

use tokio::sync::broadcast;
use tracing::trace;

/// Events a slow subscriber may fall behind before it sees `Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver an event to every subscriber, returning how many received it
    ///
    /// Nobody listening is normal (no WebSocket clients), not an error.
    pub fn publish(&self, event: SystemEvent) -> usize {
        trace!(
            camera = event.camera().unwrap_or("-"),
            "event {}",
            event.event_name()
        );
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Topics one subscriber asked for; empty means nothing is forwarded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicFilter {
    topics: Vec<String>,
}

impl TopicFilter {
    /// Replace the subscribed topics
    pub fn subscribe(&mut self, topics: Vec<String>) {
        self.topics = topics;
    }

    pub fn unsubscribe(&mut self, topics: &[String]) {
        self.topics.retain(|t| !topics.contains(t));
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn matches(&self, event: &SystemEvent) -> bool {
        self.topics.iter().any(|topic| event.matches_topic(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;

    fn status(camera: &str) -> SystemEvent {
        SystemEvent::CameraStatusChanged {
            camera: camera.to_string(),
            status: CameraState::Online,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut porch = bus.subscribe();
        let mut garage = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(
            bus.publish(SystemEvent::RecordingFlagChanged {
                camera: "porch".to_string(),
                recording: true,
            }),
            2
        );

        for rx in [&mut porch, &mut garage] {
            assert!(matches!(
                rx.recv().await.unwrap(),
                SystemEvent::RecordingFlagChanged { recording: true, .. }
            ));
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(status("porch")), 0);
    }

    #[test]
    fn test_topic_filter() {
        let mut filter = TopicFilter::default();
        assert!(!filter.matches(&status("porch")));

        filter.subscribe(vec!["camera.*".to_string(), "motion.detected".to_string()]);
        assert!(filter.matches(&status("porch")));
        assert!(!filter.matches(&SystemEvent::SystemReset));

        filter.unsubscribe(&["camera.*".to_string()]);
        assert_eq!(filter.topics(), ["motion.detected".to_string()]);
        assert!(!filter.matches(&status("porch")));

        filter.subscribe(vec!["*".to_string()]);
        assert!(filter.matches(&SystemEvent::SystemReset));
    }
}

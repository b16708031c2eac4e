use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use turnstile::{EventPublisher, ParticipantId, QueueEvent, QueueEventPayload};

/// Event publisher that keeps everything it is given.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().clone()
    }

    pub fn payloads(&self) -> Vec<QueueEventPayload> {
        self.events.lock().iter().map(|e| e.payload.clone()).collect()
    }

    /// Payloads published for one participant, in order.
    pub fn payloads_for(&self, id: &str) -> Vec<QueueEventPayload> {
        let id = ParticipantId::from(id);
        self.events
            .lock()
            .iter()
            .filter(|e| e.participant_id() == &id)
            .map(|e| e.payload.clone())
            .collect()
    }

    pub fn assert_count_eq(&self, expected: usize) {
        let actual = self.events.lock().len();
        assert_eq!(actual, expected, "Expected {expected} events, got {actual}");
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventPublisher<QueueEvent> for RecordingPublisher {
    async fn publish(&self, event: QueueEvent) -> anyhow::Result<()> {
        tracing::trace!(participant_id = %event.participant_id(), "recorded queue event");
        self.events.lock().push(event);
        Ok(())
    }
}

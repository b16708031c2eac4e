use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::participant::ParticipantId;

/// Metadata envelope attached to every queue event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub event_id: Uuid,
    pub participant_id: ParticipantId,
    /// Engine clock time of the transition, in Unix seconds.
    pub at: i64,
}

impl EventMeta {
    pub fn new(participant_id: ParticipantId, at: i64) -> Self {
        Self {
            version: 1,
            event_id: Uuid::now_v7(),
            participant_id,
            at,
        }
    }
}

/// A participant lifecycle transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEvent {
    pub meta: EventMeta,
    pub payload: QueueEventPayload,
}

impl QueueEvent {
    pub fn new(participant_id: ParticipantId, at: i64, payload: QueueEventPayload) -> Self {
        Self {
            meta: EventMeta::new(participant_id, at),
            payload,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.meta.participant_id
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum QueueEventPayload {
    /// Entered the waiting line.
    Joined,
    /// Moved from waiting to draft; a slot is reserved.
    Promoted {
        /// Seconds spent waiting.
        waited_seconds: u64,
        /// Deadline for `confirm`.
        confirm_by: i64,
    },
    /// Confirmed the draft and now holds a session.
    Confirmed { session_duration: u64 },
    /// Draft grace period elapsed without confirmation.
    DraftExpired,
    /// Session reached its maximum lifetime.
    SessionExpired,
    /// Removed on request.
    Left,
}

/// Generic event publisher trait for publishing events of type `E`.
#[async_trait]
pub trait EventPublisher<E>: Send + Sync
where
    E: Clone + Send + Sync + 'static,
{
    /// Publish an event to all subscribers.
    ///
    /// Returns an error if the event cannot be published.
    async fn publish(&self, event: E) -> anyhow::Result<()>;
}

/// Generic event subscriber trait for receiving events of type `E`.
pub trait EventSubscriber<E>: Send + Sync
where
    E: Clone + Send + Sync + 'static,
{
    /// Subscribe to events, returning a broadcast receiver.
    ///
    /// Multiple subscribers can receive the same events (fan-out).
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-process event bus using tokio broadcast channels.
///
/// Publishers never wait for slow subscribers. A subscriber that falls
/// more than `capacity` events behind receives `RecvError::Lagged` and
/// skips ahead. Events never leave the process; bridge to an external
/// broker by implementing [`EventPublisher`].
pub struct InProcEventBus {
    sender: broadcast::Sender<QueueEvent>,
    capacity: usize,
}

impl std::fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Broadcast without awaiting. With no subscribers the event is dropped.
    pub fn publish_now(&self, event: QueueEvent) {
        let _ = self.sender.send(event);
    }
}

#[async_trait]
impl EventPublisher<QueueEvent> for InProcEventBus {
    async fn publish(&self, event: QueueEvent) -> anyhow::Result<()> {
        self.publish_now(event);
        Ok(())
    }
}

impl EventSubscriber<QueueEvent> for InProcEventBus {
    fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }
}

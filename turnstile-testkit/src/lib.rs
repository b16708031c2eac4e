//! Shared fixtures for turnstile tests and benches.
//!
//! - [`FailingStore`]: in-memory store whose writes can be made to fail
//! - [`RecordingPublisher`]: captures every published [`QueueEvent`]
//! - [`TestQueue`]: an engine wired to a [`ManualClock`] and a recorder

use std::sync::Arc;

use turnstile::{
    ManualClock, MemoryStore, ParticipantStatus, ParticipantStore, QueueConfig, QueueEngine,
    SweepMode,
};

pub mod mock;
pub mod store;

pub use mock::RecordingPublisher;
pub use store::FailingStore;

/// Start time for manual clocks, an arbitrary recent Unix timestamp.
pub const T0: i64 = 1_700_000_000;

/// Short timeouts that keep scenarios readable: drafts and sessions both
/// last 100 seconds.
pub fn test_config(max_connected: usize) -> QueueConfig {
    QueueConfig::new(100, 100, max_connected)
}

pub fn periodic_config(max_connected: usize) -> QueueConfig {
    test_config(max_connected)
        .with_sweep_mode(SweepMode::Periodic)
        .with_sweep_interval(10)
}

/// An engine plus the handles a test needs to drive and observe it.
pub struct TestQueue<S: ParticipantStore = MemoryStore> {
    pub engine: Arc<QueueEngine<S>>,
    pub clock: ManualClock,
    pub events: RecordingPublisher,
}

impl TestQueue<MemoryStore> {
    pub async fn new(config: QueueConfig) -> Self {
        Self::with_store(config, MemoryStore::new()).await
    }
}

impl<S: ParticipantStore> TestQueue<S> {
    pub async fn with_store(config: QueueConfig, store: S) -> Self {
        let clock = ManualClock::new(T0);
        let events = RecordingPublisher::new();
        let engine = QueueEngine::open(config, store, Arc::new(clock.clone()))
            .await
            .expect("engine should open")
            .with_events(Arc::new(events.clone()));
        Self {
            engine: Arc::new(engine),
            clock,
            events,
        }
    }

    /// Move the clock forward and return the new time.
    pub fn advance(&self, seconds: i64) -> i64 {
        self.clock.advance(seconds)
    }

    pub async fn status_of(&self, id: &str) -> Option<ParticipantStatus> {
        self.engine.status(&id.into()).await.ok().map(|p| p.status)
    }

    /// Check the occupancy invariants against what the engine reports.
    pub async fn assert_invariants(&self) {
        let metrics = self.engine.metrics(None).await.expect("metrics");
        let participants = self.engine.participants().await;

        let count = |status| participants.iter().filter(|p| p.status == status).count();
        assert_eq!(metrics.waiting_count, count(ParticipantStatus::Waiting));
        assert_eq!(metrics.draft_count, count(ParticipantStatus::Draft));
        assert_eq!(metrics.connected_count, count(ParticipantStatus::Connected));
        assert_eq!(
            metrics.waiting_count + metrics.draft_count + metrics.connected_count,
            participants.len()
        );
        assert!(
            metrics.draft_count + metrics.connected_count <= metrics.capacity,
            "occupancy {} exceeds capacity {}",
            metrics.draft_count + metrics.connected_count,
            metrics.capacity
        );
    }
}

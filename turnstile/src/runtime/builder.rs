use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{QueueConfig, SweepMode};
use crate::engine::QueueEngine;
use crate::events::{EventPublisher, QueueEvent};
use crate::store::ParticipantStore;

/// Builder for a [`QueueEngine`] with explicit dependencies.
///
/// The store is required. The clock defaults to [`SystemClock`] and
/// events are off unless a publisher is given.
///
/// # Example
///
/// ```ignore
/// use turnstile::*;
///
/// let engine = QueueEngineBuilder::new(QueueConfig::new(300, 1200, 50))
///     .with_store(MemoryStore::new())
///     .with_events(bus)
///     .build()
///     .await?;
/// ```
pub struct QueueEngineBuilder<S: ParticipantStore> {
    config: QueueConfig,
    store: Option<S>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<Arc<dyn EventPublisher<QueueEvent>>>,
}

impl<S: ParticipantStore> fmt::Debug for QueueEngineBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("QueueEngineBuilder");
        debug.field("config", &self.config);
        debug.field("store_set", &self.store.is_some());
        debug.field("clock_set", &self.clock.is_some());
        debug.field("events_set", &self.events.is_some());

        if self.store.is_some() {
            debug.field("store_type", &type_name::<S>());
        }

        debug.finish()
    }
}

impl<S: ParticipantStore> Default for QueueEngineBuilder<S> {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl<S: ParticipantStore> QueueEngineBuilder<S> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher<QueueEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_sweep_mode(mut self, mode: SweepMode) -> Self {
        self.config.sweep_mode = mode;
        self
    }

    /// Open the engine, restoring any state held by the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store is
    /// missing, or the store cannot be loaded.
    pub async fn build(self) -> anyhow::Result<QueueEngine<S>> {
        self.config.validate()?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store dependency missing"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let engine = QueueEngine::open(self.config, store, clock).await?;
        Ok(match self.events {
            Some(events) => engine.with_events(events),
            None => engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_build_requires_store() {
        let err = QueueEngineBuilder::<MemoryStore>::default()
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store dependency missing"));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let err = QueueEngineBuilder::new(QueueConfig::new(0, 10, 1))
            .with_store(MemoryStore::new())
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("draft_timeout_seconds"));
    }

    #[tokio::test]
    async fn test_build_uses_supplied_clock_and_mode() {
        let clock = ManualClock::new(42);
        let builder = QueueEngineBuilder::new(QueueConfig::new(10, 10, 1))
            .with_store(MemoryStore::new())
            .with_clock(Arc::new(clock))
            .with_sweep_mode(SweepMode::Periodic);
        assert!(format!("{builder:?}").contains("MemoryStore"));

        let engine = builder.build().await.unwrap();
        assert_eq!(engine.now(), 42);
        assert_eq!(engine.config().sweep_mode, SweepMode::Periodic);
    }
}

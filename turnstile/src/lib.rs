//! Turnstile - admission control for capacity-limited live sessions.
//!
//! At most `max_connected` participants hold a slot at once. Everyone else
//! waits in a FIFO line. A participant promoted off the line gets a
//! reserved "draft" slot and must confirm it within a grace period, after
//! which it holds a connected session for a bounded time.
//!
//! # Core Concepts
//!
//! - **Engine**: [`QueueEngine`] is the state machine. It owns the store
//!   and the per-status ordering indexes behind one lock and exposes
//!   `join`, `status`, `confirm`, `delete`, `estimate_wait`, `metrics` and
//!   `tick`.
//!
//! - **Sweep**: expiry of stale drafts and sessions followed by promotion
//!   of the oldest waiters until capacity is filled. Runs inline on reads
//!   ([`SweepMode::Eager`]) or from a timer ([`SweepMode::Periodic`] with
//!   [`QueueRuntime`]).
//!
//! - **Store**: the [`ParticipantStore`] trait is the only seam to durable
//!   state. [`MemoryStore`], [`SnapshotStore`] and, with the `postgres`
//!   feature, [`persistence::PostgresStore`] implement it.
//!
//! - **Clock**: all timestamps come from an injected [`Clock`];
//!   [`ManualClock`] makes tests deterministic.
//!
//! - **Events**: optional [`QueueEvent`] stream via [`EventPublisher`] and
//!   [`InProcEventBus`].
//!
//! # Feature Flags
//!
//! - `postgres` - PostgreSQL persistence support via sqlx
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use turnstile::*;
//!
//! let engine = QueueEngine::open(
//!     QueueConfig::new(300, 1200, 50),
//!     MemoryStore::new(),
//!     Arc::new(SystemClock),
//! )
//! .await?;
//!
//! let position = engine.join("alice").await?;
//! if position.status == ParticipantStatus::Draft {
//!     let grant = engine.confirm(&"alice".into()).await?;
//!     println!("connected for {}s", grant.session_duration);
//! }
//! ```

/// Time sources.
pub mod clock;

/// Configuration structures for queue and persistence settings.
///
/// The `config` module defines [`QueueConfig`] (capacity, timeouts, sweep
/// mode) and [`PersistenceConfig`] (which store backs the queue).
pub mod config;

/// The admission queue state machine.
pub mod engine;

/// Error types for queue operations, stores and configuration.
pub mod error;

/// Event publishing and subscription system.
///
/// The `events` module provides traits and types for participant
/// lifecycle events:
/// - [`EventPublisher`] and [`EventSubscriber`] for pub/sub patterns
/// - [`QueueEvent`] and [`QueueEventPayload`] for event data
/// - [`InProcEventBus`] for in-process event broadcasting
pub mod events;

/// Time-ordered indexes used for FIFO rank and prefix expiry.
pub mod index;

/// Prometheus collectors (feature `metrics`).
#[cfg(feature = "metrics")]
pub mod metrics;

/// Participant identity, status and stored record.
pub mod participant;

#[cfg(feature = "postgres")]
/// PostgreSQL persistence implementation.
///
/// The `persistence` module provides a PostgreSQL-backed
/// [`ParticipantStore`] when the `postgres` feature is enabled.
pub mod persistence;

/// Background sweeping and engine construction.
///
/// The `runtime` module provides:
/// - [`QueueRuntime`] - owns the periodic sweeper task
/// - [`ShutdownToken`] - graceful shutdown signaling
/// - [`QueueEngineBuilder`] - builder for engines
pub mod runtime;

/// Session grants returned by `confirm`.
pub mod session;

/// JSON snapshot store.
pub mod snapshot;

/// The storage seam and the in-memory store.
pub mod store;

/// Tracing spans and structured log helpers.
pub mod telemetry;

pub use clock::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use index::*;
pub use participant::*;
pub use runtime::*;
pub use session::*;
pub use snapshot::*;
pub use store::*;

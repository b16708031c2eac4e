/// PostgreSQL participant storage.
///
/// This module provides `PostgresStore`, a PostgreSQL-backed
/// implementation of the [`ParticipantStore`](crate::ParticipantStore)
/// trait for queues that must survive restarts.
pub mod postgres;

pub use postgres::PostgresStore;

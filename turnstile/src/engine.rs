//! The admission queue state machine.
//!
//! [`QueueEngine`] owns the participant store and the three ordering
//! indexes behind one async mutex. Every operation takes the lock for
//! its whole duration, so a participant is never observable in two
//! indexes or in a status whose index does not hold it.
//!
//! Each transition writes the store first and touches the in-memory
//! indexes only after the write succeeded. A failed write therefore
//! leaves the queue exactly as it was before that transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::clock::Clock;
use crate::config::{QueueConfig, SweepMode};
use crate::error::{QueueError, StoreError};
use crate::events::{EventPublisher, QueueEvent, QueueEventPayload};
use crate::index::{IndexEntry, OrderingIndex};
use crate::participant::{
    ParticipantId, ParticipantRecord, ParticipantStatus, QueuePosition,
};
use crate::session::SessionGrant;
use crate::store::ParticipantStore;
use crate::telemetry;

/// What one sweep changed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub expired_drafts: usize,
    pub expired_sessions: usize,
    pub promoted: usize,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.expired_drafts == 0 && self.expired_sessions == 0 && self.promoted == 0
    }
}

/// Occupancy snapshot returned by [`QueueEngine::metrics`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub waiting_count: usize,
    pub draft_count: usize,
    pub connected_count: usize,
    /// Configured `max_connected`.
    pub capacity: usize,
    /// Estimated seconds until the requested participant is promoted.
    /// `None` unless a known, waiting participant was asked about.
    pub estimated_wait: Option<u64>,
}

/// Seconds as a timestamp offset, saturating above `i64::MAX`.
fn seconds(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

struct QueueState<S> {
    store: S,
    records: HashMap<ParticipantId, ParticipantRecord>,
    waiting: OrderingIndex,
    draft: OrderingIndex,
    connected: OrderingIndex,
    next_seq: u64,
}

impl<S: ParticipantStore> QueueState<S> {
    fn restore(store: S, records: Vec<ParticipantRecord>) -> Result<Self, StoreError> {
        let next_seq = records.iter().map(|r| r.seq).max().map_or(1, |seq| seq + 1);
        let by_status = |status: ParticipantStatus| {
            OrderingIndex::from_records(records.iter().filter(|r| r.status == status))
        };
        let waiting = by_status(ParticipantStatus::Waiting);
        let draft = by_status(ParticipantStatus::Draft);
        let connected = by_status(ParticipantStatus::Connected);

        let total = records.len();
        let records: HashMap<_, _> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();
        if records.len() != total {
            return Err(StoreError::Corrupt(format!(
                "{} duplicate participant records",
                total - records.len()
            )));
        }

        Ok(Self {
            store,
            records,
            waiting,
            draft,
            connected,
            next_seq,
        })
    }

    fn index(&self, status: ParticipantStatus) -> &OrderingIndex {
        match status {
            ParticipantStatus::Waiting => &self.waiting,
            ParticipantStatus::Draft => &self.draft,
            ParticipantStatus::Connected => &self.connected,
        }
    }

    fn index_mut(&mut self, status: ParticipantStatus) -> &mut OrderingIndex {
        match status {
            ParticipantStatus::Waiting => &mut self.waiting,
            ParticipantStatus::Draft => &mut self.draft,
            ParticipantStatus::Connected => &mut self.connected,
        }
    }

    /// Slots held by draft and connected participants.
    fn occupied(&self) -> usize {
        self.draft.len() + self.connected.len()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn position(&self, id: &ParticipantId) -> Option<QueuePosition> {
        let record = self.records.get(id)?;
        Some(QueuePosition {
            position: self.index(record.status).rank(record.state_at),
            status: record.status,
        })
    }

    fn record(&self, id: &ParticipantId) -> Result<&ParticipantRecord, QueueError> {
        self.records
            .get(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    fn is_consistent(&self) -> bool {
        let indexed = self.waiting.len() + self.draft.len() + self.connected.len();
        indexed == self.records.len()
            && [
                ParticipantStatus::Waiting,
                ParticipantStatus::Draft,
                ParticipantStatus::Connected,
            ]
            .into_iter()
            .all(|status| {
                self.index(status).iter().all(|entry| {
                    self.records.get(&entry.id).is_some_and(|r| {
                        r.status == status && r.state_at == entry.timestamp && r.seq == entry.seq
                    })
                })
            })
    }

    async fn join(
        &mut self,
        id: &ParticipantId,
        now: i64,
        events: &mut Vec<QueueEvent>,
    ) -> Result<bool, QueueError> {
        if self.records.contains_key(id) {
            return Ok(false);
        }
        let record = ParticipantRecord::waiting(id.clone(), now, self.take_seq());
        self.store.upsert(&record).await?;

        self.waiting.insert(IndexEntry::from(&record));
        self.records.insert(id.clone(), record);
        telemetry::record_joined(id);
        events.push(QueueEvent::new(id.clone(), now, QueueEventPayload::Joined));
        Ok(true)
    }

    async fn confirm(
        &mut self,
        id: &ParticipantId,
        config: &QueueConfig,
        now: i64,
        events: &mut Vec<QueueEvent>,
    ) -> Result<SessionGrant, QueueError> {
        let record = self.record(id)?.clone();
        if record.status != ParticipantStatus::Draft {
            return Err(QueueError::NotInDraft {
                id: id.clone(),
                status: record.status,
            });
        }
        let seq = self.take_seq();
        let connected = record.transitioned(ParticipantStatus::Connected, now, seq);
        self.store.upsert(&connected).await?;

        self.draft.remove(record.state_at, record.seq);
        self.connected.insert(IndexEntry::from(&connected));
        self.records.insert(id.clone(), connected);

        let duration = config.session_timeout_seconds;
        telemetry::record_confirmed(id, duration);
        events.push(QueueEvent::new(
            id.clone(),
            now,
            QueueEventPayload::Confirmed {
                session_duration: duration,
            },
        ));
        Ok(SessionGrant::new(id.clone(), now, duration))
    }

    async fn remove(
        &mut self,
        id: &ParticipantId,
        now: i64,
        events: &mut Vec<QueueEvent>,
    ) -> Result<bool, QueueError> {
        let Some(record) = self.records.get(id).cloned() else {
            return Ok(false);
        };
        self.store.remove(id).await?;

        self.index_mut(record.status).remove(record.state_at, record.seq);
        self.records.remove(id);
        telemetry::record_left(id, record.status.as_str());
        events.push(QueueEvent::new(id.clone(), now, QueueEventPayload::Left));
        Ok(true)
    }

    /// Drop every `status` entry that has been in place longer than
    /// `timeout_seconds`.
    async fn expire(
        &mut self,
        status: ParticipantStatus,
        timeout_seconds: u64,
        now: i64,
        events: &mut Vec<QueueEvent>,
    ) -> Result<usize, QueueError> {
        let cutoff = now.saturating_sub(seconds(timeout_seconds));
        let expired = self.index(status).expired_prefix(cutoff);
        if expired.is_empty() {
            return Ok(0);
        }
        self.store.remove_many(&expired).await?;

        self.index_mut(status).drain_front(expired.len());
        let payload = match status {
            ParticipantStatus::Draft => QueueEventPayload::DraftExpired,
            _ => QueueEventPayload::SessionExpired,
        };
        for id in &expired {
            self.records.remove(id);
            telemetry::record_expired(id, status.as_str());
            events.push(QueueEvent::new(id.clone(), now, payload.clone()));
        }
        Ok(expired.len())
    }

    async fn expire_all(
        &mut self,
        config: &QueueConfig,
        now: i64,
        report: &mut SweepReport,
        events: &mut Vec<QueueEvent>,
    ) -> Result<(), QueueError> {
        report.expired_drafts += self
            .expire(ParticipantStatus::Draft, config.draft_timeout_seconds, now, events)
            .await?;
        report.expired_sessions += self
            .expire(
                ParticipantStatus::Connected,
                config.session_timeout_seconds,
                now,
                events,
            )
            .await?;
        Ok(())
    }

    /// Move the oldest waiters to draft, one at a time, until capacity
    /// is filled or nobody is waiting.
    async fn promote(
        &mut self,
        config: &QueueConfig,
        now: i64,
        report: &mut SweepReport,
        events: &mut Vec<QueueEvent>,
    ) -> Result<(), QueueError> {
        while self.occupied() < config.max_connected {
            let Some(front) = self.waiting.front() else {
                break;
            };
            let record = match self.records.get(&front.id) {
                Some(record) => record.clone(),
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "waiting participant {} has no record",
                        front.id
                    ))
                    .into())
                }
            };
            let seq = self.take_seq();
            let draft = record.transitioned(ParticipantStatus::Draft, now, seq);
            self.store.upsert(&draft).await?;

            self.waiting.pop_front();
            self.draft.insert(IndexEntry::from(&draft));

            let waited_seconds = (now - record.joined_at).max(0) as u64;
            telemetry::record_promoted(&draft.id, waited_seconds);
            events.push(QueueEvent::new(
                draft.id.clone(),
                now,
                QueueEventPayload::Promoted {
                    waited_seconds,
                    confirm_by: now.saturating_add(seconds(config.draft_timeout_seconds)),
                },
            ));
            self.records.insert(draft.id.clone(), draft);
            report.promoted += 1;
        }
        Ok(())
    }

    /// Expire drafts, expire sessions, then fill freed capacity.
    async fn sweep(
        &mut self,
        config: &QueueConfig,
        now: i64,
        events: &mut Vec<QueueEvent>,
    ) -> Result<SweepReport, QueueError> {
        let started = Instant::now();
        let mut report = SweepReport::default();
        self.expire_all(config, now, &mut report, events).await?;
        self.promote(config, now, &mut report, events).await?;
        telemetry::record_sweep(&report, started.elapsed());
        Ok(report)
    }

    fn estimate_wait(
        &self,
        record: &ParticipantRecord,
        config: &QueueConfig,
        now: i64,
    ) -> Option<u64> {
        if record.status != ParticipantStatus::Waiting {
            return None;
        }
        let capacity = config.max_connected.max(1);
        if self.occupied() < config.max_connected {
            return Some(0);
        }

        let ahead = self.waiting.count_before(record.state_at);
        let session = seconds(config.session_timeout_seconds);
        // Ascending: the connected index is ordered by start time.
        let remaining: Vec<i64> = self
            .connected
            .iter()
            .map(|entry| entry.timestamp.saturating_add(session).saturating_sub(now).max(0))
            .collect();

        let estimate = if ahead < remaining.len() {
            remaining[ahead.saturating_sub(1)]
        } else {
            // With only drafts holding slots, assume each draft runs to its deadline.
            let base = remaining
                .last()
                .copied()
                .unwrap_or(seconds(config.draft_timeout_seconds));
            // Each further waiter adds a share of one session per slot.
            let beyond = i64::try_from(ahead - remaining.len()).unwrap_or(i64::MAX);
            let slots = i64::try_from(capacity).unwrap_or(i64::MAX);
            base.saturating_add(beyond.saturating_mul(session) / slots)
        };
        Some(estimate.max(0) as u64)
    }
}

/// Capacity-limited admission queue.
///
/// Participants [`join`](Self::join) a FIFO waiting line, are promoted to
/// a reserved draft slot when capacity allows, and must
/// [`confirm`](Self::confirm) within `draft_timeout_seconds` to become
/// connected for up to `session_timeout_seconds`.
///
/// In [`SweepMode::Eager`] every read sweeps first. In
/// [`SweepMode::Periodic`] only [`tick`](Self::tick) sweeps; pair it with
/// [`QueueRuntime::spawn_sweeper`](crate::QueueRuntime::spawn_sweeper).
pub struct QueueEngine<S: ParticipantStore> {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    events: Option<Arc<dyn EventPublisher<QueueEvent>>>,
    state: Mutex<QueueState<S>>,
}

impl<S: ParticipantStore> std::fmt::Debug for QueueEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("config", &self.config)
            .field("store", &std::any::type_name::<S>())
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl<S: ParticipantStore> QueueEngine<S> {
    /// Load every record from `store` and rebuild the indexes.
    pub async fn open(
        config: QueueConfig,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let records = store.load_all().await?;
        let state = QueueState::restore(store, records)?;

        tracing::info!(
            waiting = state.waiting.len(),
            draft = state.draft.len(),
            connected = state.connected.len(),
            max_connected = config.max_connected,
            sweep_mode = ?config.sweep_mode,
            "queue engine opened"
        );
        telemetry::set_occupancy(
            state.waiting.len(),
            state.draft.len(),
            state.connected.len(),
            config.max_connected,
        );

        Ok(Self {
            config,
            clock,
            events: None,
            state: Mutex::new(state),
        })
    }

    /// Publish lifecycle events to `publisher` after each operation.
    pub fn with_events(mut self, publisher: Arc<dyn EventPublisher<QueueEvent>>) -> Self {
        self.events = Some(publisher);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn is_eager(&self) -> bool {
        self.config.sweep_mode == SweepMode::Eager
    }

    /// Enter the waiting line. Joining again while known returns the
    /// current position without creating a second entry.
    pub async fn join(&self, id: impl Into<ParticipantId>) -> Result<QueuePosition, QueueError> {
        let id = id.into();
        let span = telemetry::join_span(&id);
        async {
            let now = self.clock.now();
            let mut events = Vec::new();
            let mut state = self.state.lock().await;

            let result = async {
                let mut report = SweepReport::default();
                if self.is_eager() {
                    state
                        .expire_all(&self.config, now, &mut report, &mut events)
                        .await?;
                }
                let inserted = state.join(&id, now, &mut events).await?;
                if self.is_eager() {
                    if let Err(err) = state
                        .promote(&self.config, now, &mut report, &mut events)
                        .await
                    {
                        if !inserted {
                            return Err(err);
                        }
                        // The join itself committed; promotion resumes on the next sweep.
                        tracing::warn!(
                            participant_id = %id,
                            transient = err.is_transient(),
                            "promotion after join failed: {err}"
                        );
                    }
                }
                state
                    .position(&id)
                    .ok_or_else(|| QueueError::NotFound(id.clone()))
            }
            .await;

            self.finish(state, events).await;
            result
        }
        .instrument(span)
        .await
    }

    /// Rank among peers in the same status. Unknown ids are `NotFound`.
    pub async fn status(&self, id: &ParticipantId) -> Result<QueuePosition, QueueError> {
        async {
            let now = self.clock.now();
            let mut events = Vec::new();
            let mut state = self.state.lock().await;

            let result = async {
                if self.is_eager() {
                    state.sweep(&self.config, now, &mut events).await?;
                }
                state
                    .position(id)
                    .ok_or_else(|| QueueError::NotFound(id.clone()))
            }
            .await;

            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::status_span(id))
        .await
    }

    /// Confirm a draft at the clock's current time.
    pub async fn confirm(&self, id: &ParticipantId) -> Result<SessionGrant, QueueError> {
        self.confirm_at(id, self.clock.now()).await
    }

    /// Move a draft participant to connected as of `now`.
    ///
    /// Fails with `NotInDraft` for waiting or already connected
    /// participants, so a repeated confirm is reported rather than
    /// silently accepted.
    pub async fn confirm_at(
        &self,
        id: &ParticipantId,
        now: i64,
    ) -> Result<SessionGrant, QueueError> {
        async {
            let mut events = Vec::new();
            let mut state = self.state.lock().await;

            let result = async {
                if self.is_eager() {
                    state.sweep(&self.config, now, &mut events).await?;
                }
                state.confirm(id, &self.config, now, &mut events).await
            }
            .await;

            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::confirm_span(id, now))
        .await
    }

    /// Remove a participant in any status. Returns `false` if the id was
    /// not known.
    pub async fn delete(&self, id: &ParticipantId) -> Result<bool, QueueError> {
        async {
            let now = self.clock.now();
            let mut events = Vec::new();
            let mut state = self.state.lock().await;
            let result = state.remove(id, now, &mut events).await;
            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::leave_span(id))
        .await
    }

    /// Seconds until `id` is likely to be promoted, or `None` if it is
    /// not waiting.
    pub async fn estimate_wait(&self, id: &ParticipantId) -> Result<Option<u64>, QueueError> {
        async {
            let now = self.clock.now();
            let mut events = Vec::new();
            let mut state = self.state.lock().await;

            let result = async {
                if self.is_eager() {
                    state.sweep(&self.config, now, &mut events).await?;
                }
                let record = state.record(id)?;
                Ok::<_, QueueError>(state.estimate_wait(record, &self.config, now))
            }
            .await;

            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::estimate_span(id))
        .await
    }

    /// Occupancy counts, with a wait estimate when `id` names a waiting
    /// participant.
    pub async fn metrics(&self, id: Option<&ParticipantId>) -> Result<QueueMetrics, QueueError> {
        async {
            let now = self.clock.now();
            let mut events = Vec::new();
            let mut state = self.state.lock().await;

            let result = async {
                if self.is_eager() {
                    state.sweep(&self.config, now, &mut events).await?;
                }
                let estimated_wait = id
                    .and_then(|id| state.records.get(id))
                    .and_then(|record| state.estimate_wait(record, &self.config, now));
                Ok::<_, QueueError>(QueueMetrics {
                    waiting_count: state.waiting.len(),
                    draft_count: state.draft.len(),
                    connected_count: state.connected.len(),
                    capacity: self.config.max_connected,
                    estimated_wait,
                })
            }
            .await;

            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::metrics_span(id.map(ParticipantId::as_str)))
        .await
    }

    /// Run one sweep now, regardless of sweep mode.
    pub async fn tick(&self) -> Result<SweepReport, QueueError> {
        let now = self.clock.now();
        async {
            let mut events = Vec::new();
            let mut state = self.state.lock().await;
            let result = state.sweep(&self.config, now, &mut events).await;
            self.finish(state, events).await;
            result
        }
        .instrument(telemetry::sweep_span(now))
        .await
    }

    /// Every known record, oldest insertion first.
    pub async fn participants(&self) -> Vec<ParticipantRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Release the lock, then publish what the operation produced.
    async fn finish(
        &self,
        state: tokio::sync::MutexGuard<'_, QueueState<S>>,
        events: Vec<QueueEvent>,
    ) {
        debug_assert!(state.is_consistent(), "queue indexes diverged from records");
        telemetry::set_occupancy(
            state.waiting.len(),
            state.draft.len(),
            state.connected.len(),
            self.config.max_connected,
        );
        drop(state);

        let Some(publisher) = &self.events else {
            return;
        };
        for event in events {
            if let Err(err) = publisher.publish(event).await {
                tracing::warn!(error = %err, "failed to publish queue event");
            }
        }
    }
}

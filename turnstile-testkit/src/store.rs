use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use turnstile::{ParticipantId, ParticipantRecord, ParticipantStore, StoreError};

/// In-memory store with injectable write failures.
///
/// Clones share state, so a test can keep one handle to flip failures on
/// and inspect records while the engine owns the other.
#[derive(Clone, Default)]
pub struct FailingStore {
    records: Arc<Mutex<HashMap<ParticipantId, ParticipantRecord>>>,
    failure: Arc<Mutex<Failure>>,
    writes: Arc<Mutex<usize>>,
}

#[derive(Clone, Copy, Debug, Default)]
enum Failure {
    #[default]
    Never,
    Always,
    /// Succeed this many more writes, then fail.
    After(usize),
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ParticipantRecord>,
    {
        let store = Self::new();
        store
            .records
            .lock()
            .extend(records.into_iter().map(|r| (r.id.clone(), r)));
        store
    }

    /// Fail every write until [`heal`](Self::heal).
    pub fn fail_writes(&self) {
        *self.failure.lock() = Failure::Always;
    }

    /// Let `successes` more writes through, then fail.
    pub fn fail_after(&self, successes: usize) {
        *self.failure.lock() = Failure::After(successes);
    }

    pub fn heal(&self) {
        *self.failure.lock() = Failure::Never;
    }

    /// Stored records ordered by sequence number.
    pub fn records(&self) -> Vec<ParticipantRecord> {
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Writes that succeeded so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let mut failure = self.failure.lock();
        match *failure {
            Failure::Never => {}
            Failure::Always => return Err(injected()),
            Failure::After(0) => {
                *failure = Failure::Always;
                return Err(injected());
            }
            Failure::After(n) => *failure = Failure::After(n - 1),
        }
        *self.writes.lock() += 1;
        Ok(())
    }
}

fn injected() -> StoreError {
    StoreError::Io(std::io::Error::other("injected store failure"))
}

#[async_trait]
impl ParticipantStore for FailingStore {
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        Ok(self.records())
    }

    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError> {
        self.check_write()?;
        self.records.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError> {
        self.check_write()?;
        self.records.lock().remove(id);
        Ok(())
    }

    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError> {
        self.check_write()?;
        let mut records = self.records.lock();
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}

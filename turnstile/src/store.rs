use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::participant::{ParticipantId, ParticipantRecord};

/// Keyed storage for participant records.
///
/// The engine is the only caller and always holds its queue lock while
/// calling in, so implementations need no cross-call coordination. Each
/// method must either apply completely or fail without effect.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Every stored record, in any order. Called once when the engine opens.
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError>;

    /// Fetch a single record.
    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError>;

    /// Insert or replace the record keyed by `record.id`.
    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError>;

    /// Remove a record. Removing an absent id is not an error.
    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError>;

    /// Remove several records as one unit.
    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError>;
}

/// Store chosen at runtime, e.g. from [`PersistenceConfig`](crate::PersistenceConfig).
pub type DynStore = Box<dyn ParticipantStore>;

#[async_trait]
impl<S: ParticipantStore + ?Sized> ParticipantStore for Box<S> {
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        (**self).load_all().await
    }

    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        (**self).get(id).await
    }

    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError> {
        (**self).upsert(record).await
    }

    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError> {
        (**self).remove(id).await
    }

    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError> {
        (**self).remove_many(ids).await
    }
}

/// Volatile store backed by a `HashMap`.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: HashMap<ParticipantId, ParticipantRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ParticipantRecord>,
    {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn records(&self) -> &HashMap<ParticipantId, ParticipantRecord> {
        &self.records
    }

    pub(crate) fn records_mut(
        &mut self,
    ) -> &mut HashMap<ParticipantId, ParticipantRecord> {
        &mut self.records
    }
}

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }

    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError> {
        for id in ids {
            self.records.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantStatus;

    #[tokio::test]
    async fn test_memory_store_crud() {
        let mut store = MemoryStore::new();
        let a = ParticipantRecord::waiting("a".into(), 1, 1);
        let b = ParticipantRecord::waiting("b".into(), 2, 2);

        store.upsert(&a).await.unwrap();
        store.upsert(&b).await.unwrap();
        assert_eq!(store.len(), 2);

        let promoted = a.transitioned(ParticipantStatus::Draft, 5, 3);
        store.upsert(&promoted).await.unwrap();
        let fetched = store.get(&"a".into()).await.unwrap().unwrap();
        assert_eq!(fetched.status, ParticipantStatus::Draft);

        store.remove(&"missing".into()).await.unwrap();
        store
            .remove_many(&["a".into(), "b".into()])
            .await
            .unwrap();
        assert!(store.is_empty());
        assert!(store.load_all().await.unwrap().is_empty());
    }
}

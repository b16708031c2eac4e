//! Time-ordered participant indexes.
//!
//! Each status keeps its own [`OrderingIndex`]: a deque of entries sorted
//! ascending by `(timestamp, seq)`. New entries almost always carry the
//! newest timestamp, so insertion is an append in the common case and
//! the oldest entry is always at the front, which is what both FIFO
//! promotion and prefix expiry need.

use std::collections::VecDeque;

use crate::participant::{ParticipantId, ParticipantRecord};

/// One `(timestamp, participant)` pair in an index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexEntry {
    pub timestamp: i64,
    pub seq: u64,
    pub id: ParticipantId,
}

impl IndexEntry {
    fn key(&self) -> (i64, u64) {
        (self.timestamp, self.seq)
    }
}

impl From<&ParticipantRecord> for IndexEntry {
    fn from(record: &ParticipantRecord) -> Self {
        Self {
            timestamp: record.state_at,
            seq: record.seq,
            id: record.id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderingIndex {
    entries: VecDeque<IndexEntry>,
}

impl OrderingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from records, ordered by `(state_at, seq)`.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ParticipantRecord>,
    {
        let mut entries: Vec<IndexEntry> =
            records.into_iter().map(IndexEntry::from).collect();
        entries.sort_by_key(IndexEntry::key);
        Self {
            entries: entries.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: IndexEntry) {
        let key = entry.key();
        match self.entries.back() {
            Some(last) if last.key() > key => {
                let at = self.entries.partition_point(|e| e.key() <= key);
                self.entries.insert(at, entry);
            }
            _ => self.entries.push_back(entry),
        }
    }

    /// Remove the entry inserted at `(timestamp, seq)`.
    pub fn remove(&mut self, timestamp: i64, seq: u64) -> Option<IndexEntry> {
        let key = (timestamp, seq);
        let at = self.entries.partition_point(|e| e.key() < key);
        match self.entries.get(at) {
            Some(entry) if entry.key() == key => self.entries.remove(at),
            _ => None,
        }
    }

    pub fn front(&self) -> Option<&IndexEntry> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<IndexEntry> {
        self.entries.pop_front()
    }

    /// Number of entries with `timestamp <= t`.
    pub fn rank(&self, timestamp: i64) -> usize {
        self.entries.partition_point(|e| e.timestamp <= timestamp)
    }

    /// Number of entries with `timestamp < t`.
    pub fn count_before(&self, timestamp: i64) -> usize {
        self.entries.partition_point(|e| e.timestamp < timestamp)
    }

    /// Ids of the leading entries older than `cutoff`.
    pub fn expired_prefix(&self, cutoff: i64) -> Vec<ParticipantId> {
        self.entries
            .iter()
            .take_while(|e| e.timestamp < cutoff)
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn drain_front(&mut self, count: usize) -> Vec<IndexEntry> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: i64, seq: u64, id: &str) -> IndexEntry {
        IndexEntry {
            timestamp,
            seq,
            id: id.into(),
        }
    }

    fn ids(index: &OrderingIndex) -> Vec<&str> {
        index.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_insert_keeps_order_and_ties_stable() {
        let mut index = OrderingIndex::new();
        index.insert(entry(10, 1, "a"));
        index.insert(entry(10, 2, "b"));
        index.insert(entry(5, 3, "c"));
        index.insert(entry(10, 4, "d"));

        assert_eq!(ids(&index), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_rank_counts_ties() {
        let mut index = OrderingIndex::new();
        index.insert(entry(1, 1, "a"));
        index.insert(entry(2, 2, "b"));
        index.insert(entry(2, 3, "c"));
        index.insert(entry(3, 4, "d"));

        assert_eq!(index.rank(1), 1);
        assert_eq!(index.rank(2), 3);
        assert_eq!(index.count_before(2), 1);
        assert_eq!(index.count_before(1), 0);
    }

    #[test]
    fn test_remove_exact_entry() {
        let mut index = OrderingIndex::new();
        index.insert(entry(7, 1, "a"));
        index.insert(entry(7, 2, "b"));
        index.insert(entry(8, 3, "c"));

        let removed = index.remove(7, 2).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert!(index.remove(7, 2).is_none());
        assert_eq!(ids(&index), vec!["a", "c"]);
    }

    #[test]
    fn test_expired_prefix_and_drain() {
        let mut index = OrderingIndex::new();
        index.insert(entry(1, 1, "a"));
        index.insert(entry(4, 2, "b"));
        index.insert(entry(9, 3, "c"));

        let expired = index.expired_prefix(5);
        assert_eq!(expired.len(), 2);

        let drained = index.drain_front(expired.len());
        assert_eq!(drained[1].id.as_str(), "b");
        assert_eq!(ids(&index), vec!["c"]);
        assert!(index.expired_prefix(9).is_empty());
    }

    #[test]
    fn test_from_records_sorts_by_time_then_seq() {
        let records = vec![
            ParticipantRecord::waiting("late".into(), 20, 1),
            ParticipantRecord::waiting("tie-second".into(), 10, 9),
            ParticipantRecord::waiting("tie-first".into(), 10, 3),
        ];
        let index = OrderingIndex::from_records(&records);

        assert_eq!(ids(&index), vec!["tie-first", "tie-second", "late"]);
    }
}

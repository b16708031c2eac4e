use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Caller-supplied participant identity.
///
/// The queue never interprets the value; it only compares and stores it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of a participant known to the queue.
///
/// A participant that is not known has no status at all; lookups return
/// `None` or [`QueueError::NotFound`](crate::QueueError::NotFound).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    /// Queued, no slot reserved.
    Waiting,
    /// Slot reserved, pending confirmation within the draft timeout.
    Draft,
    /// Occupying a slot for up to the session timeout.
    Connected,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Draft => "draft",
            ParticipantStatus::Connected => "connected",
        }
    }

    /// Whether the status occupies one of the `max_connected` slots.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, ParticipantStatus::Waiting)
    }
}

impl Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ParticipantStatus::Waiting),
            "draft" => Ok(ParticipantStatus::Draft),
            "connected" => Ok(ParticipantStatus::Connected),
            other => Err(format!("invalid participant status: {other}")),
        }
    }
}

/// Stored state of one participant.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub status: ParticipantStatus,
    /// When the participant entered `Waiting`.
    pub joined_at: i64,
    /// When the participant entered its current status.
    pub state_at: i64,
    /// Sequence number of the latest index insertion; breaks timestamp ties.
    pub seq: u64,
}

impl ParticipantRecord {
    pub fn waiting(id: ParticipantId, now: i64, seq: u64) -> Self {
        Self {
            id,
            status: ParticipantStatus::Waiting,
            joined_at: now,
            state_at: now,
            seq,
        }
    }

    /// Copy of this record moved into `status` at `now`.
    pub fn transitioned(
        &self,
        status: ParticipantStatus,
        now: i64,
        seq: u64,
    ) -> Self {
        Self {
            id: self.id.clone(),
            status,
            joined_at: self.joined_at,
            state_at: now,
            seq,
        }
    }

    /// Seconds spent in the current status as of `now`.
    pub fn age(&self, now: i64) -> i64 {
        now - self.state_at
    }
}

/// Rank of a participant among peers in the same status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct QueuePosition {
    /// 1-based; the longest-standing peer is 1.
    pub position: usize,
    pub status: ParticipantStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_form() {
        let json = serde_json::to_string(&ParticipantStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");

        let parsed: ParticipantStatus = serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(parsed, ParticipantStatus::Draft);
        assert_eq!("waiting".parse::<ParticipantStatus>().unwrap(), ParticipantStatus::Waiting);
        assert!("departed".parse::<ParticipantStatus>().is_err());
    }

    #[test]
    fn test_participant_id_is_transparent() {
        let id = ParticipantId::from("user-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-1\"");
        assert_eq!(id.to_string(), "user-1");
    }

    #[test]
    fn test_transition_keeps_joined_at() {
        let waiting = ParticipantRecord::waiting("a".into(), 10, 1);
        let draft = waiting.transitioned(ParticipantStatus::Draft, 25, 2);

        assert_eq!(draft.joined_at, 10);
        assert_eq!(draft.state_at, 25);
        assert_eq!(draft.seq, 2);
        assert_eq!(draft.age(40), 15);
        assert!(draft.status.holds_slot());
        assert!(!waiting.status.holds_slot());
    }
}

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::participant::{ParticipantId, ParticipantStatus};

/// Opaque session token handed to a participant on confirmation.
///
/// The token is `"<started_at> <participant_id>"`. It is not signed; a
/// transport that needs tamper-proof tokens should sign it itself.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Build the token for a session started at `started_at`.
    pub fn new(started_at: i64, participant_id: &ParticipantId) -> Self {
        Self(format!("{started_at} {participant_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the token back into its start time and participant.
    pub fn parse(&self) -> Option<(i64, ParticipantId)> {
        let (started_at, id) = self.0.split_once(' ')?;
        let started_at = started_at.parse().ok()?;
        Some((started_at, ParticipantId::from(id)))
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a successful `confirm`: the participant now holds a slot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub participant_id: ParticipantId,
    /// Always [`ParticipantStatus::Connected`].
    pub status: ParticipantStatus,
    /// Maximum session length in seconds.
    pub session_duration: u64,
    pub started_at: i64,
    pub expires_at: i64,
    pub token: SessionToken,
}

impl SessionGrant {
    pub fn new(
        participant_id: ParticipantId,
        started_at: i64,
        session_duration: u64,
    ) -> Self {
        let token = SessionToken::new(started_at, &participant_id);
        Self {
            participant_id,
            status: ParticipantStatus::Connected,
            session_duration,
            started_at,
            expires_at: started_at
                .saturating_add(i64::try_from(session_duration).unwrap_or(i64::MAX)),
            token,
        }
    }

    /// The sweep removes a session once `now - started_at` exceeds the
    /// duration, so the last second is still live.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Seconds left before the session is swept, never negative.
    pub fn remaining(&self, now: i64) -> u64 {
        (self.expires_at - now).max(0) as u64
    }
}

//! Queue routes under `/queue`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use turnstile::{ParticipantId, ParticipantStatus, QueuePosition, SweepReport};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `join`, `confirm` and `leave`.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(deserialize_with = "user_id_from_string_or_number")]
    pub user_id: String,
}

/// Clients have historically sent numeric ids; both forms name the same
/// participant.
fn user_id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position: usize,
    pub status: ParticipantStatus,
}

impl From<QueuePosition> for PositionResponse {
    fn from(p: QueuePosition) -> Self {
        Self {
            position: p.position,
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub status: ParticipantStatus,
    pub session_duration: u64,
    pub token: String,
    /// Tokens are not signed yet; always null.
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub user_id: Option<String>,
}

/// Occupancy counts under the field names existing clients read.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub waiting_users: usize,
    pub draft_users: usize,
    pub active_users: usize,
    pub total_slots: usize,
    pub estimated_time: Option<u64>,
}

fn participant(user_id: String) -> ApiResult<ParticipantId> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    Ok(ParticipantId::from(user_id))
}

/// POST /queue/join
pub async fn join(
    State(state): State<AppState>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult<Json<PositionResponse>> {
    let Json(req) = body?;
    let id = participant(req.user_id)?;
    let position = state.engine.join(id).await?;
    Ok(Json(position.into()))
}

/// GET /queue/status/{user_id}
pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<PositionResponse>> {
    let id = participant(user_id)?;
    let position = state.engine.status(&id).await?;
    Ok(Json(position.into()))
}

/// POST /queue/confirm
pub async fn confirm(
    State(state): State<AppState>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult<Json<ConfirmResponse>> {
    let Json(req) = body?;
    let id = participant(req.user_id)?;
    let grant = state.engine.confirm(&id).await?;
    Ok(Json(ConfirmResponse {
        status: grant.status,
        session_duration: grant.session_duration,
        token: grant.token.to_string(),
        signature: None,
    }))
}

/// POST /queue/leave
///
/// Leaving is answered with `{}` whether or not the id was known.
pub async fn leave(
    State(state): State<AppState>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = body?;
    let id = participant(req.user_id)?;
    if !state.engine.delete(&id).await? {
        tracing::debug!(participant = %id, "leave for unknown participant");
    }
    Ok(Json(json!({})))
}

/// POST /queue/idle
pub async fn idle(State(state): State<AppState>) -> ApiResult<Json<SweepReport>> {
    Ok(Json(state.engine.tick().await?))
}

/// GET /queue/metrics
pub async fn metrics(
    State(state): State<AppState>,
    query: Result<Query<MetricsQuery>, QueryRejection>,
) -> ApiResult<Json<MetricsResponse>> {
    let Query(query) = query?;
    let id = query
        .user_id
        .filter(|s| !s.is_empty())
        .map(ParticipantId::from);
    let m = state.engine.metrics(id.as_ref()).await?;
    Ok(Json(MetricsResponse {
        waiting_users: m.waiting_count,
        draft_users: m.draft_count,
        active_users: m.connected_count,
        total_slots: m.capacity,
        estimated_time: m.estimated_wait,
    }))
}

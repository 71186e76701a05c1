use crate::ids::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------- Room Snapshots ----------

/// Authoritative view of a room. `remaining_seconds` is always projected to
/// the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub host: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub duration_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
    pub members: Vec<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub host: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub duration_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
    pub member_count: usize,
}

impl From<RoomSnapshot> for RoomSummary {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self {
            member_count: snapshot.members.len(),
            id: snapshot.id,
            host: snapshot.host,
            title: snapshot.title,
            duration_seconds: snapshot.duration_seconds,
            remaining_seconds: snapshot.remaining_seconds,
            running: snapshot.running,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

// ---------- Requests ----------

/// Durations are signed on the wire so negative input can be clamped
/// instead of failing to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub host: ParticipantId,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCommandRequest {
    pub requested_by: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTimerRequest {
    pub requested_by: ParticipantId,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub participant: ParticipantId,
}

/// Single-endpoint form of every room mutation, e.g.
/// `{"action":"setTimer","requestedBy":"alice","durationSeconds":600}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoomAction {
    Start { requested_by: ParticipantId },
    Stop { requested_by: ParticipantId },
    SetTimer { requested_by: ParticipantId, duration_seconds: i64 },
    Reset { requested_by: ParticipantId },
    Join { participant: ParticipantId },
    Leave { participant: ParticipantId },
    Close { requested_by: ParticipantId },
}

// ---------- Responses ----------

/// Result of a mutation that may close the room. Also the payload pushed to
/// room subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomOutcome {
    Room(RoomSnapshot),
    Deleted { deleted: bool },
}

impl RoomOutcome {
    pub fn deleted() -> Self {
        RoomOutcome::Deleted { deleted: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomActionResponse {
    Room(RoomSnapshot),
    Deleted { deleted: bool },
    Ack(AckResponse),
}

impl From<RoomOutcome> for RoomActionResponse {
    fn from(outcome: RoomOutcome) -> Self {
        match outcome {
            RoomOutcome::Room(snapshot) => RoomActionResponse::Room(snapshot),
            RoomOutcome::Deleted { deleted } => RoomActionResponse::Deleted { deleted },
        }
    }
}

// ---------- Client Config ----------

/// What a polling client needs to know about the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRoomClientConfigDto {
    pub base_url: String,
    pub room_poll_interval_secs: u64,
    pub list_poll_interval_secs: u64,
}

impl StudyRoomClientConfigDto {
    pub fn new(
        base_url: impl Into<String>,
        room_poll_interval: Duration,
        list_poll_interval: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            room_poll_interval_secs: room_poll_interval.as_secs(),
            list_poll_interval_secs: list_poll_interval.as_secs(),
        }
    }
}

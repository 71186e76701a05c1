//! Room state and countdown projection.
//!
//! A running room stores the instant it was started and the time that was
//! left at that instant. Remaining time is always derived from those two
//! values and the caller's `now_ms`; nothing ticks in the background.

use shared::ids::{ParticipantId, RoomId};
use shared::models::RoomSnapshot;

const MS_PER_SEC: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    host: ParticipantId,
    title: Option<String>,
    duration_secs: u64,
    /// Frozen value while stopped, value as of `started_at_ms` while running.
    remaining_ms: u64,
    started_at_ms: Option<u64>,
    members: Vec<ParticipantId>,
    last_activity_ms: u64,
}

impl Room {
    pub fn new(
        id: RoomId,
        host: ParticipantId,
        title: Option<String>,
        duration_secs: u64,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            host,
            title,
            duration_secs,
            remaining_ms: duration_secs.saturating_mul(MS_PER_SEC),
            started_at_ms: None,
            members: Vec::new(),
            last_activity_ms: now_ms,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn host(&self) -> &ParticipantId {
        &self.host
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn is_member(&self, participant: &str) -> bool {
        self.members.iter().any(|m| m == participant)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_ms = self.last_activity_ms.max(now_ms);
    }

    /// Remaining time as of `now_ms` without changing state.
    pub fn remaining_ms_at(&self, now_ms: u64) -> u64 {
        match self.started_at_ms {
            Some(started) => self
                .remaining_ms
                .saturating_sub(now_ms.saturating_sub(started)),
            None => self.remaining_ms,
        }
    }

    /// Whole seconds left, rounded up so a running room never reports 0.
    pub fn remaining_secs_at(&self, now_ms: u64) -> u64 {
        self.remaining_ms_at(now_ms).div_ceil(MS_PER_SEC)
    }

    /// Applies timer expiry. Returns true if this call stopped the room.
    ///
    /// Expiry counts as activity at the instant the countdown reached zero,
    /// not at the instant it was observed.
    pub fn project(&mut self, now_ms: u64) -> bool {
        let Some(started) = self.started_at_ms else {
            return false;
        };
        if self.remaining_ms_at(now_ms) > 0 {
            return false;
        }
        self.touch(started.saturating_add(self.remaining_ms));
        self.remaining_ms = 0;
        self.started_at_ms = None;
        true
    }

    /// Returns false when already running or when there is no time left.
    pub fn start(&mut self, now_ms: u64) -> bool {
        self.project(now_ms);
        if self.is_running() || self.remaining_ms == 0 {
            return false;
        }
        self.started_at_ms = Some(now_ms);
        true
    }

    /// Freezes the projected remaining time. Returns false when already stopped.
    pub fn stop(&mut self, now_ms: u64) -> bool {
        self.project(now_ms);
        if !self.is_running() {
            return false;
        }
        self.remaining_ms = self.remaining_ms_at(now_ms);
        self.started_at_ms = None;
        true
    }

    /// Replaces both the nominal duration and the remaining time. A running
    /// room keeps running and counts down from `now_ms`.
    pub fn set_duration(&mut self, duration_secs: u64, now_ms: u64) {
        self.duration_secs = duration_secs;
        self.remaining_ms = duration_secs.saturating_mul(MS_PER_SEC);
        if self.is_running() {
            self.started_at_ms = Some(now_ms);
            self.project(now_ms);
        }
    }

    /// Stops the timer and restores `duration_secs`.
    pub fn reset(&mut self, duration_secs: u64) {
        self.started_at_ms = None;
        self.duration_secs = duration_secs;
        self.remaining_ms = duration_secs.saturating_mul(MS_PER_SEC);
    }

    pub fn add_member(&mut self, participant: &str) -> bool {
        if self.is_member(participant) {
            return false;
        }
        self.members.push(participant.to_string());
        true
    }

    pub fn remove_member(&mut self, participant: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != participant);
        before != self.members.len()
    }

    pub fn snapshot(&self, now_ms: u64) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            host: self.host.clone(),
            title: self.title.clone(),
            duration_seconds: self.duration_secs,
            remaining_seconds: self.remaining_secs_at(now_ms),
            running: self.is_running(),
            members: self.members.clone(),
        }
    }
}

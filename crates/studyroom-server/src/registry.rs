use crate::clock::{Clock, SystemClock};
use crate::push::PushHub;
use crate::repository::room_repository::{InMemoryRoomRepository, InsertError, RoomEntry};
use crate::room::Room;
use shared::ids::{gen_room_id, RoomId};
use shared::models::{RoomOutcome, RoomSnapshot, RoomSummary};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const MAX_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("room not found")]
    NotFound,
    #[error("a room with this title already exists")]
    DuplicateName,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("operation not permitted for this participant")]
    Forbidden,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Reject a new room whose title matches an active one, ignoring case.
    pub unique_titles: bool,
    pub default_duration_secs: u64,
    pub max_duration_secs: u64,
    /// Stopped rooms untouched for this long are closed. `None` disables.
    pub idle_ttl: Option<Duration>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            unique_titles: true,
            default_duration_secs: 25 * 60,
            max_duration_secs: 24 * 60 * 60,
            idle_ttl: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub pruned: usize,
}

/// Owns every active room. Each operation locks exactly one room, so
/// transitions on the same id are serialized while different rooms proceed
/// independently. Timer expiry is applied lazily by whichever call observes
/// it first, reads included.
///
/// Rooms the registry closes on its own (idle pruning) are announced on
/// `push`; caller-driven changes are published by the HTTP layer.
#[derive(Debug)]
pub struct RoomRegistry {
    repository: InMemoryRoomRepository,
    clock: Arc<dyn Clock>,
    options: RegistryOptions,
    push: PushHub,
}

impl RoomRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(mut options: RegistryOptions, clock: Arc<dyn Clock>) -> Self {
        if options.default_duration_secs > options.max_duration_secs {
            warn!(
                default_duration_secs = options.default_duration_secs,
                max_duration_secs = options.max_duration_secs,
                "default duration above maximum, clamping"
            );
            options.default_duration_secs = options.max_duration_secs;
        }
        Self {
            repository: InMemoryRoomRepository::new(),
            clock,
            options,
            push: PushHub::new(),
        }
    }

    pub fn push(&self) -> &PushHub {
        &self.push
    }

    pub async fn room_count(&self) -> usize {
        self.repository.len().await
    }

    pub async fn create(
        &self,
        host: &str,
        duration_secs: Option<i64>,
        title: Option<String>,
    ) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;

        let host = require_id("host", host)?;
        let duration_secs = match duration_secs {
            Some(raw) => self.normalize_duration(raw)?,
            None => self.options.default_duration_secs,
        };
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        for _ in 0..MAX_ID_ATTEMPTS {
            let now = self.clock.now_ms();
            let room = Room::new(gen_room_id(), host.to_string(), title.clone(), duration_secs, now);
            let snapshot = room.snapshot(now);
            match self.repository.insert(room, self.options.unique_titles).await {
                Ok(()) => {
                    info!(room_id = %snapshot.id, host = %snapshot.host, duration_secs, "room created");
                    return Ok(snapshot);
                }
                Err(InsertError::IdTaken) => {
                    debug!("room id collision, regenerating");
                }
                Err(InsertError::TitleTaken) => {
                    warn!(title = ?title, "room title already in use");
                    return Err(RegistryError::DuplicateName);
                }
            }
        }
        error!(attempts = MAX_ID_ATTEMPTS, "could not allocate a free room id");
        Err(RegistryError::Internal("could not allocate a room id".to_string()))
    }

    /// Returns the live snapshot. A finished timer is stopped as part of the read.
    pub async fn get(&self, room_id: &str) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        self.with_room(room_id, |room, now| Ok(room.snapshot(now))).await
    }

    /// Live summaries of every room, in no particular order.
    pub async fn list(&self) -> Vec<RoomSummary> {
        self.prune_expired().await;

        let mut summaries = Vec::new();
        for entry in self.repository.entries().await {
            let mut slot = entry.room.lock().await;
            let Some(room) = slot.as_mut() else {
                continue;
            };
            let now = self.clock.now_ms();
            if room.project(now) {
                info!(room_id = %room.id(), "room timer expired");
            }
            summaries.push(RoomSummary::from(room.snapshot(now)));
        }
        summaries
    }

    pub async fn start(&self, room_id: &str, requested_by: &str) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        self.with_room(room_id, |room, now| {
            require_participant(room, requested_by)?;
            if room.start(now) {
                room.touch(now);
                info!(room_id = %room.id(), requested_by, "room timer started");
            }
            Ok(room.snapshot(now))
        })
        .await
    }

    pub async fn stop(&self, room_id: &str, requested_by: &str) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        self.with_room(room_id, |room, now| {
            require_participant(room, requested_by)?;
            if room.stop(now) {
                room.touch(now);
                info!(room_id = %room.id(), requested_by, "room timer stopped");
            }
            Ok(room.snapshot(now))
        })
        .await
    }

    /// Host only. Negative durations are clamped to zero. An unknown room is
    /// reported before a bad caller or duration.
    pub async fn set_timer(
        &self,
        room_id: &str,
        requested_by: &str,
        duration_secs: i64,
    ) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        self.with_room(room_id, |room, now| {
            require_host(room, requested_by)?;
            let duration_secs = self.normalize_duration(duration_secs)?;
            room.set_duration(duration_secs, now);
            room.touch(now);
            info!(room_id = %room.id(), duration_secs, running = room.is_running(), "room timer set");
            Ok(room.snapshot(now))
        })
        .await
    }

    /// Host only. Stops the timer and restores the default duration.
    pub async fn reset(&self, room_id: &str, requested_by: &str) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        let duration_secs = self.options.default_duration_secs;
        self.with_room(room_id, |room, now| {
            require_host(room, requested_by)?;
            room.reset(duration_secs);
            room.touch(now);
            info!(room_id = %room.id(), duration_secs, "room timer reset");
            Ok(room.snapshot(now))
        })
        .await
    }

    pub async fn add_member(&self, room_id: &str, participant: &str) -> Result<RoomSnapshot, RegistryError> {
        self.prune_expired().await;
        self.with_room(room_id, |room, now| {
            let participant = require_id("participant", participant)?;
            if room.add_member(participant) {
                room.touch(now);
                info!(room_id = %room.id(), participant, "member joined");
            }
            Ok(room.snapshot(now))
        })
        .await
    }

    /// Removing the last member closes the room and reports `RoomOutcome::Deleted`.
    pub async fn remove_member(&self, room_id: &str, participant: &str) -> Result<RoomOutcome, RegistryError> {
        self.prune_expired().await;

        let entry = self.entry(room_id).await?;
        let mut slot = entry.room.lock().await;
        let room = slot.as_mut().ok_or(RegistryError::NotFound)?;
        let now = self.observe(room);
        let participant = require_id("participant", participant)?;

        if room.remove_member(participant) {
            room.touch(now);
            info!(room_id, participant, "member left");
        }
        if !room.is_empty() {
            return Ok(RoomOutcome::Room(room.snapshot(now)));
        }

        *slot = None;
        self.repository.remove(room_id).await;
        info!(room_id, "last member left, room closed");
        Ok(RoomOutcome::deleted())
    }

    /// Host only. Deletes the room regardless of membership.
    pub async fn close(&self, room_id: &str, requested_by: &str) -> Result<(), RegistryError> {
        self.prune_expired().await;

        let entry = self.entry(room_id).await?;
        let mut slot = entry.room.lock().await;
        let room = slot.as_ref().ok_or(RegistryError::NotFound)?;
        require_host(room, requested_by)?;

        *slot = None;
        self.repository.remove(room_id).await;
        info!(room_id, requested_by, "room closed");
        Ok(())
    }

    /// Applies timer expiry and idle pruning to every room. Same effect as
    /// reading each room, run from the optional background task.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut stale_rooms = Vec::new();
        for entry in self.repository.entries().await {
            let mut slot = entry.room.lock().await;
            let Some(room) = slot.as_mut() else {
                continue;
            };
            let now = self.clock.now_ms();
            if room.project(now) {
                info!(room_id = %room.id(), "room timer expired");
                report.expired += 1;
            }
            if self.is_idle(room, now) {
                let room_id = room.id().clone();
                *slot = None;
                self.repository.remove(&room_id).await;
                stale_rooms.push(room_id);
            }
        }
        report.pruned = stale_rooms.len();
        if report != SweepReport::default() {
            debug!(expired = report.expired, ?stale_rooms, "swept rooms");
        }
        self.announce_deleted(&stale_rooms).await;
        report
    }

    async fn prune_expired(&self) {
        if self.options.idle_ttl.is_none() {
            return;
        }
        let mut stale_rooms = Vec::new();
        for entry in self.repository.entries().await {
            let mut slot = entry.room.lock().await;
            let Some(room) = slot.as_mut() else {
                continue;
            };
            let now = self.clock.now_ms();
            room.project(now);
            if self.is_idle(room, now) {
                let room_id = room.id().clone();
                *slot = None;
                self.repository.remove(&room_id).await;
                stale_rooms.push(room_id);
            }
        }
        if !stale_rooms.is_empty() {
            debug!(?stale_rooms, "pruned idle rooms");
        }
        self.announce_deleted(&stale_rooms).await;
    }

    /// Ends subscriptions to rooms that were closed without a caller.
    async fn announce_deleted(&self, room_ids: &[RoomId]) {
        let deleted = RoomOutcome::deleted();
        for room_id in room_ids {
            self.push.notify(room_id, &deleted).await;
        }
    }

    fn is_idle(&self, room: &Room, now_ms: u64) -> bool {
        match self.options.idle_ttl {
            Some(ttl) => {
                !room.is_running()
                    && now_ms.saturating_sub(room.last_activity_ms()) >= ttl.as_millis() as u64
            }
            None => false,
        }
    }

    async fn entry(&self, room_id: &str) -> Result<Arc<RoomEntry>, RegistryError> {
        self.repository.get(room_id).await.ok_or(RegistryError::NotFound)
    }

    /// Reads the clock under the room lock and applies any pending expiry.
    fn observe(&self, room: &mut Room) -> u64 {
        let now = self.clock.now_ms();
        if room.project(now) {
            info!(room_id = %room.id(), "room timer expired");
        }
        now
    }

    async fn with_room<T>(
        &self,
        room_id: &str,
        op: impl FnOnce(&mut Room, u64) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let entry = self.entry(room_id).await?;
        let mut slot = entry.room.lock().await;
        let room = slot.as_mut().ok_or(RegistryError::NotFound)?;
        let now = self.observe(room);
        op(room, now)
    }

    fn normalize_duration(&self, raw: i64) -> Result<u64, RegistryError> {
        let secs = raw.max(0) as u64;
        if secs > self.options.max_duration_secs {
            return Err(RegistryError::InvalidArgument(format!(
                "duration {secs}s exceeds maximum of {}s",
                self.options.max_duration_secs
            )));
        }
        Ok(secs)
    }
}

fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

fn require_host(room: &Room, requested_by: &str) -> Result<(), RegistryError> {
    if room.host() != requested_by {
        warn!(room_id = %room.id(), requested_by, "rejected host-only operation");
        return Err(RegistryError::Forbidden);
    }
    Ok(())
}

fn require_participant(room: &Room, requested_by: &str) -> Result<(), RegistryError> {
    if room.host() != requested_by && !room.is_member(requested_by) {
        warn!(room_id = %room.id(), requested_by, "rejected operation from non-member");
        return Err(RegistryError::Forbidden);
    }
    Ok(())
}

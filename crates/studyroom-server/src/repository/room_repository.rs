use crate::room::Room;
use shared::ids::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One slot per room. The slot is emptied under its lock when the room is
/// closed, so a handler that fetched the entry just before removal sees
/// `None` instead of mutating a dead room.
#[derive(Debug)]
pub struct RoomEntry {
    title_key: Option<String>,
    pub room: Mutex<Option<Room>>,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        Self {
            title_key: room.title().map(title_key),
            room: Mutex::new(Some(room)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertError {
    IdTaken,
    TitleTaken,
}

/// Case-insensitive form used for title collisions.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, Arc<RoomEntry>>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `room` unless its id is in use or, with `unique_titles`, its
    /// title collides with an active room.
    pub async fn insert(&self, room: Room, unique_titles: bool) -> Result<(), InsertError> {
        let id = room.id().clone();
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&id) {
            return Err(InsertError::IdTaken);
        }
        let entry = RoomEntry::new(room);
        if unique_titles {
            if let Some(key) = entry.title_key.as_deref() {
                if rooms.values().any(|e| e.title_key.as_deref() == Some(key)) {
                    return Err(InsertError::TitleTaken);
                }
            }
        }
        rooms.insert(id, Arc::new(entry));
        Ok(())
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<RoomEntry>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn remove(&self, room_id: &str) -> bool {
        self.rooms.write().await.remove(room_id).is_some()
    }

    pub async fn entries(&self) -> Vec<Arc<RoomEntry>> {
        self.rooms.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}

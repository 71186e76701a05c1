use shared::models::RoomOutcome;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const CHANNEL_CAPACITY: usize = 100;

/// Fan-out of room changes to WebSocket subscribers. Fed by the HTTP layer
/// after each successful mutation and by the registry when it prunes a room;
/// polling clients never touch it.
#[derive(Debug, Clone, Default)]
pub struct PushHub {
    inner: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<String> {
        let mut guard = self.inner.lock().await;
        let tx = guard.entry(room_id.to_string()).or_insert_with(|| {
            let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
            tx
        });
        tx.subscribe()
    }

    /// Publishes `outcome`. A deleted room also drops its channel, which
    /// ends every subscription after the final message.
    pub async fn notify(&self, room_id: &str, outcome: &RoomOutcome) {
        let Ok(msg) = serde_json::to_string(outcome) else {
            return;
        };
        let mut guard = self.inner.lock().await;
        if let Some(tx) = guard.get(room_id) {
            let _ = tx.send(msg);
        }
        if matches!(outcome, RoomOutcome::Deleted { .. }) {
            guard.remove(room_id);
        } else if guard.get(room_id).is_some_and(|tx| tx.receiver_count() == 0) {
            guard.remove(room_id);
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

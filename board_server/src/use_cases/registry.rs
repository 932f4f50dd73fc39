// Session registry: room id -> room task and the participants connected to it.

use super::ports::PayloadEncoder;
use super::room::{RoomError, RoomHandle, spawn_room};
use super::types::ParticipantId;
use crate::domain::Element;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Shared configuration for spawning rooms.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity for queued room events.
    pub event_channel_capacity: usize,
    /// Capacity for encoded room broadcasts per receiver.
    pub broadcast_capacity: usize,
    /// How long an empty room is kept for late joiners (zero keeps rooms forever).
    pub idle_ttl: Duration,
}

struct RoomEntry {
    handle: RoomHandle,
    participants: HashSet<ParticipantId>,
    // Set when the last participant leaves.
    empty_since: Option<Instant>,
}

/// Point-in-time view of a room for inspection routes.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    pub room_id: Arc<str>,
    pub participants: usize,
    pub elements: Vec<Element>,
}

/// Thread-safe registry of live rooms. Rooms are created lazily on first join.
pub struct RoomRegistry {
    settings: RoomSettings,
    encoder: Arc<dyn PayloadEncoder>,
    rooms: RwLock<HashMap<String, RoomEntry>>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, encoder: Arc<dyn PayloadEncoder>) -> Self {
        Self {
            settings,
            encoder,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a participant, spawning the room if this is its first join.
    pub async fn join(&self, room_id: &str, participant_id: ParticipantId) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        let entry = rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!(room_id, "room created");
            RoomEntry {
                handle: spawn_room(
                    Arc::from(room_id),
                    self.settings.event_channel_capacity,
                    self.settings.broadcast_capacity,
                    self.encoder.clone(),
                ),
                participants: HashSet::new(),
                empty_since: None,
            }
        });

        entry.participants.insert(participant_id);
        entry.empty_since = None;
        entry.handle.clone()
    }

    /// Drops a participant. History stays put for late joiners.
    pub async fn leave(&self, room_id: &str, participant_id: ParticipantId) {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get_mut(room_id) else {
            return;
        };

        entry.participants.remove(&participant_id);
        if entry.participants.is_empty() {
            entry.empty_since = Some(Instant::now());
            debug!(room_id, "room has no participants");
        }
    }

    /// Returns a room handle for the provided id, if the room exists.
    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|entry| entry.handle.clone())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn summary(&self, room_id: &str) -> Result<RoomSummary, RoomError> {
        let (handle, participants) = {
            let rooms = self.rooms.read().await;
            let entry = rooms
                .get(room_id)
                .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
            (entry.handle.clone(), entry.participants.len())
        };

        // Lock released before waiting on the room task.
        let elements = handle.snapshot().await?;
        Ok(RoomSummary {
            room_id: handle.room_id.clone(),
            participants,
            elements,
        })
    }

    /// Removes rooms that have been empty for at least the idle TTL.
    pub async fn evict_idle(&self, now: Instant) -> Vec<String> {
        let ttl = self.settings.idle_ttl;
        if ttl.is_zero() {
            return Vec::new();
        }

        let mut rooms = self.rooms.write().await;
        let expired: Vec<String> = rooms
            .iter()
            .filter(|(_, entry)| {
                entry
                    .empty_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= ttl)
            })
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in &expired {
            if let Some(entry) = rooms.remove(room_id) {
                entry.handle.shutdown();
                info!(room_id = %room_id, "idle room evicted");
            }
        }

        expired
    }

    /// Spawns the reaper that periodically evicts idle rooms.
    pub fn spawn_reaper(self: Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if self.settings.idle_ttl.is_zero() || interval.is_zero() {
            info!("room eviction disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(Instant::now()).await;
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "reaper pass finished");
                }
            }
        }))
    }
}

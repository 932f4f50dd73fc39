// Room store task: the single writer for one room's history.

use super::distribution::{plan, rule_for};
use super::ports::PayloadEncoder;
use super::types::{Delivery, Intent, JoinAck, ParticipantId, RoomBroadcast, RoomEvent};
use crate::domain::{Element, Mutation, RoomHistory};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tracing::{debug, error};

/// Errors returned by room and registry operations.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room {0} is closed")]
    Closed(Arc<str>),
    #[error("room {0} not found")]
    NotFound(String),
}

/// Cheap, cloneable access to a running room task.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    /// Identifier participants use to target this room.
    pub room_id: Arc<str>,
    events_tx: mpsc::Sender<RoomEvent>,
    shutdown: Arc<Notify>,
}

impl RoomHandle {
    /// Subscribes to the room and returns the history as of that moment.
    pub async fn join(&self, participant_id: ParticipantId) -> Result<JoinAck, RoomError> {
        let (reply, ack_rx) = oneshot::channel();
        self.events_tx
            .send(RoomEvent::Join {
                participant_id,
                reply,
            })
            .await
            .map_err(|_| self.closed())?;
        ack_rx.await.map_err(|_| self.closed())
    }

    /// Queues an intent; the room applies intents in arrival order.
    pub async fn submit(
        &self,
        participant_id: ParticipantId,
        intent: Intent,
    ) -> Result<(), RoomError> {
        self.events_tx
            .send(RoomEvent::Intent {
                participant_id,
                intent,
            })
            .await
            .map_err(|_| self.closed())
    }

    /// Swaps a lagged subscription for a fresh one plus the history as of that moment.
    pub async fn resync(&self, participant_id: ParticipantId) -> Result<JoinAck, RoomError> {
        let (reply, ack_rx) = oneshot::channel();
        self.events_tx
            .send(RoomEvent::Resync {
                participant_id,
                reply,
            })
            .await
            .map_err(|_| self.closed())?;
        ack_rx.await.map_err(|_| self.closed())
    }

    /// Reads a copy of the current history.
    pub async fn snapshot(&self) -> Result<Vec<Element>, RoomError> {
        let (reply, snapshot_rx) = oneshot::channel();
        self.events_tx
            .send(RoomEvent::Snapshot { reply })
            .await
            .map_err(|_| self.closed())?;
        snapshot_rx.await.map_err(|_| self.closed())
    }

    /// Stops the room task. Pending events are dropped.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    fn closed(&self) -> RoomError {
        RoomError::Closed(self.room_id.clone())
    }
}

/// Spawns the task owning a fresh, empty room history.
pub fn spawn_room(
    room_id: Arc<str>,
    event_channel_capacity: usize,
    broadcast_capacity: usize,
    encoder: Arc<dyn PayloadEncoder>,
) -> RoomHandle {
    let (events_tx, events_rx) = mpsc::channel::<RoomEvent>(event_channel_capacity);
    let (updates_tx, _updates_rx) = broadcast::channel::<RoomBroadcast>(broadcast_capacity);
    let shutdown = Arc::new(Notify::new());

    tokio::spawn(room_task(
        room_id.clone(),
        events_rx,
        updates_tx,
        encoder,
        shutdown.clone(),
    ));

    RoomHandle {
        room_id,
        events_tx,
        shutdown,
    }
}

pub async fn room_task(
    room_id: Arc<str>,
    mut events_rx: mpsc::Receiver<RoomEvent>,
    updates_tx: broadcast::Sender<RoomBroadcast>,
    encoder: Arc<dyn PayloadEncoder>,
    shutdown: Arc<Notify>,
) {
    let mut history = RoomHistory::new();
    debug!(room_id = %room_id, "room task started");

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            event = events_rx.recv() => match event {
                Some(event) => event,
                // Every handle is gone.
                None => break,
            },
        };

        match event {
            RoomEvent::Join {
                participant_id,
                reply,
            } => {
                if reply.send(subscribe(&history, &updates_tx)).is_err() {
                    debug!(room_id = %room_id, participant_id, "joiner left before snapshot");
                }
            }
            RoomEvent::Resync {
                participant_id,
                reply,
            } => {
                debug!(room_id = %room_id, participant_id, "resubscribing lagged participant");
                let _ = reply.send(subscribe(&history, &updates_tx));
            }
            RoomEvent::Intent {
                participant_id,
                intent,
            } => {
                let (outcome, delivery) = process_intent(&mut history, participant_id, intent);
                if let Mutation::Ignored(reason) = outcome {
                    debug!(room_id = %room_id, participant_id, ?reason, "intent ignored");
                }
                if let Some(delivery) = delivery {
                    publish(&room_id, &updates_tx, encoder.as_ref(), delivery);
                }
            }
            RoomEvent::Snapshot { reply } => {
                let _ = reply.send(history.snapshot());
            }
        }
    }

    debug!(room_id = %room_id, elements = history.len(), "room task stopped");
}

// Subscribing inside the task orders the snapshot before every later update.
fn subscribe(history: &RoomHistory, updates_tx: &broadcast::Sender<RoomBroadcast>) -> JoinAck {
    JoinAck {
        snapshot: history.snapshot(),
        updates_rx: updates_tx.subscribe(),
    }
}

/// Applies one intent to the history and decides its fan-out.
pub fn process_intent(
    history: &mut RoomHistory,
    sender: ParticipantId,
    intent: Intent,
) -> (Mutation, Option<Delivery>) {
    let rule = rule_for(&intent);
    let (outcome, relayed) = apply(history, intent);
    (outcome, plan(rule, sender, outcome, relayed, history))
}

fn apply(history: &mut RoomHistory, intent: Intent) -> (Mutation, Option<Element>) {
    match intent {
        Intent::DrawLive(element) => (Mutation::Applied, Some(element)),
        Intent::Finalize(element) => {
            history.append_finalized(element);
            (Mutation::Applied, None)
        }
        Intent::Undo => (history.undo_last(), None),
        Intent::Clear => (history.clear(), None),
        Intent::EditText { id, text } => (history.edit_text(&id, text), None),
        Intent::Move { id, x, y } => (history.move_element(&id, x, y), None),
    }
}

fn publish(
    room_id: &str,
    updates_tx: &broadcast::Sender<RoomBroadcast>,
    encoder: &dyn PayloadEncoder,
    delivery: Delivery,
) {
    // Encode once; every connection in the room shares the bytes.
    let bytes = match encoder.encode(&delivery.payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(room_id, error = %e, "failed to encode room update");
            return;
        }
    };

    // Send only fails when nobody is subscribed.
    let _ = updates_tx.send(RoomBroadcast {
        audience: delivery.audience,
        bytes,
    });
}

// Use-case level inputs/outputs for room tasks.

use crate::domain::Element;
use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, oneshot};

pub type ParticipantId = u64;

/// A participant's request against its joined room.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    // In-progress stroke (or a fresh text/sticky) relayed to the others.
    DrawLive(Element),
    // Completed element to persist.
    Finalize(Element),
    Undo,
    Clear,
    EditText { id: String, text: String },
    Move { id: String, x: f64, y: f64 },
}

/// Events consumed by a room task, applied strictly in arrival order.
#[derive(Debug)]
pub enum RoomEvent {
    Join {
        participant_id: ParticipantId,
        reply: oneshot::Sender<JoinAck>,
    },
    Intent {
        participant_id: ParticipantId,
        intent: Intent,
    },
    // Lagged receivers are replaced, so no stale update trails the snapshot.
    Resync {
        participant_id: ParticipantId,
        reply: oneshot::Sender<JoinAck>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Element>>,
    },
}

/// Snapshot plus a receiver that only sees updates applied after it.
#[derive(Debug)]
pub struct JoinAck {
    pub snapshot: Vec<Element>,
    pub updates_rx: broadcast::Receiver<RoomBroadcast>,
}

/// Who in the room gets a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    AllExcept(ParticipantId),
}

impl Audience {
    pub fn includes(self, participant_id: ParticipantId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(sender) => sender != participant_id,
        }
    }
}

/// What a delivery carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Relay(Element),
    Snapshot(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub payload: Payload,
}

/// Encoded delivery shared by every connection in the room.
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    pub audience: Audience,
    pub bytes: Utf8Bytes,
}

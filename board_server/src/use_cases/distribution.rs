// Fan-out rules: which intents relay, which resend the full history, and to whom.
//
// Continuous drawing is relayed thin and never persisted here; anything that can
// invalidate what others already rendered goes out as a full snapshot.

use super::types::{Audience, Delivery, Intent, ParticipantId, Payload};
use crate::domain::{Element, Mutation, RoomHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    RelayToOthers,
    PersistOnly,
    SnapshotToEveryone,
    SnapshotToOthers,
}

pub fn rule_for(intent: &Intent) -> Rule {
    match intent {
        Intent::DrawLive(_) => Rule::RelayToOthers,
        Intent::Finalize(_) => Rule::PersistOnly,
        Intent::Undo | Intent::Clear | Intent::EditText { .. } => Rule::SnapshotToEveryone,
        Intent::Move { .. } => Rule::SnapshotToOthers,
    }
}

/// Builds the delivery for an intent the room store already handled.
///
/// Ignored mutations produce nothing, so participants see no effect.
pub fn plan(
    rule: Rule,
    sender: ParticipantId,
    outcome: Mutation,
    relayed: Option<Element>,
    history: &RoomHistory,
) -> Option<Delivery> {
    if !outcome.is_applied() {
        return None;
    }

    match rule {
        Rule::RelayToOthers => relayed.map(|element| Delivery {
            audience: Audience::AllExcept(sender),
            payload: Payload::Relay(element),
        }),
        Rule::PersistOnly => None,
        Rule::SnapshotToEveryone => Some(Delivery {
            audience: Audience::Everyone,
            payload: Payload::Snapshot(history.snapshot()),
        }),
        Rule::SnapshotToOthers => Some(Delivery {
            audience: Audience::AllExcept(sender),
            payload: Payload::Snapshot(history.snapshot()),
        }),
    }
}

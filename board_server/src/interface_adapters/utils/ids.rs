use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PARTICIPANT_ID: AtomicU64 = AtomicU64::new(1);

// Process-unique id for one participant connection.
pub fn next_participant_id() -> u64 {
    NEXT_PARTICIPANT_ID.fetch_add(1, Ordering::Relaxed)
}

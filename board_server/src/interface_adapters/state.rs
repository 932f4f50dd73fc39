use crate::use_cases::RoomRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Live rooms keyed by room id; shared by sockets and inspection routes.
    pub room_registry: Arc<RoomRegistry>,
}

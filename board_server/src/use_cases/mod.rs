// Use cases layer: room workflows for the board server.

pub mod distribution;
pub mod ports;
pub mod registry;
pub mod room;
pub mod types;

pub use ports::{EncodeError, PayloadEncoder};
pub use registry::{RoomRegistry, RoomSettings, RoomSummary};
pub use room::{RoomError, RoomHandle};
pub use types::{Audience, Delivery, Intent, JoinAck, ParticipantId, Payload, RoomBroadcast};

// Network adapter modules split by participant sockets vs inspection HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::{health_handler, room_info_handler};

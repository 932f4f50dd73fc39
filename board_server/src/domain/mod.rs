// Domain layer: board elements and the per-room history rules.

pub mod element;
pub mod history;

pub use element::{Element, Point, StickyNote, Stroke, TextLabel};
pub use history::{IgnoreReason, Mutation, RoomHistory};

// Authoritative, ordered element history for one room.

use super::element::Element;

/// Why a history mutation left the history untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Undo requested with nothing left to undo.
    EmptyHistory,
    /// No element carries the requested id.
    UnknownElement,
    /// The element exists but its kind has no text or position.
    NotEditable,
}

/// Outcome of a history mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    Ignored(IgnoreReason),
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        matches!(self, Mutation::Applied)
    }
}

/// Finalized elements in the order their finalize events arrived.
///
/// In-progress strokes never land here; they are only relayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomHistory {
    elements: Vec<Element>,
}

impl RoomHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Read-only copy handed to participants.
    pub fn snapshot(&self) -> Vec<Element> {
        self.elements.clone()
    }

    /// Appends without a uniqueness check; clients de-duplicate relayed ids.
    pub fn append_finalized(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn undo_last(&mut self) -> Mutation {
        match self.elements.pop() {
            Some(_) => Mutation::Applied,
            None => Mutation::Ignored(IgnoreReason::EmptyHistory),
        }
    }

    pub fn clear(&mut self) -> Mutation {
        self.elements.clear();
        Mutation::Applied
    }

    pub fn edit_text(&mut self, id: &str, text: String) -> Mutation {
        match self.find_mut(id) {
            Some(element) => {
                if element.set_text(text) {
                    Mutation::Applied
                } else {
                    Mutation::Ignored(IgnoreReason::NotEditable)
                }
            }
            None => Mutation::Ignored(IgnoreReason::UnknownElement),
        }
    }

    pub fn move_element(&mut self, id: &str, x: f64, y: f64) -> Mutation {
        match self.find_mut(id) {
            Some(element) => {
                if element.move_to(x, y) {
                    Mutation::Applied
                } else {
                    Mutation::Ignored(IgnoreReason::NotEditable)
                }
            }
            None => Mutation::Ignored(IgnoreReason::UnknownElement),
        }
    }

    // First match wins when a client finalized the same id twice.
    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|element| element.has_id(id))
    }
}

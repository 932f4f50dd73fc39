// Drawable canvas primitives. Pure values; rooms own them, connections copy them.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Freehand line. Points only grow while the stroke is being drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub id: Option<String>,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
    pub is_eraser: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StickyNote {
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// One drawable unit on the board.
///
/// Elements without an id can be relayed and persisted but never targeted by
/// edit or move, since both look the element up by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Stroke(Stroke),
    Text(TextLabel),
    Sticky(StickyNote),
}

impl Element {
    pub fn id(&self) -> Option<&str> {
        match self {
            Element::Stroke(stroke) => stroke.id.as_deref(),
            Element::Text(label) => label.id.as_deref(),
            Element::Sticky(note) => note.id.as_deref(),
        }
    }

    /// True when this element carries exactly the given id.
    pub fn has_id(&self, id: &str) -> bool {
        self.id() == Some(id)
    }

    /// Replaces the text content. Returns false for kinds without text.
    pub fn set_text(&mut self, text: String) -> bool {
        match self {
            Element::Text(label) => {
                label.text = text;
                true
            }
            Element::Sticky(note) => {
                note.text = text;
                true
            }
            Element::Stroke(_) => false,
        }
    }

    /// Replaces the anchor position. Returns false for kinds without a position.
    pub fn move_to(&mut self, x: f64, y: f64) -> bool {
        match self {
            Element::Text(label) => {
                label.x = x;
                label.y = y;
                true
            }
            Element::Sticky(note) => {
                note.x = x;
                note.y = y;
                true
            }
            Element::Stroke(_) => false,
        }
    }

    /// True when every coordinate and size is a finite number.
    pub fn is_finite(&self) -> bool {
        match self {
            Element::Stroke(stroke) => {
                stroke.stroke_width.is_finite()
                    && stroke
                        .points
                        .iter()
                        .all(|p| p.x.is_finite() && p.y.is_finite())
            }
            Element::Text(label) => {
                label.x.is_finite() && label.y.is_finite() && label.font_size.is_finite()
            }
            Element::Sticky(note) => note.x.is_finite() && note.y.is_finite(),
        }
    }
}

// Wire protocol DTOs and conversions for the board WebSocket.
// Frames are JSON text shaped `{"type": "<event>", "data": <payload>}`.

use crate::domain::{Element, Point, StickyNote, Stroke, TextLabel};
use crate::use_cases::{EncodeError, Payload, PayloadEncoder};
use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected participants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    // Authoritative full history; replaces whatever the client rendered.
    LoadHistory(Vec<ElementDto>),
    // Live element relayed from another participant.
    DrawLine(ElementDto),
}

impl From<&Payload> for ServerMessage {
    fn from(payload: &Payload) -> Self {
        match payload {
            Payload::Relay(element) => ServerMessage::DrawLine(element.into()),
            Payload::Snapshot(elements) => ServerMessage::LoadHistory(history_dto(elements)),
        }
    }
}

pub fn history_dto(elements: &[Element]) -> Vec<ElementDto> {
    elements.iter().map(ElementDto::from).collect()
}

/// Messages participants send to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom(String),
    DrawLine(ElementPayload),
    EndStroke(ElementPayload),
    Undo(String),
    Clear(String),
    EditLine(EditLinePayload),
    MoveElement(MoveElementPayload),
}

impl ClientMessage {
    /// Room id the message targets, as sent by the client.
    pub fn room(&self) -> &str {
        match self {
            ClientMessage::JoinRoom(room)
            | ClientMessage::Undo(room)
            | ClientMessage::Clear(room) => room,
            ClientMessage::DrawLine(payload) | ClientMessage::EndStroke(payload) => &payload.room,
            ClientMessage::EditLine(payload) => &payload.room,
            ClientMessage::MoveElement(payload) => &payload.room,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementPayload {
    pub room: String,
    pub data: ElementDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLinePayload {
    pub room: String,
    pub id: String,
    pub new_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveElementPayload {
    pub room: String,
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Element as it travels on the wire, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementDto {
    Stroke(StrokeDto),
    Text(TextDto),
    Sticky(StickyDto),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub is_eraser: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
}

// Defaults mirror the browser client's pen.
fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_stroke_width() -> f64 {
    5.0
}

fn default_font_size() -> f64 {
    20.0
}

impl From<ElementDto> for Element {
    fn from(dto: ElementDto) -> Self {
        match dto {
            ElementDto::Stroke(s) => Element::Stroke(Stroke {
                id: s.id,
                points: s.points.into_iter().map(|[x, y]| Point { x, y }).collect(),
                color: s.color,
                stroke_width: s.stroke_width,
                is_eraser: s.is_eraser,
            }),
            ElementDto::Text(t) => Element::Text(TextLabel {
                id: t.id,
                x: t.x,
                y: t.y,
                text: t.text,
                color: t.color,
                font_size: t.font_size,
            }),
            ElementDto::Sticky(n) => Element::Sticky(StickyNote {
                id: n.id,
                x: n.x,
                y: n.y,
                text: n.text,
            }),
        }
    }
}

impl From<&Element> for ElementDto {
    fn from(element: &Element) -> Self {
        match element {
            Element::Stroke(s) => ElementDto::Stroke(StrokeDto {
                id: s.id.clone(),
                points: s.points.iter().map(|p| [p.x, p.y]).collect(),
                color: s.color.clone(),
                stroke_width: s.stroke_width,
                is_eraser: s.is_eraser,
            }),
            Element::Text(t) => ElementDto::Text(TextDto {
                id: t.id.clone(),
                x: t.x,
                y: t.y,
                text: t.text.clone(),
                color: t.color.clone(),
                font_size: t.font_size,
            }),
            Element::Sticky(n) => ElementDto::Sticky(StickyDto {
                id: n.id.clone(),
                x: n.x,
                y: n.y,
                text: n.text.clone(),
            }),
        }
    }
}

/// Encodes room payloads as JSON server messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadEncoder;

impl PayloadEncoder for JsonPayloadEncoder {
    fn encode(&self, payload: &Payload) -> Result<Utf8Bytes, EncodeError> {
        Ok(encode_message(&ServerMessage::from(payload))?)
    }
}

pub fn encode_message(msg: &ServerMessage) -> Result<Utf8Bytes, serde_json::Error> {
    serde_json::to_string(msg).map(Utf8Bytes::from)
}

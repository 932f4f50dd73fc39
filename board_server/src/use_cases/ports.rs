use super::types::Payload;
use axum::extract::ws::Utf8Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

// Port for turning a delivery payload into wire bytes, once per room update.
pub trait PayloadEncoder: Send + Sync {
    fn encode(&self, payload: &Payload) -> Result<Utf8Bytes, EncodeError>;
}

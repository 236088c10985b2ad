//! Protocol-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string of {len} bytes exceeds the maximum of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("byte array of {len} bytes exceeds the maximum of {max}")]
    ArrayTooLong { len: usize, max: usize },

    #[error("frame length {len} out of range (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

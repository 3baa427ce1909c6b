//! 错误类型 (Error types)

use thiserror::Error;

/// Result type alias for the player library
pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("failed to open source: {0}")]
    Open(String),

    #[error("no source is open")]
    NotOpened,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("seek to frame {0} failed")]
    Seek(i64),

    #[error("detector error: {0}")]
    Detector(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    pub fn open<S: Into<String>>(msg: S) -> Self {
        Self::Open(msg.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::Detector(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

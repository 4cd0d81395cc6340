//! Error types for the diorama-net crate

use thiserror::Error;

/// Network layer errors for sync engine operations
#[derive(Error, Debug)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Scene error: {0}")]
    Scene(#[from] diorama_scene::SceneError),

    #[error("Registry error: {0}")]
    Registry(String),
}

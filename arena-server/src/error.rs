use thiserror::Error;

/// Failures surfaced by the room runtime and its collaborators.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The room's worker task has stopped; its command channel is closed.
    #[error("room {0} is closed")]
    RoomClosed(String),

    /// No room could take another player.
    #[error("no room available: {0}")]
    RoomUnavailable(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::Codec(e.to_string())
    }
}

impl From<bincode::Error> for ServerError {
    fn from(e: bincode::Error) -> Self {
        ServerError::Codec(e.to_string())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

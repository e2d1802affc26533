use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source could not be opened: {0}")]
    Open(String),
    #[error("capture handle is not open")]
    NotOpen,
    #[error("read failed: {0}")]
    Read(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid frame size: {0}")]
    InvalidSize(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(String),
}

//! Application error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] huddle_core::Error),

    #[error("Network error: {0}")]
    Net(#[from] huddle_net::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not logged in; run `huddle login` first")]
    NotLoggedIn,

    #[error("No group selected; create or join a group first")]
    NoGroup,

    #[error("Clipboard unavailable")]
    Clipboard,

    #[error("{0}")]
    Usage(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

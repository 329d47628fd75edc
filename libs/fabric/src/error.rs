use std::fmt;

use tagline_core::Tag;
use thiserror::Error;

/// Which bounded wait ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No transport was created in time
    Transport,
    /// No outbound tag was observed in time
    Tag,
    /// No correlated response arrived in time
    Response,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Transport => f.write_str("waiting for a transport"),
            TimeoutKind::Tag => f.write_str("waiting for the first outbound tag"),
            TimeoutKind::Response => f.write_str("server took too long to handle the request"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Timeout: {0}")]
    Timeout(TimeoutKind),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Request {0} suppressed by send hook")]
    Suppressed(Tag),

    #[error("Request {0} abandoned: listener removed")]
    Abandoned(Tag),

    #[error("Interception hook already installed")]
    HookAlreadyInstalled,

    #[error("Interception hook not installed")]
    HookNotInstalled,

    #[error(transparent)]
    Core(#[from] tagline_core::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

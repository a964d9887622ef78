use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while talking to a Redis server.
///
/// Server side error replies are plain data (`Resp::Error`) until a caller
/// checks them, at which point they turn into `Error::Redis`, `Error::Moved`
/// or `Error::Ask`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid Redis channel")]
    InvalidChannel,

    #[error("Redis returned null")]
    Null,

    #[error("Redis returned an error: {0}")]
    Redis(String),

    #[error("incomplete Redis transfer")]
    IncompleteTransfer,

    #[error("unexpected Redis response type: expected `{expected}`, got `{got}`")]
    UnexpectedResp { expected: String, got: String },

    #[error("unexpected Redis array size: expected {expected}, got {got}")]
    UnexpectedArraySize { expected: i64, got: i64 },

    #[error("keyword has moved to another cluster shard: slot {slot} at {address}")]
    Moved { slot: u16, address: String },

    #[error("keyword is migrating, use ASKING on new shard: slot {slot} at {address}")]
    Ask { slot: u16, address: String },

    #[error("{message} (at byte offset {offset})")]
    Parser { message: String, offset: usize },

    #[error("incomplete RESP data")]
    Incomplete,

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("service unavailable: {0}")]
    NoService(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Numeric error code, compatible with the codes used by other RedisX
    /// clients.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidChannel => -101,
            Error::Null => -102,
            Error::Redis(_) => -103,
            Error::IncompleteTransfer | Error::Incomplete => -104,
            Error::UnexpectedResp { .. } => -105,
            Error::UnexpectedArraySize { .. } => -106,
            Error::Moved { .. } => -107,
            Error::Ask { .. } => -108,
            Error::Parser { .. } => -1,
            Error::NotConnected => -2,
            Error::AlreadyConnected => -3,
            Error::InvalidArgument(_) => -4,
            Error::NoService(_) => -5,
            Error::Io(_) => -6,
        }
    }

    /// True if more bytes are needed before a RESP value can be decoded.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete)
    }

    /// True for socket level failures, including timeouts.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

/// Returns an `Err(Error::Parser)` from a message and a byte offset.
#[macro_export]
macro_rules! parser_error {
    ($msg:expr, $offset:expr) => {
        Err($crate::Error::Parser {
            message: $msg.to_string(),
            offset: $offset,
        })
    };
}

/// Returns an `Err(Error::InvalidArgument)` from a message.
#[macro_export]
macro_rules! invalid_argument {
    ($msg:literal) => {
        Err($crate::Error::InvalidArgument($msg.to_string()))
    };
    ($msg:expr) => {
        Err($crate::Error::InvalidArgument($msg))
    };
}

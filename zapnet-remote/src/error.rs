use std::{fmt, io};

/// Everything a register access can fail with.
#[derive(Debug)]
pub enum Error {
    /// Socket failure.
    Io(io::Error),
    /// No reply to a read of `addr` within the client timeout.
    Timeout {
        /// First address of the unanswered request.
        addr: u32,
    },
    /// A reply that cannot be the answer to our request.
    MalformedReply(&'static str),
    /// The request could not be encoded.
    Request(&'static str),
    /// A command-line number that is neither decimal nor `0x` hex.
    BadNumber(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "socket error: {}", e),
            Error::Timeout { addr } => write!(f, "no reply reading {:#010x}", addr),
            Error::MalformedReply(why) => write!(f, "malformed reply: {}", why),
            Error::Request(why) => write!(f, "cannot build request: {}", why),
            Error::BadNumber(text) => write!(f, "not a number: {:?}", text),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

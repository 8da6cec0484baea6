use std::fmt;
use std::io;

/// Errors surfaced by the filesystem-facing operations. Protocol-level
/// failures never reach this type: the multiplexer flags the connection as
/// closing, and serve paths answer with an HTTP error reply instead.
#[derive(Debug)]
pub enum Error {
    /// An underlying filesystem or stream operation failed.
    Io(io::Error),
    /// The upload query string carried no `name` variable.
    MissingName,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::MissingName => write!(f, "name required"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::MissingName => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

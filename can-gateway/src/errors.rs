use std::fmt;
use std::io;
use std::net::AddrParseError;

/// Errors produced while opening or configuring a gateway transport.
#[derive(Debug)]
pub enum TransportError {
    /// I/O error from the underlying socket.
    Io(io::Error),
    /// Invalid parameter rejected before touching the socket.
    Config(&'static str),
    /// Malformed remote or local address.
    Addr(AddrParseError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(err) => write!(f, "io error: {err}"),
            TransportError::Config(msg) => write!(f, "invalid config: {msg}"),
            TransportError::Addr(err) => write!(f, "invalid address: {err}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(err) => Some(err),
            TransportError::Addr(err) => Some(err),
            TransportError::Config(_) => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<AddrParseError> for TransportError {
    fn from(err: AddrParseError) -> Self {
        TransportError::Addr(err)
    }
}

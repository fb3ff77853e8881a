//! Unified error type.

use std::fmt;
use std::net::AddrParseError;

/// The error type returned by strand's fallible operations.
///
/// Request-level failures never show up here: handlers write them to the
/// [`ResponseWriter`](crate::ResponseWriter). This type covers startup
/// configuration and the listener itself.
#[derive(Debug)]
pub enum Error {
    /// The bind address is not a valid `host:port`.
    Addr { addr: String, source: AddrParseError },
    /// Binding or accepting failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addr { addr, source } => write!(f, "invalid address `{addr}`: {source}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Addr { source, .. } => Some(source),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_error_names_the_address() {
        let source = "nope".parse::<std::net::SocketAddr>().unwrap_err();
        let e = Error::Addr { addr: "nope".into(), source };
        assert!(e.to_string().starts_with("invalid address `nope`"));
        assert!(std::error::Error::source(&e).is_some());
    }
}

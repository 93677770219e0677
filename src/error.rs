//! Error type shared by the region, the bulk and field surfaces and the API.

use std::fmt;
use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised by register region operations.
#[derive(Debug)]
pub enum Error {
    /// Bulk transfer size differs from the region size.
    InvalidLength { expected: usize, actual: usize },
    /// Field text is not an unsigned integer.
    Parse(String),
    /// Value does not fit the field mask.
    OutOfRange { value: u64, mask: u32 },
    /// Bytes could not be moved between the caller and the mirror.
    Fault,
    /// The device was detached.
    Closed,
    /// Register offset lies outside the mapped range.
    OutOfBounds { offset: usize },
    UnknownDevice(String),
    UnknownField(String),
    Io(io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidLength { expected, actual } => write!(
                f,
                "incorrect transfer size for region: {} instead of {}",
                actual, expected
            ),
            Error::Parse(text) => write!(f, "can't parse {:?} as an unsigned integer", text),
            Error::OutOfRange { value, mask } => {
                write!(f, "invalid value 0x{:x} for mask 0x{:x}", value, mask)
            }
            Error::Fault => write!(f, "can't copy between caller and local region"),
            Error::Closed => write!(f, "device is closed"),
            Error::OutOfBounds { offset } => {
                write!(f, "register offset 0x{:x} is outside the mapped range", offset)
            }
            Error::UnknownDevice(name) => write!(f, "no such device: {}", name),
            Error::UnknownField(name) => write!(f, "no such field: {}", name),
            Error::Io(e) => write!(f, "{}", e),
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

/// Recovers an `Error` that crossed an `io::Read`/`io::Write` boundary.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::Io(io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match &e {
            Error::InvalidLength { .. } | Error::Parse(_) | Error::OutOfRange { .. } => {
                io::ErrorKind::InvalidInput
            }
            Error::UnknownDevice(_) | Error::UnknownField(_) => io::ErrorKind::NotFound,
            Error::Closed => io::ErrorKind::NotConnected,
            Error::Io(inner) => inner.kind(),
            Error::Fault | Error::OutOfBounds { .. } => io::ErrorKind::Other,
        };
        match e {
            Error::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidLength { .. } | Error::Parse(_) | Error::OutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::UnknownDevice(_) | Error::UnknownField(_) => StatusCode::NOT_FOUND,
            Error::Closed => StatusCode::SERVICE_UNAVAILABLE,
            Error::Fault | Error::OutOfBounds { .. } | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_become_invalid_input() {
        let e: io::Error = Error::InvalidLength { expected: 4, actual: 3 }.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        assert!(e.to_string().contains("3 instead of 4"));
    }

    #[test]
    fn io_errors_pass_through() {
        let e: io::Error = Error::Io(io::Error::from(io::ErrorKind::PermissionDenied)).into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn errors_survive_an_io_round_trip() {
        let e: io::Error = Error::Closed.into();
        assert_eq!(e.kind(), io::ErrorKind::NotConnected);
        assert!(matches!(Error::from(e), Error::Closed));

        let e: io::Error = Error::InvalidLength { expected: 4, actual: 8 }.into();
        assert!(matches!(
            Error::from(e),
            Error::InvalidLength { expected: 4, actual: 8 }
        ));

        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(Error::from(plain), Error::Io(_)));
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::OutOfRange { value: 0x107, mask: 0xFF }.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Closed.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(Error::UnknownField("x".into()).status(), StatusCode::NOT_FOUND);
    }
}

use std::io;
use thiserror::Error;

/// Portable failure categories shared by every backend.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("Not connected")]
    NotConnected,
    #[error("Transfer failed")]
    TransferFailed,
    #[error("Path not found")]
    PathNotFound,
    #[error("Path conflict")]
    PathConflict,
    #[error("Authentication rejected")]
    AuthRejected,
    #[error("Network unreachable")]
    NetworkUnreachable,
    #[error("Command rejected")]
    CommandRejected,
    #[error("Unknown")]
    Unknown,
}

impl ErrorKind {
    /// Stable numeric code used when the backend did not supply a native one.
    pub const fn code(self) -> u32 {
        match self {
            Self::NotConnected => 1,
            Self::TransferFailed => 2,
            Self::PathNotFound => 3,
            Self::PathConflict => 4,
            Self::AuthRejected => 5,
            Self::NetworkUnreachable => 6,
            Self::CommandRejected => 7,
            Self::Unknown => 8,
        }
    }
}

/// Failure of a single stream operation.
///
/// `code` carries whatever the transport reported (an FTP reply code, an OS
/// error number) without translation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    code: Option<u32>,
    message: String,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, "no active session")
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(ErrorKind::PathNotFound, format!("'{path}' does not exist"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PathConflict, message)
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Native code if the transport supplied one, the kind's code otherwise.
    pub fn code(&self) -> u32 {
        self.code.unwrap_or_else(|| self.kind.code())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::PathNotFound,
            io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied => {
                ErrorKind::PathConflict
            }
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut => ErrorKind::NetworkUnreachable,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => ErrorKind::TransferFailed,
            _ => ErrorKind::Unknown,
        };

        let error = Self::new(kind, err.to_string());
        match err.raw_os_error().and_then(|code| u32::try_from(code).ok()) {
            Some(code) => error.with_code(code),
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_prefers_native_value() {
        let error = Error::new(ErrorKind::PathNotFound, "gone").with_code(550);
        assert_eq!(error.code(), 550);
        assert_eq!(Error::not_connected().code(), ErrorKind::NotConnected.code());
    }

    #[test]
    fn test_io_error_mapping() {
        let missing: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert_eq!(missing.kind(), ErrorKind::PathNotFound);

        let denied: Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(denied.kind(), ErrorKind::PathConflict);

        let refused: Error = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert_eq!(refused.kind(), ErrorKind::NetworkUnreachable);
    }

    #[test]
    fn test_display() {
        let error = Error::new(ErrorKind::CommandRejected, "502 not implemented");
        assert_eq!(error.to_string(), "Command rejected: 502 not implemented");
    }
}

use suppaftp::FtpError;

use crate::error::{Error, ErrorKind};

/// Maps an FTP reply code onto the portable error kinds.
///
/// `450`/`550` are used by servers for both missing paths and refused
/// ones, so the reply text decides between the two.
pub fn classify(code: u32, text: &str) -> ErrorKind {
    match code {
        421 | 434 => ErrorKind::NetworkUnreachable,
        425 | 426 | 451 | 452 | 552 => ErrorKind::TransferFailed,
        430 | 530 | 532 => ErrorKind::AuthRejected,
        450 | 550 => {
            let lower = text.to_lowercase();
            if lower.contains("no such") || lower.contains("not exist") || lower.contains("not found")
            {
                ErrorKind::PathNotFound
            } else if lower.contains("exist")
                || lower.contains("denied")
                || lower.contains("permission")
            {
                ErrorKind::PathConflict
            } else {
                ErrorKind::PathNotFound
            }
        }
        553 => ErrorKind::PathConflict,
        400..=599 => ErrorKind::CommandRejected,
        _ => ErrorKind::Unknown,
    }
}

/// Error for a negative reply, keeping the reply code as the error code.
pub fn reply_error(code: u32, text: impl Into<String>) -> Error {
    let text = text.into();
    Error::new(classify(code, &text), text).with_code(code)
}

impl From<FtpError> for Error {
    fn from(err: FtpError) -> Self {
        let message = err.to_string();
        match err {
            FtpError::ConnectionError(io) => Self::from(io),
            FtpError::UnexpectedResponse(response) => reply_error(response.status.code(), message),
            FtpError::InvalidAddress(_) => Self::new(ErrorKind::NetworkUnreachable, message),
            _ => Self::new(ErrorKind::Unknown, message),
        }
    }
}

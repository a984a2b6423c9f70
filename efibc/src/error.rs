use std::fmt;

use crate::status::Status;

/// A thin wrapper around [efivar::Error] to provide [std::error::Error]
/// implementation and a mapping onto firmware status codes.
pub struct EfiError(pub efivar::Error);

impl EfiError {
    /// The firmware status code closest to the wrapped error.
    pub fn status(&self) -> Status {
        use efivar::Error;
        match &self.0 {
            Error::VarNotFound { .. } => Status::NOT_FOUND,
            Error::PermissionDenied { .. } => Status::WRITE_PROTECTED,
            Error::InvalidVarName { .. } | Error::InvalidUTF8 | Error::UnknownFlag { .. } => {
                Status::INVALID_PARAMETER
            }
            Error::BufferTooSmall { .. } => Status::BUFFER_TOO_SMALL,
            _ => Status::DEVICE_ERROR,
        }
    }
}

impl fmt::Debug for EfiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for EfiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for EfiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use efivar::Error;
        match &self.0 {
            Error::VarUnknownError { name: _, error } | Error::UnknownIoError { error } => {
                Some(error)
            }
            Error::UuidError { error } => Some(error),
            _ => None,
        }
    }
}

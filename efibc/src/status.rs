//! Firmware status codes.

use std::fmt;

const HIGHEST_BIT_SET: usize = !((!0_usize) >> 1);

/// A status word returned by the firmware variable services.
///
/// Any value with the highest bit set is an error. The raw value is kept even
/// for codes unknown to this crate so that it can be reported as is.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(
    /// The raw status word.
    pub usize,
);

impl Status {
    /// The operation completed successfully.
    pub const SUCCESS: Status = Status(0);
    /// A parameter was incorrect.
    pub const INVALID_PARAMETER: Status = Status(HIGHEST_BIT_SET | 2);
    /// The operation is not supported.
    pub const UNSUPPORTED: Status = Status(HIGHEST_BIT_SET | 3);
    /// The buffer is not large enough to hold the requested data.
    pub const BUFFER_TOO_SMALL: Status = Status(HIGHEST_BIT_SET | 5);
    /// The physical device reported an error while attempting the operation.
    pub const DEVICE_ERROR: Status = Status(HIGHEST_BIT_SET | 7);
    /// The device cannot be written to.
    pub const WRITE_PROTECTED: Status = Status(HIGHEST_BIT_SET | 8);
    /// A resource has run out.
    pub const OUT_OF_RESOURCES: Status = Status(HIGHEST_BIT_SET | 9);
    /// The item was not found.
    pub const NOT_FOUND: Status = Status(HIGHEST_BIT_SET | 14);
    /// The function was not performed due to a security violation.
    pub const SECURITY_VIOLATION: Status = Status(HIGHEST_BIT_SET | 26);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::SUCCESS => "success",
            Status::INVALID_PARAMETER => "invalid parameter",
            Status::UNSUPPORTED => "unsupported",
            Status::BUFFER_TOO_SMALL => "buffer too small",
            Status::DEVICE_ERROR => "device error",
            Status::WRITE_PROTECTED => "write protected",
            Status::OUT_OF_RESOURCES => "out of resources",
            Status::NOT_FOUND => "not found",
            Status::SECURITY_VIOLATION => "security violation",
            _ => return None,
        })
    }
}

impl fmt::LowerHex for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({:#x})", self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (status={:#x})", name, self.0),
            None => write!(f, "status={:#x}", self.0),
        }
    }
}

impl std::error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        let raw = HIGHEST_BIT_SET | 14;
        assert_eq!(
            Status::NOT_FOUND.to_string(),
            format!("not found (status={:#x})", raw)
        );
        assert_eq!(Status(HIGHEST_BIT_SET | 100).to_string(), format!("status={:#x}", HIGHEST_BIT_SET | 100));
        assert_eq!(format!("{:x}", Status::SUCCESS), "0");
    }
}

//! Status codes and the object-model error type
//!
//! Success is exactly zero and every failure is negative, so callers that only
//! hold a raw code can use the sign as the fast check.

use crate::guid::Guid;
use std::fmt;

/// Raw status code crossing the object-model boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Status(i32);

impl Status {
    pub const OK: Status = Status(0);
    pub const GENERIC_ERROR: Status = Status(-1);
    pub const NO_INTERFACE: Status = Status(-2);
    pub const NOT_IMPLEMENTED: Status = Status(-3);
    pub const INVALID_ARGS: Status = Status(-4);
    pub const NOT_FOUND: Status = Status(-5);
    pub const WAIT_TIMEOUT: Status = Status(-6);
    pub const OBJECT_NOT_ALIVE: Status = Status(-7);

    #[inline]
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn succeeded(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub const fn failed(self) -> bool {
        self.0 < 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OK => "OK",
            Self::GENERIC_ERROR => "GENERIC_ERROR",
            Self::NO_INTERFACE => "NO_INTERFACE",
            Self::NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
            Self::INVALID_ARGS => "INVALID_ARGS",
            Self::NOT_FOUND => "NOT_FOUND",
            Self::WAIT_TIMEOUT => "WAIT_TIMEOUT",
            Self::OBJECT_NOT_ALIVE => "OBJECT_NOT_ALIVE",
            _ if self.succeeded() => "SUCCESS",
            _ => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::OK,
            Err(err) => err.status(),
        }
    }
}

/// Recoverable runtime failures of the object model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    Generic(String),
    NoInterface(Guid),
    NotImplemented(&'static str),
    InvalidArgs(String),
    NotAlive,
    NotFound(String),
    WaitTimeout,
    OutOfMemory { size: usize, align: usize },
}

impl ObjectError {
    pub fn status(&self) -> Status {
        match self {
            Self::Generic(_) | Self::OutOfMemory { .. } => Status::GENERIC_ERROR,
            Self::NoInterface(_) => Status::NO_INTERFACE,
            Self::NotImplemented(_) => Status::NOT_IMPLEMENTED,
            Self::InvalidArgs(_) => Status::INVALID_ARGS,
            Self::NotAlive => Status::OBJECT_NOT_ALIVE,
            Self::NotFound(_) => Status::NOT_FOUND,
            Self::WaitTimeout => Status::WAIT_TIMEOUT,
        }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(msg) => write!(f, "{}", msg),
            Self::NoInterface(iid) => write!(f, "Interface {} is not supported", iid),
            Self::NotImplemented(what) => write!(f, "Operation not implemented: {}", what),
            Self::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            Self::NotAlive => write!(f, "Object is not alive"),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::WaitTimeout => write!(f, "Wait timed out"),
            Self::OutOfMemory { size, align } => {
                write!(f, "Out of memory allocating {} bytes (align {})", size, align)
            }
        }
    }
}

impl std::error::Error for ObjectError {}

impl From<ObjectError> for Status {
    fn from(err: ObjectError) -> Self {
        err.status()
    }
}

pub type Result<T, E = ObjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_distinguishes_success() {
        assert!(Status::OK.succeeded());
        assert!(Status::from_raw(3).succeeded());
        for status in [
            Status::GENERIC_ERROR,
            Status::NO_INTERFACE,
            Status::NOT_IMPLEMENTED,
            Status::INVALID_ARGS,
            Status::NOT_FOUND,
            Status::WAIT_TIMEOUT,
            Status::OBJECT_NOT_ALIVE,
        ] {
            assert!(status.failed(), "{} should fail", status);
        }
    }

    #[test]
    fn codes_are_distinct() {
        let mut codes = vec![
            Status::GENERIC_ERROR.code(),
            Status::NO_INTERFACE.code(),
            Status::NOT_IMPLEMENTED.code(),
            Status::INVALID_ARGS.code(),
            Status::NOT_FOUND.code(),
            Status::WAIT_TIMEOUT.code(),
            Status::OBJECT_NOT_ALIVE.code(),
        ];
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 7);
    }

    #[test]
    fn errors_map_to_status() {
        assert_eq!(ObjectError::NoInterface(Guid::NULL).status(), Status::NO_INTERFACE);
        assert_eq!(ObjectError::NotAlive.status(), Status::OBJECT_NOT_ALIVE);
        assert_eq!(
            ObjectError::OutOfMemory { size: 8, align: 8 }.status(),
            Status::GENERIC_ERROR
        );
        let failed: Result<()> = Err(ObjectError::WaitTimeout);
        assert_eq!(Status::from(&failed), Status::WAIT_TIMEOUT);
        assert_eq!(Status::from(&Ok::<_, ObjectError>(1)), Status::OK);
    }

    #[test]
    fn display_names_the_code() {
        assert_eq!(Status::NO_INTERFACE.to_string(), "NO_INTERFACE (-2)");
        assert_eq!(Status::from_raw(-42).name(), "UNKNOWN_ERROR");
    }
}

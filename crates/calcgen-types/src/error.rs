use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Capacity,
    Expression,
    Memory,
    Session,
}

/// Numeric error code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Slot planning (E100–E199) ──
    pub const SLOT_EXHAUSTED: Self = Self(100);
    pub const FOREIGN_SLOT: Self = Self(101);
    pub const NOT_ALLOCATED: Self = Self(102);

    // ── Expressions (E200–E299) ──
    pub const DIVISION_BY_ZERO: Self = Self(200);

    // ── Variable & memory model (E300–E399) ──
    pub const NO_ADDRESS: Self = Self(300);
    pub const NO_VALUE: Self = Self(301);
    pub const CANNOT_DEREF: Self = Self(302);
    pub const UNKNOWN_MEMBER: Self = Self(303);
    pub const UNDERFLOW: Self = Self(304);

    // ── Session (E400–E499) ──
    pub const CONFIG: Self = Self(400);
    pub const IO: Self = Self(401);
    pub const RELEASE_FAILED: Self = Self(402);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Capacity,
            200..=299 => ErrorCategory::Expression,
            300..=399 => ErrorCategory::Memory,
            _ => ErrorCategory::Session,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity => write!(f, "capacity"),
            Self::Expression => write!(f, "expression"),
            Self::Memory => write!(f, "memory"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Errors raised while building and lowering a program.
///
/// Every variant points at a defect in the calling program; nothing is
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    /// The slot space has no free identifier left.
    #[error("{space} cannot find an available slot")]
    SlotExhausted { space: String },

    /// The identifier does not belong to the planner's space.
    #[error("{slot} is not in the space of {space}")]
    ForeignSlot { space: String, slot: String },

    /// The identifier is in the space but not currently allocated.
    #[error("{slot} is not allocated in {space}")]
    NotAllocated { space: String, slot: String },

    /// A literal zero divisor reached the simplifier.
    #[error("division by zero in `{0}`")]
    DivisionByZero(String),

    /// Write through a constant, raw text or another read-only handle.
    #[error("{0} has no address")]
    NoAddress(String),

    /// Read of a handle that has no scalar value form.
    #[error("{0} has no value")]
    NoValue(String),

    /// No reference layer left to pop.
    #[error("cannot dereference a value of reference type {0}")]
    CannotDeref(String),

    /// Struct member lookup by name failed.
    #[error("struct has no member `{0}`")]
    UnknownMember(String),

    /// `pop` on a vector whose head is already 0.
    #[error("pop on an empty vector")]
    Underflow,

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Writing the materialized program failed.
    #[error("i/o error: {0}")]
    Io(String),

    /// A release performed at scope exit failed.
    #[error("{count} scope-exit release(s) failed, first: {first}")]
    ReleaseFailed { count: usize, first: Box<GenError> },
}

impl GenError {
    /// The stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SlotExhausted { .. } => ErrorCode::SLOT_EXHAUSTED,
            Self::ForeignSlot { .. } => ErrorCode::FOREIGN_SLOT,
            Self::NotAllocated { .. } => ErrorCode::NOT_ALLOCATED,
            Self::DivisionByZero(_) => ErrorCode::DIVISION_BY_ZERO,
            Self::NoAddress(_) => ErrorCode::NO_ADDRESS,
            Self::NoValue(_) => ErrorCode::NO_VALUE,
            Self::CannotDeref(_) => ErrorCode::CANNOT_DEREF,
            Self::UnknownMember(_) => ErrorCode::UNKNOWN_MEMBER,
            Self::Underflow => ErrorCode::UNDERFLOW,
            Self::Config(_) => ErrorCode::CONFIG,
            Self::Io(_) => ErrorCode::IO,
            Self::ReleaseFailed { .. } => ErrorCode::RELEASE_FAILED,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }
}

impl From<std::io::Error> for GenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::SLOT_EXHAUSTED.category(), ErrorCategory::Capacity);
        assert_eq!(
            ErrorCode::DIVISION_BY_ZERO.category(),
            ErrorCategory::Expression
        );
        assert_eq!(ErrorCode::UNDERFLOW.category(), ErrorCategory::Memory);
        assert_eq!(ErrorCode::RELEASE_FAILED.category(), ErrorCategory::Session);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::FOREIGN_SLOT), "E101");
        assert_eq!(format!("{}", ErrorCode::CANNOT_DEREF), "E302");
    }

    #[test]
    fn test_error_messages() {
        let err = GenError::NotAllocated {
            space: "registers".into(),
            slot: "Q".into(),
        };
        assert_eq!(err.to_string(), "Q is not allocated in registers");
        assert_eq!(err.code(), ErrorCode::NOT_ALLOCATED);

        let err = GenError::DivisionByZero("A/0".into());
        assert_eq!(err.to_string(), "division by zero in `A/0`");
        assert_eq!(err.category(), ErrorCategory::Expression);
    }

    #[test]
    fn test_release_failed_reports_first() {
        let err = GenError::ReleaseFailed {
            count: 2,
            first: Box::new(GenError::SlotExhausted {
                space: "bank".into(),
            }),
        };
        assert!(err.to_string().starts_with("2 scope-exit release(s) failed"));
        assert!(err.to_string().contains("bank cannot find"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing dir");
        let err = GenError::from(io);
        assert_eq!(err.code(), ErrorCode::IO);
        assert!(err.to_string().contains("missing dir"));
    }
}

//! Shared types for calcgen.
//!
//! This crate defines the error type, the session configuration, the
//! reference-tag stack carried by slot-backed handles, and the fixed
//! tokens of the target dialect.

mod config;
mod error;
mod reftag;
pub mod tokens;

pub use config::{
    Dialect, GenConfig, LineSeparator, DEFAULT_BANK_SLOTS, DEFAULT_STRING_SLOTS,
};
pub use error::{ErrorCategory, ErrorCode, GenError};
pub use reftag::{RefTag, RefType};

/// Result type used throughout calcgen.
pub type GenResult<T> = std::result::Result<T, GenError>;

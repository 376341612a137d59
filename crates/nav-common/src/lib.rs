//! Common utilities shared by the record and archive crates

mod context;

pub use context::{BuildContext, MAX_MESSAGES, MESSAGE_POOL_SIZE};

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Absolute per-component tolerance used when merging near-duplicate vertices
pub const TOLERANCE: f32 = 1e-4;

/// Tests two values for equality within [`TOLERANCE`]
#[inline]
pub fn sloppy_eq(a: f32, b: f32) -> bool {
    !(b < a - TOLERANCE || b > a + TOLERANCE)
}

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("wrong magic value")]
    WrongMagic,

    #[error("wrong format version: expected {expected}, found {found}")]
    WrongVersion { expected: i32, found: i32 },

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("output capacity too small: {0}")]
    CapacityTooSmall(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

/// Result type for operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sloppy_eq_within_tolerance() {
        assert!(sloppy_eq(1.0, 1.0));
        assert!(sloppy_eq(1.0, 1.0 + TOLERANCE * 0.5));
        assert!(sloppy_eq(1.0, 1.0 - TOLERANCE * 0.5));
    }

    #[test]
    fn test_sloppy_eq_outside_tolerance() {
        assert!(!sloppy_eq(1.0, 1.0 + TOLERANCE * 2.0));
        assert!(!sloppy_eq(-1.0, 1.0));
    }
}

//! Error types for the doppio classfile library.
//!
//! The main type exported is the [`Error`] enum, which represents all hard failures that can
//! occur while reading, analyzing or assembling a class file. Recoverable analysis diagnostics
//! are collected separately by [`Verifier`](crate::Verifier) and only surface here as
//! [`Error::Verification`] when an assembly finishes with a non-empty log.

use crate::verify::VerifyError;
use std::num::TryFromIntError;

/// A specialized Result type for doppio classfile operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur when processing JVM class files.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A constant pool tag that is not defined by the class file format
    #[error("Unknown constant tag: {0}")]
    UnknownTag(u8),
    /// A constant pool tag that requires a newer class file version
    #[error("Constant tag {tag} requires class file version {major}.{minor} or later")]
    ConstantNotSupported { tag: u8, major: u16, minor: u16 },
    /// A buffer ended before the expected number of bytes could be read
    #[error("Short read: expected {expected} bytes")]
    IoShort { expected: usize },
    /// Invalid magic number when reading a class file
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),
    /// Invalid constant pool index
    #[error("Invalid constant pool index {0}")]
    InvalidConstantIndex(u16),
    /// An opcode that is not defined by the instruction set
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),
    /// An invalid opcode following a `wide` prefix
    #[error("Invalid wide opcode: {0}")]
    InvalidWideOpcode(u8),
    /// Invalid `newarray` type code
    #[error("Invalid array type code: {0}")]
    InvalidArrayTypeCode(u8),
    /// Invalid method handle reference kind
    #[error("Invalid reference kind: {0}")]
    InvalidReferenceKind(u8),
    /// Invalid stack map frame kind byte
    #[error("Invalid stack map frame kind: {0}")]
    InvalidStackFrameKind(u8),
    /// Invalid verification type tag in a stack map frame
    #[error("Invalid verification type tag: {0}")]
    InvalidVerificationTypeTag(u8),
    /// An error occurred while parsing a field or method descriptor
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// A graph operation referenced a block that does not exist
    #[error("Unknown block: {0}")]
    UnknownBlock(i32),
    /// Connecting an edge would exceed the parallel-edge limit for its kind
    #[error("Edge limit exceeded for block {0}")]
    EdgeLimitExceeded(i32),
    /// A branch displacement did not fit the width the instruction was encoded with
    #[error("Branch displacement {0} does not fit the encoded width")]
    BranchOutOfRange(i64),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Error when attempting to convert a numeric value to a different type
    #[error(transparent)]
    TryFromInt(#[from] TryFromIntError),
    /// The assembler finished with a non-empty verifier log
    #[error("Verification failed with {} error(s): {}", errors.len(), summary(errors))]
    Verification { errors: Vec<VerifyError> },
}

/// Convert [`std::io::Error`] to [`Error::Io`]
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

fn summary(errors: &[VerifyError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<empty>".to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::verify::{ErrorSource, VerifyError, VerifyErrorKind};

    #[test]
    fn test_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "unexpected eof");
        let error = Error::from(io_error);
        assert_eq!(error.to_string(), "IO error: unexpected eof");
    }

    #[test]
    fn test_verification_summary() {
        let error = Error::Verification {
            errors: vec![VerifyError::new(
                VerifyErrorKind::StackUnderflow,
                ErrorSource::Block(3),
                "popped from an empty stack",
            )],
        };
        assert_eq!(
            error.to_string(),
            "Verification failed with 1 error(s): stack underflow at block 3: popped from an empty stack"
        );
    }
}

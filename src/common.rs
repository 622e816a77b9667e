//! Types needed in multiple modules

use serde::{Deserialize, Serialize};

/// Enumeration of binary symbol values
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Hash, Deserialize, Serialize)]
pub enum Bit {
    /// Binary symbol `0`
    #[default]
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl Bit {
    /// Returns bit corresponding to the lowest bit of given integer.
    #[must_use]
    pub fn from_lsb(value: usize) -> Self {
        if value & 1 == 0 {
            Bit::Zero
        } else {
            Bit::One
        }
    }

    /// Returns bit as `0` or `1`.
    #[must_use]
    pub fn as_usize(self) -> usize {
        self as usize
    }
}

impl std::ops::BitXor for Bit {
    type Output = Bit;

    fn bitxor(self, rhs: Bit) -> Bit {
        Bit::from_lsb(self.as_usize() ^ rhs.as_usize())
    }
}

/// Custom error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad geometry or configuration (non-positive sizes, unsupported trellis, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Buffer size mismatch, or use of an uninitialized table
    #[error("Length error: {0}")]
    LengthError(String),
    /// Internal consistency check failed after an operation
    #[error("Runtime error: {0}")]
    Runtime(String),
    /// Capability not provided by a component
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
    /// File read/write error
    #[error("{0}")]
    FileReadWriteError(#[from] std::io::Error),
    /// Serde read/write error
    #[error("{0}")]
    SerdeReadWriteError(#[from] serde_json::Error),
}

/// Physical arrangement of the bits (or LLR values) of a codeword
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameLayout {
    /// All systematic values first, then each parity stream, then the tails
    #[default]
    Buffered,
    /// Systematic and parity values interleaved position by position, then the tails in pairs
    Standard,
}

/// Checks that a buffer has the expected length.
pub(crate) fn check_len(what: &str, found: usize, expected: usize) -> Result<(), Error> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::LengthError(format!(
            "Wrong length of {what} (expected {expected}, found {found})"
        )))
    }
}

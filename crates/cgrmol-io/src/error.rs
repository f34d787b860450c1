//! Error types for Molfile reading and writing
//!
//! Provides the error taxonomy shared by the V2000 and V3000 readers and the
//! V2000 writer.

use thiserror::Error;

/// Errors that can occur while reading or writing a Molfile block
#[derive(Error, Debug)]
pub enum MolError {
    /// Declared or observed atom count is zero
    #[error("Molecule without atoms")]
    EmptyMolecule,

    /// Malformed structure with location information
    #[error("Format error at line {line}: {message}")]
    Format {
        /// Line number fed to the reader (1-based, counts line included)
        line: usize,
        /// Error message
        message: String,
    },

    /// Draft requested before the terminator line was seen
    #[error("Molecule not complete")]
    Incomplete,

    /// Reader used after it has already completed
    #[error("Invalid usage: {0}")]
    Protocol(String),

    /// Non-numeric text in a numeric column or field
    #[error("Invalid number at line {line} in {field}: {value:?}")]
    InvalidNumber {
        /// Line number where the value was read
        line: usize,
        /// Column or field name
        field: &'static str,
        /// Offending text
        value: String,
    },

    /// Property anchor atom does not exist
    #[error("Atom index {index} is out of range (atoms: {atoms})")]
    AtomIndexOutOfRange {
        /// 1-based atom index referenced by a property
        index: usize,
        /// Number of atoms in the molecule
        atoms: usize,
    },

    /// Counts exceed the three-digit V2000 counts fields
    #[error("Molecule too large for V2000 ({atoms} atoms, {bonds} bonds)")]
    TooLarge {
        /// Number of atoms
        atoms: usize,
        /// Number of bonds
        bonds: usize,
    },

    /// Charge has no MDL charge code
    #[error("Charge {0} has no MDL code")]
    UnsupportedCharge(i32),

    /// Standard I/O error from the output sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MolError {
    /// Create a format error at a specific line
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        MolError::Format {
            line,
            message: message.into(),
        }
    }

    /// Create a protocol violation error
    pub fn protocol(message: impl Into<String>) -> Self {
        MolError::Protocol(message.into())
    }

    /// Create an invalid number error
    pub fn invalid_number(line: usize, field: &'static str, value: impl Into<String>) -> Self {
        MolError::InvalidNumber {
            line,
            field,
            value: value.into(),
        }
    }
}

/// Result type for Molfile operations
pub type MolResult<T> = Result<T, MolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = MolError::format(7, "invalid number of ATOM records");
        assert_eq!(
            err.to_string(),
            "Format error at line 7: invalid number of ATOM records"
        );
    }

    #[test]
    fn test_invalid_number_message() {
        let err = MolError::invalid_number(3, "x coordinate", "abc");
        assert_eq!(
            err.to_string(),
            "Invalid number at line 3 in x coordinate: \"abc\""
        );
    }
}

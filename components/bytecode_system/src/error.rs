//! Errors produced while reading or building programs

use thiserror::Error;

/// Errors that can occur while decoding a program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Reading past the end of the code buffer
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Opcode value not present in the instruction set
    #[error("Unknown opcode {code:#06x} at offset {offset}")]
    UnknownOpcode {
        /// Raw opcode value
        code: u16,
        /// Offset of the opcode
        offset: usize,
    },

    /// String operand pointing outside the constant pool
    #[error("Constant index {index} out of range at offset {offset}")]
    BadConstant {
        /// Index read from the code buffer
        index: u64,
        /// Offset of the operand
        offset: usize,
    },

    /// File does not start with the program magic
    #[error("Invalid magic number")]
    BadMagic,

    /// File written by an incompatible encoder
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Invalid UTF-8 in the serialized form
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Bytes left over after the code section
    #[error("Trailing data at offset {0}")]
    TrailingData(usize),
}

/// Errors reported by [`ProgramBuilder::build`](crate::ProgramBuilder::build)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A jump refers to a label that was never bound
    #[error("Label {0} was used but never bound")]
    UnboundLabel(usize),

    /// A section does not fit the 32-bit length prefix of the file format
    #[error("{section} too large to serialize ({len} entries)")]
    TooLarge {
        /// Section that overflowed
        section: &'static str,
        /// Its length
        len: usize,
    },
}

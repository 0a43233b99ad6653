//! Decoder error type
//!
//! A no_std compatible error carrying the offending opcode word, so a
//! caller can report exactly what it tried to decode.

use core::fmt;

/// Why a word failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The word does not belong to any of the three instruction formats
    UnknownFormat,
    /// The word selects a reserved single-operand opcode (9-bit opcode 0x27)
    ReservedOpcode,
    /// A byte-sized operation was requested for a word-only instruction
    /// (SWPB, SXT, CALL)
    ByteModeUnsupported,
    /// A read-modify-write instruction was given an immediate or
    /// constant-generator operand, which has no location to store to
    UnwritableOperand,
}

/// Decode failure - carries the original 16-bit word for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    /// The opcode word that failed to decode
    pub word: u16,
    /// Classification of the failure
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    /// Create a new decode error
    pub const fn new(word: u16, kind: DecodeErrorKind) -> Self {
        Self { word, kind }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DecodeErrorKind::UnknownFormat => {
                write!(f, "word {:#06x} matches no instruction format", self.word)
            }
            DecodeErrorKind::ReservedOpcode => {
                write!(f, "word {:#06x} selects a reserved opcode", self.word)
            }
            DecodeErrorKind::ByteModeUnsupported => {
                write!(
                    f,
                    "word {:#06x} requests byte mode on a word-only instruction",
                    self.word
                )
            }
            DecodeErrorKind::UnwritableOperand => {
                write!(
                    f,
                    "word {:#06x} modifies an operand that has no storage location",
                    self.word
                )
            }
        }
    }
}

impl core::error::Error for DecodeError {}

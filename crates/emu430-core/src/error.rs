//! Error types for emu430-core
//!
//! The taxonomy is closed: everything `step()` can fail with is one of
//! these variants. Component refusals (a protected information segment, a
//! locked FRAM controller) are deliberately *not* errors - they surface
//! as `false` returns at the component boundary and a warning log line.

use thiserror::Error;

use crate::memory::{AccessKind, ViolationReason};
use emu430_isa::DecodeError;

/// Core emulator error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The decoder rejected an opcode word; carries the original word
    #[error("invalid instruction: {0}")]
    InvalidInstruction(#[from] DecodeError),

    /// An access hit an unmapped address or a region that does not grant
    /// the required permission
    #[error("access violation at {addr:#06x} during {kind}: {reason}")]
    AccessViolation {
        /// Faulting address
        addr: u16,
        /// What the access was trying to do
        kind: AccessKind,
        /// Why it was rejected
        reason: ViolationReason,
    },

    /// Word access to an odd address
    #[error("unaligned word access at {addr:#06x}")]
    UnalignedAccess {
        /// Faulting address
        addr: u16,
    },

    /// Register index outside 0..=15
    #[error("register index {0} out of range")]
    InvalidRegister(u8),
}

/// Result type alias using the core error
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_address() {
        let err = Error::UnalignedAccess { addr: 0x2001 };
        assert_eq!(format!("{}", err), "unaligned word access at 0x2001");
    }

    #[test]
    fn test_decode_error_converts() {
        let decode_err = DecodeError::new(0x0042, emu430_isa::DecodeErrorKind::UnknownFormat);
        let err: Error = decode_err.into();
        assert!(matches!(err, Error::InvalidInstruction(e) if e.word == 0x0042));
    }
}

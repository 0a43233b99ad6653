//! Bus access context and event subscription
//!
//! The memory controller notifies subscribers after it commits an access.
//! Subscribers receive a shared view only; they cannot mutate core state
//! from inside a notification, which keeps the no-partial-state rule
//! intact.

use core::fmt;

/// What an access was trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Data read
    Read,
    /// Data write
    Write,
    /// Instruction fetch
    Execute,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Execute => f.write_str("execute"),
        }
    }
}

/// Access width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    /// 8-bit access
    Byte,
    /// 16-bit access, little-endian, even addresses only
    Word,
}

impl AccessWidth {
    /// Width in bytes
    pub const fn bytes(&self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }
}

/// Why an access was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// No region contains the address
    Unmapped,
    /// The containing region does not grant the required permission
    PermissionDenied,
    /// Word access to an odd address
    Unaligned,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped => f.write_str("address is not mapped"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::Unaligned => f.write_str("unaligned access"),
        }
    }
}

/// Context describing one bus access.
///
/// `op_id` increments once per controller-level operation (a word access
/// is one operation even though it touches two bytes), so subscribers can
/// correlate events with the access stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    /// Target address
    pub addr: u16,
    /// Read, write or fetch
    pub kind: AccessKind,
    /// Byte or word
    pub width: AccessWidth,
    /// Monotonic operation id
    pub op_id: u64,
}

/// Subscriber interface for bus events.
///
/// Both notifications fire *after* the access has committed (or has been
/// definitively rejected). Default implementations ignore the event, so
/// implementors override only what they observe.
pub trait BusObserver {
    /// A read, write or fetch completed with `value`
    fn memory_accessed(&mut self, ctx: &AccessContext, value: u16) {
        let _ = (ctx, value);
    }

    /// An access was rejected
    fn access_violation(&mut self, ctx: &AccessContext, reason: ViolationReason) {
        let _ = (ctx, reason);
    }
}

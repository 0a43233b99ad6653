//! Typed decoded instructions and addressing modes
//!
//! A decoded instruction keeps the original opcode word for diagnostics
//! and can re-encode itself from its fields, so decode/encode round-trips
//! are testable without an assembler.

use crate::opcode::{Condition, OpcodeI, OpcodeII};
use crate::{REG_CG2, REG_PC, REG_SR};

/// Operand addressing mode, resolved from the (register, As/Ad) pair.
///
/// The constant generators are carried as `Constant` with the generated
/// literal: they behave as immediates but consume no extension word and
/// cost register-source cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Operand is the register content itself
    Register,
    /// Operand is memory at register + extension-word offset
    Indexed,
    /// Operand is memory at the register content
    Indirect,
    /// As `Indirect`, then the register advances by the operand width
    IndirectAutoIncrement,
    /// Operand is the extension-word literal (`@PC+` encoding)
    Immediate,
    /// Operand is a generated constant; no extension word is consumed
    Constant(u16),
    /// Operand is memory at the extension-word address (`&ADDR`)
    Absolute,
    /// Operand is memory at extension-word offset relative to the address
    /// the extension word was fetched from (`ADDR`, PC-relative)
    Symbolic,
    /// Placeholder for an unresolvable mode
    Invalid,
}

impl AddressingMode {
    /// Whether resolving this mode consumes one extension word
    pub const fn uses_extension_word(&self) -> bool {
        matches!(
            self,
            Self::Indexed | Self::Immediate | Self::Absolute | Self::Symbolic
        )
    }
}

/// Compute the As field bits for a (register, source mode) pair.
///
/// This is the inverse of source-mode resolution, including the constant
/// generator encodings on R2 and R3.
pub(crate) fn source_as_bits(reg: u8, mode: AddressingMode) -> u8 {
    match mode {
        AddressingMode::Register => 0b00,
        AddressingMode::Indexed | AddressingMode::Symbolic | AddressingMode::Absolute => 0b01,
        AddressingMode::Indirect => 0b10,
        AddressingMode::IndirectAutoIncrement | AddressingMode::Immediate => 0b11,
        AddressingMode::Constant(value) => match (reg, value) {
            (REG_CG2, 0) => 0b00,
            (REG_CG2, 1) => 0b01,
            (REG_CG2, 2) => 0b10,
            (REG_CG2, 0xFFFF) => 0b11,
            (REG_SR, 4) => 0b10,
            (REG_SR, 8) => 0b11,
            // Unreachable for decoder-produced instructions
            _ => 0b00,
        },
        AddressingMode::Invalid => 0b00,
    }
}

/// Double-operand instruction (Format I)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatI {
    /// Operation
    pub opcode: OpcodeI,
    /// Source register (0..=15)
    pub src_reg: u8,
    /// Source addressing mode
    pub src_mode: AddressingMode,
    /// Destination register (0..=15)
    pub dst_reg: u8,
    /// Destination addressing mode (register, indexed, absolute, symbolic)
    pub dst_mode: AddressingMode,
    /// Byte-wide operation (`.B` suffix)
    pub byte_op: bool,
    /// Original opcode word
    pub word: u16,
}

impl FormatI {
    /// Number of extension words the source operand consumes (0 or 1)
    pub const fn src_extension_words(&self) -> u16 {
        self.src_mode.uses_extension_word() as u16
    }

    /// Number of extension words the destination operand consumes (0 or 1)
    pub const fn dst_extension_words(&self) -> u16 {
        self.dst_mode.uses_extension_word() as u16
    }

    /// Rebuild the opcode word from the decoded fields
    pub fn encode(&self) -> u16 {
        let ad = self.dst_mode.uses_extension_word() as u16;
        (self.opcode.nibble() as u16) << 12
            | (self.src_reg as u16) << 8
            | ad << 7
            | (self.byte_op as u16) << 6
            | (source_as_bits(self.src_reg, self.src_mode) as u16) << 4
            | self.dst_reg as u16
    }
}

/// Single-operand instruction (Format II)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatII {
    /// Operation
    pub opcode: OpcodeII,
    /// Operand register (0..=15)
    pub src_reg: u8,
    /// Operand addressing mode
    pub src_mode: AddressingMode,
    /// Byte-wide operation (`.B` suffix)
    pub byte_op: bool,
    /// Original opcode word
    pub word: u16,
}

impl FormatII {
    /// Rebuild the opcode word from the decoded fields
    pub fn encode(&self) -> u16 {
        self.opcode.bits() << 7
            | (self.byte_op as u16) << 6
            | (source_as_bits(self.src_reg, self.src_mode) as u16) << 4
            | self.src_reg as u16
    }
}

/// Relative jump (Format III)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatIII {
    /// Jump condition
    pub condition: Condition,
    /// Signed offset in words, -512..=511
    pub offset: i16,
    /// Original opcode word
    pub word: u16,
}

impl FormatIII {
    /// Rebuild the opcode word from the decoded fields
    pub fn encode(&self) -> u16 {
        0b001 << 13 | (self.condition.bits() as u16) << 10 | (self.offset as u16 & 0x03FF)
    }

    /// Byte displacement added to PC when the jump is taken
    pub const fn byte_displacement(&self) -> i32 {
        self.offset as i32 * 2
    }
}

/// A decoded MSP430 instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Double-operand instruction
    FormatI(FormatI),
    /// Single-operand instruction
    FormatII(FormatII),
    /// Relative jump
    FormatIII(FormatIII),
}

impl Instruction {
    /// The original 16-bit opcode word
    pub const fn word(&self) -> u16 {
        match self {
            Self::FormatI(op) => op.word,
            Self::FormatII(op) => op.word,
            Self::FormatIII(op) => op.word,
        }
    }

    /// Total number of extension words this instruction consumes (0..=2).
    /// Constant-generator operands consume none; source and destination
    /// count independently.
    pub const fn extension_word_count(&self) -> u16 {
        match self {
            Self::FormatI(op) => op.src_extension_words() + op.dst_extension_words(),
            Self::FormatII(op) => op.src_mode.uses_extension_word() as u16,
            Self::FormatIII(_) => 0,
        }
    }

    /// Rebuild the opcode word from the decoded fields
    pub fn encode(&self) -> u16 {
        match self {
            Self::FormatI(op) => op.encode(),
            Self::FormatII(op) => op.encode(),
            Self::FormatIII(op) => op.encode(),
        }
    }
}

/// Render a register number the way TI assemblers spell it
pub(crate) const fn register_name(reg: u8) -> &'static str {
    match reg {
        REG_PC => "PC",
        1 => "SP",
        REG_SR => "SR",
        REG_CG2 => "R3",
        4 => "R4",
        5 => "R5",
        6 => "R6",
        7 => "R7",
        8 => "R8",
        9 => "R9",
        10 => "R10",
        11 => "R11",
        12 => "R12",
        13 => "R13",
        14 => "R14",
        _ => "R15",
    }
}

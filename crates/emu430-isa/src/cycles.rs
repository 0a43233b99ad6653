//! Instruction cycle costs (SLAU445I Table 4-10)
//!
//! Costs depend only on the addressing-mode combination, whether the
//! destination is the PC, and the MOV/BIT/CMP store reduction. Constant
//! generator sources price as register sources.

use crate::instruction::{AddressingMode, FormatI, FormatII, FormatIII};
use crate::opcode::OpcodeII;
use crate::REG_PC;

/// Cycle cost of any relative jump, taken or not
pub const JUMP_CYCLES: u32 = 2;

/// Source operand pricing class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SrcClass {
    /// Register content or generated constant
    Register,
    /// `@Rn`
    Indirect,
    /// `@Rn+`
    AutoIncrement,
    /// `#N` from the extension word
    Immediate,
    /// `x(Rn)`, `ADDR` and `&ADDR` - one extra memory read to index
    Indexed,
}

/// Destination operand pricing class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DstClass {
    Register,
    ProgramCounter,
    Memory,
}

fn src_class(mode: AddressingMode) -> SrcClass {
    match mode {
        AddressingMode::Register | AddressingMode::Constant(_) => SrcClass::Register,
        AddressingMode::Indirect => SrcClass::Indirect,
        AddressingMode::IndirectAutoIncrement => SrcClass::AutoIncrement,
        AddressingMode::Immediate => SrcClass::Immediate,
        AddressingMode::Indexed
        | AddressingMode::Absolute
        | AddressingMode::Symbolic
        | AddressingMode::Invalid => SrcClass::Indexed,
    }
}

fn dst_class(mode: AddressingMode, dst_reg: u8) -> DstClass {
    match mode {
        AddressingMode::Register if dst_reg == REG_PC => DstClass::ProgramCounter,
        AddressingMode::Register => DstClass::Register,
        _ => DstClass::Memory,
    }
}

/// Cycle cost of a double-operand instruction.
///
/// MOV, BIT and CMP skip the read-modify-write store and cost one cycle
/// less than the base combination when the destination is in memory.
pub fn format_i_cycles(op: &FormatI) -> u32 {
    let base = match (src_class(op.src_mode), dst_class(op.dst_mode, op.dst_reg)) {
        (SrcClass::Register, DstClass::Register) => 1,
        (SrcClass::Register, DstClass::ProgramCounter) => 3,
        (SrcClass::Register, DstClass::Memory) => 4,

        (SrcClass::Indirect, DstClass::Register) => 2,
        (SrcClass::Indirect, DstClass::ProgramCounter) => 4,
        (SrcClass::Indirect, DstClass::Memory) => 5,

        (SrcClass::AutoIncrement, DstClass::Register) => 2,
        (SrcClass::AutoIncrement, DstClass::ProgramCounter) => 4,
        (SrcClass::AutoIncrement, DstClass::Memory) => 5,

        (SrcClass::Immediate, DstClass::Register) => 2,
        (SrcClass::Immediate, DstClass::ProgramCounter) => 3,
        (SrcClass::Immediate, DstClass::Memory) => 5,

        (SrcClass::Indexed, DstClass::Register) => 3,
        (SrcClass::Indexed, DstClass::ProgramCounter) => 5,
        (SrcClass::Indexed, DstClass::Memory) => 6,
    };

    if op.opcode.reduced_store_cost() && dst_class(op.dst_mode, op.dst_reg) == DstClass::Memory {
        base - 1
    } else {
        base
    }
}

/// Cycle cost of a single-operand instruction
pub fn format_ii_cycles(op: &FormatII) -> u32 {
    if op.opcode == OpcodeII::Reti {
        return 5;
    }
    match src_class(op.src_mode) {
        SrcClass::Register => 1,
        _ => 3,
    }
}

/// Cycle cost of a jump. Always two, taken or not.
pub const fn format_iii_cycles(_op: &FormatIII) -> u32 {
    JUMP_CYCLES
}

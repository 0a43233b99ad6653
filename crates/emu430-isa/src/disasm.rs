//! Instruction rendering
//!
//! Renders decoded instructions in TI assembler spelling, naming the
//! emulated forms (NOP, RET, POP, BR, CLR, INC, TST, SETC, ...) where the
//! encoding matches one. Emulated instructions are pure encodings of the
//! core set, so this is the only place they exist.
//!
//! Rendering goes through `core::fmt` so the crate stays allocation-free.

use core::fmt;

use crate::instruction::{register_name, AddressingMode, FormatI, FormatII, FormatIII, Instruction};
use crate::opcode::{OpcodeI, OpcodeII};
use crate::{REG_PC, REG_SP, REG_SR};

/// Render an instruction together with its extension words.
///
/// `extensions` holds the words that followed the opcode word in program
/// order (source first, then destination). Missing words render as zero
/// offsets rather than failing, so partial traces stay printable.
pub fn disassemble<'a>(instr: &'a Instruction, extensions: &'a [u16]) -> Disassembly<'a> {
    Disassembly { instr, extensions }
}

/// Display adapter returned by [`disassemble`]
#[derive(Debug, Clone, Copy)]
pub struct Disassembly<'a> {
    instr: &'a Instruction,
    extensions: &'a [u16],
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instr {
            Instruction::FormatI(op) => self.fmt_double(op, f),
            Instruction::FormatII(op) => self.fmt_single(op, f),
            Instruction::FormatIII(op) => fmt_jump(op, f),
        }
    }
}

impl Disassembly<'_> {
    fn src_ext(&self, op: &FormatI) -> Option<u16> {
        if op.src_mode.uses_extension_word() {
            self.extensions.first().copied()
        } else {
            None
        }
    }

    fn dst_ext(&self, op: &FormatI) -> Option<u16> {
        if op.dst_mode.uses_extension_word() {
            self.extensions
                .get(op.src_extension_words() as usize)
                .copied()
        } else {
            None
        }
    }

    fn fmt_double(&self, op: &FormatI, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if op.byte_op { ".B" } else { "" };

        if let Some(alias) = zero_operand_alias(op) {
            return f.write_str(alias);
        }
        if let Some(alias) = single_operand_alias(op) {
            write!(f, "{}{} ", alias, suffix)?;
            // BR is spelled with its source; every other alias keeps the
            // destination operand
            return if alias == "BR" {
                write_operand(f, op.src_reg, op.src_mode, self.src_ext(op))
            } else {
                write_operand(f, op.dst_reg, op.dst_mode, self.dst_ext(op))
            };
        }

        write!(f, "{}{} ", op.opcode.mnemonic(), suffix)?;
        write_operand(f, op.src_reg, op.src_mode, self.src_ext(op))?;
        f.write_str(", ")?;
        write_operand(f, op.dst_reg, op.dst_mode, self.dst_ext(op))
    }

    fn fmt_single(&self, op: &FormatII, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if op.opcode == OpcodeII::Reti {
            return f.write_str("RETI");
        }
        let suffix = if op.byte_op { ".B" } else { "" };
        write!(f, "{}{} ", op.opcode.mnemonic(), suffix)?;
        let ext = if op.src_mode.uses_extension_word() {
            self.extensions.first().copied()
        } else {
            None
        };
        write_operand(f, op.src_reg, op.src_mode, ext)
    }
}

/// Aliases that swallow both operands
fn zero_operand_alias(op: &FormatI) -> Option<&'static str> {
    let dst_is_reg = op.dst_mode == AddressingMode::Register;
    match (op.opcode, op.src_mode) {
        (OpcodeI::Mov, AddressingMode::Constant(0)) if dst_is_reg && op.dst_reg == 3 => Some("NOP"),
        (OpcodeI::Mov, AddressingMode::IndirectAutoIncrement)
            if op.src_reg == REG_SP && dst_is_reg && op.dst_reg == REG_PC =>
        {
            Some("RET")
        }
        (OpcodeI::Bis, AddressingMode::Constant(c)) if dst_is_reg && op.dst_reg == REG_SR => {
            match c {
                1 => Some("SETC"),
                2 => Some("SETZ"),
                4 => Some("SETN"),
                8 => Some("EINT"),
                _ => None,
            }
        }
        (OpcodeI::Bic, AddressingMode::Constant(c)) if dst_is_reg && op.dst_reg == REG_SR => {
            match c {
                1 => Some("CLRC"),
                2 => Some("CLRZ"),
                4 => Some("CLRN"),
                8 => Some("DINT"),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Aliases that keep the destination operand
fn single_operand_alias(op: &FormatI) -> Option<&'static str> {
    match (op.opcode, op.src_mode) {
        (OpcodeI::Mov, AddressingMode::IndirectAutoIncrement) if op.src_reg == REG_SP => {
            Some("POP")
        }
        (OpcodeI::Mov, _)
            if op.dst_mode == AddressingMode::Register && op.dst_reg == REG_PC =>
        {
            Some("BR")
        }
        (OpcodeI::Mov, AddressingMode::Constant(0)) => Some("CLR"),
        (OpcodeI::Add, AddressingMode::Constant(1)) => Some("INC"),
        (OpcodeI::Add, AddressingMode::Constant(2)) => Some("INCD"),
        (OpcodeI::Sub, AddressingMode::Constant(1)) => Some("DEC"),
        (OpcodeI::Sub, AddressingMode::Constant(2)) => Some("DECD"),
        (OpcodeI::Addc, AddressingMode::Constant(0)) => Some("ADC"),
        (OpcodeI::Subc, AddressingMode::Constant(0)) => Some("SBC"),
        (OpcodeI::Dadd, AddressingMode::Constant(0)) => Some("DADC"),
        (OpcodeI::Cmp, AddressingMode::Constant(0)) => Some("TST"),
        (OpcodeI::Add, AddressingMode::Register)
            if op.dst_mode == AddressingMode::Register && op.src_reg == op.dst_reg =>
        {
            Some("RLA")
        }
        (OpcodeI::Addc, AddressingMode::Register)
            if op.dst_mode == AddressingMode::Register && op.src_reg == op.dst_reg =>
        {
            Some("RLC")
        }
        _ => None,
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    reg: u8,
    mode: AddressingMode,
    ext: Option<u16>,
) -> fmt::Result {
    match mode {
        AddressingMode::Register => f.write_str(register_name(reg)),
        AddressingMode::Indexed => {
            write!(f, "{}({})", ext.unwrap_or(0) as i16, register_name(reg))
        }
        AddressingMode::Indirect => write!(f, "@{}", register_name(reg)),
        AddressingMode::IndirectAutoIncrement => write!(f, "@{}+", register_name(reg)),
        AddressingMode::Immediate => write!(f, "#{:#06x}", ext.unwrap_or(0)),
        AddressingMode::Constant(value) => write!(f, "#{}", value as i16),
        AddressingMode::Absolute => write!(f, "&{:#06x}", ext.unwrap_or(0)),
        AddressingMode::Symbolic => write!(f, "{}(PC)", ext.unwrap_or(0) as i16),
        AddressingMode::Invalid => f.write_str("?"),
    }
}

fn fmt_jump(op: &FormatIII, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Displacement relative to the instruction's own address
    let disp = 2 + op.byte_displacement();
    if disp >= 0 {
        write!(f, "{} $+{}", op.condition.mnemonic(), disp)
    } else {
        write!(f, "{} $-{}", op.condition.mnemonic(), -disp)
    }
}

//! Opcode word classification and addressing-mode resolution
//!
//! Decoding is pure: it looks at one 16-bit word and produces a typed
//! instruction plus the number of extension words the execution engine
//! must fetch. Extension words themselves are not consumed here.
//!
//! Classification order, per the ISA encoding:
//! 1. bits 15:13 = 001        -> Format III (relative jump)
//! 2. opcode byte 0x10..=0x13 -> Format II (single operand)
//! 3. top nibble 0x4..=0xF    -> Format I (double operand)
//! 4. anything else           -> invalid

use crate::error::{DecodeError, DecodeErrorKind};
use crate::instruction::{AddressingMode, FormatI, FormatII, FormatIII, Instruction};
use crate::opcode::{Condition, OpcodeI, OpcodeII};
use crate::{REG_CG2, REG_PC, REG_SR};

/// Decode a 16-bit opcode word into a typed instruction.
///
/// Fails with [`DecodeError`] carrying the original word when the word
/// matches no format, selects a reserved opcode, or requests byte mode on
/// a word-only operation.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    if word >> 13 == 0b001 {
        decode_jump(word)
    } else if (0x10..=0x13).contains(&(word >> 8)) {
        decode_single_operand(word)
    } else if word >> 12 >= 0x4 {
        decode_double_operand(word)
    } else {
        Err(DecodeError::new(word, DecodeErrorKind::UnknownFormat))
    }
}

/// Resolve a source addressing mode from the register number and As bits.
///
/// R2 and R3 double as constant generators: the encodings that would be
/// redundant on those registers produce the constants 0, +1, +2, +4, +8
/// and -1 instead, without consuming an extension word.
pub fn source_mode(reg: u8, as_bits: u8) -> AddressingMode {
    match (as_bits, reg) {
        (0b00, REG_CG2) => AddressingMode::Constant(0),
        (0b00, _) => AddressingMode::Register,
        (0b01, REG_PC) => AddressingMode::Symbolic,
        (0b01, REG_SR) => AddressingMode::Absolute,
        (0b01, REG_CG2) => AddressingMode::Constant(1),
        (0b01, _) => AddressingMode::Indexed,
        (0b10, REG_SR) => AddressingMode::Constant(4),
        (0b10, REG_CG2) => AddressingMode::Constant(2),
        (0b10, _) => AddressingMode::Indirect,
        (0b11, REG_PC) => AddressingMode::Immediate,
        (0b11, REG_SR) => AddressingMode::Constant(8),
        (0b11, REG_CG2) => AddressingMode::Constant(0xFFFF),
        (0b11, _) => AddressingMode::IndirectAutoIncrement,
        // As is a two-bit field
        _ => AddressingMode::Invalid,
    }
}

/// Resolve a destination addressing mode from the register number and the
/// Ad bit. Destinations never use the constant generators.
pub fn destination_mode(reg: u8, ad_bit: u8) -> AddressingMode {
    if ad_bit == 0 {
        AddressingMode::Register
    } else {
        match reg {
            REG_PC => AddressingMode::Symbolic,
            REG_SR => AddressingMode::Absolute,
            _ => AddressingMode::Indexed,
        }
    }
}

fn decode_double_operand(word: u16) -> Result<Instruction, DecodeError> {
    let opcode = match OpcodeI::from_nibble((word >> 12) as u8) {
        Some(op) => op,
        None => return Err(DecodeError::new(word, DecodeErrorKind::UnknownFormat)),
    };
    let src_reg = ((word >> 8) & 0xF) as u8;
    let ad_bit = ((word >> 7) & 0x1) as u8;
    let byte_op = word & (1 << 6) != 0;
    let as_bits = ((word >> 4) & 0x3) as u8;
    let dst_reg = (word & 0xF) as u8;

    Ok(Instruction::FormatI(FormatI {
        opcode,
        src_reg,
        src_mode: source_mode(src_reg, as_bits),
        dst_reg,
        dst_mode: destination_mode(dst_reg, ad_bit),
        byte_op,
        word,
    }))
}

fn decode_single_operand(word: u16) -> Result<Instruction, DecodeError> {
    let opcode = match OpcodeII::from_bits(word >> 7) {
        Some(op) => op,
        None => return Err(DecodeError::new(word, DecodeErrorKind::ReservedOpcode)),
    };
    let byte_op = word & (1 << 6) != 0;
    if byte_op && !opcode.supports_byte() {
        return Err(DecodeError::new(word, DecodeErrorKind::ByteModeUnsupported));
    }
    let as_bits = ((word >> 4) & 0x3) as u8;
    let src_reg = (word & 0xF) as u8;
    let src_mode = source_mode(src_reg, as_bits);

    // The rotate and extend group stores over its operand, so literal
    // operands have nowhere to go
    if opcode.writes_result()
        && matches!(
            src_mode,
            AddressingMode::Immediate | AddressingMode::Constant(_)
        )
    {
        return Err(DecodeError::new(word, DecodeErrorKind::UnwritableOperand));
    }

    Ok(Instruction::FormatII(FormatII {
        opcode,
        src_reg,
        src_mode,
        byte_op,
        word,
    }))
}

fn decode_jump(word: u16) -> Result<Instruction, DecodeError> {
    // from_bits cannot fail on a three-bit field
    let condition = match Condition::from_bits(((word >> 10) & 0x7) as u8) {
        Some(c) => c,
        None => return Err(DecodeError::new(word, DecodeErrorKind::UnknownFormat)),
    };
    // Sign-extend the 10-bit word offset
    let raw = word & 0x03FF;
    let offset = if raw & 0x0200 != 0 {
        (raw | 0xFC00) as i16
    } else {
        raw as i16
    };

    Ok(Instruction::FormatIII(FormatIII {
        condition,
        offset,
        word,
    }))
}

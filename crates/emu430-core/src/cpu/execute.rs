//! Instruction execution
//!
//! One dispatcher executes every decoded instruction against the register
//! file and the memory controller. The order of effects is fixed:
//! extension words are fetched first (advancing PC), then the source
//! operand is read (committing any auto-increment), then the destination
//! is resolved, the operation applied, the result written back and the
//! flags updated. An error anywhere leaves everything already committed
//! in place - there is no rollback.

use emu430_isa::cycles;
use emu430_isa::{AddressingMode, FormatI, FormatII, FormatIII, Instruction, OpcodeI, OpcodeII};

use super::alu;
use crate::error::Result;
use crate::memory::MemoryController;
use crate::registers::{RegisterFile, SR};

/// A writable operand location
#[derive(Debug, Clone, Copy)]
enum Place {
    Reg(u8),
    Mem(u16),
}

/// A resolved source operand: its value, and where to store back over it
/// when the instruction is a read-modify-write
struct Operand {
    value: u16,
    place: Option<Place>,
}

/// Execute one decoded instruction, returning its cycle cost
pub(crate) fn execute(
    regs: &mut RegisterFile,
    mem: &mut MemoryController,
    instr: &Instruction,
) -> Result<u32> {
    match instr {
        Instruction::FormatI(op) => execute_double(regs, mem, op),
        Instruction::FormatII(op) => execute_single(regs, mem, op),
        Instruction::FormatIII(op) => Ok(execute_jump(regs, op)),
    }
}

/// Fetch one extension word at PC and advance past it. Returns the word
/// and the address it was fetched from (the anchor for symbolic mode).
fn fetch_extension(regs: &mut RegisterFile, mem: &mut MemoryController) -> Result<(u16, u16)> {
    let addr = regs.pc();
    let word = mem.fetch_instruction(addr)?;
    regs.advance_pc(2);
    Ok((word, addr))
}

fn read_place(
    regs: &RegisterFile,
    mem: &mut MemoryController,
    place: Place,
    byte: bool,
) -> Result<u16> {
    match place {
        Place::Reg(reg) => {
            if byte {
                Ok(regs.read_low_byte(reg)? as u16)
            } else {
                regs.read(reg)
            }
        }
        Place::Mem(addr) => {
            if byte {
                Ok(mem.read_byte(addr)? as u16)
            } else {
                mem.read_word(addr)
            }
        }
    }
}

/// Store a result. Byte stores into a register preserve the high byte;
/// component refusals (a locked FRAM array, a protected segment) drop the
/// store silently, matching the bus contract.
fn write_place(
    regs: &mut RegisterFile,
    mem: &mut MemoryController,
    place: Place,
    value: u16,
    byte: bool,
) -> Result<()> {
    match place {
        Place::Reg(reg) => {
            if byte {
                regs.write_low_byte(reg, value as u8)
            } else {
                regs.write(reg, value)
            }
        }
        Place::Mem(addr) => {
            if byte {
                mem.write_byte(addr, value as u8)?;
            } else {
                mem.write_word(addr, value)?;
            }
            Ok(())
        }
    }
}

/// Read a source operand, committing auto-increment as a side effect.
/// `ext` is the (word, fetched-from address) pair when the mode takes an
/// extension word.
fn resolve_source(
    regs: &mut RegisterFile,
    mem: &mut MemoryController,
    reg: u8,
    mode: AddressingMode,
    byte: bool,
    ext: Option<(u16, u16)>,
) -> Result<Operand> {
    let width = if byte { 1u16 } else { 2u16 };
    match mode {
        AddressingMode::Register => Ok(Operand {
            value: read_place(regs, mem, Place::Reg(reg), byte)?,
            place: Some(Place::Reg(reg)),
        }),
        AddressingMode::Constant(value) => Ok(Operand {
            value: if byte { value & 0xFF } else { value },
            place: None,
        }),
        AddressingMode::Immediate => {
            let (word, _) = ext.expect("immediate mode always has an extension word");
            Ok(Operand {
                value: if byte { word & 0xFF } else { word },
                place: None,
            })
        }
        AddressingMode::Indexed => {
            let (offset, _) = ext.expect("indexed mode always has an extension word");
            let addr = regs.read(reg)?.wrapping_add(offset);
            Ok(Operand {
                value: read_place(regs, mem, Place::Mem(addr), byte)?,
                place: Some(Place::Mem(addr)),
            })
        }
        AddressingMode::Indirect => {
            let addr = regs.read(reg)?;
            Ok(Operand {
                value: read_place(regs, mem, Place::Mem(addr), byte)?,
                place: Some(Place::Mem(addr)),
            })
        }
        AddressingMode::IndirectAutoIncrement => {
            let addr = regs.read(reg)?;
            let value = read_place(regs, mem, Place::Mem(addr), byte)?;
            regs.write(reg, addr.wrapping_add(width))?;
            Ok(Operand {
                value,
                place: Some(Place::Mem(addr)),
            })
        }
        AddressingMode::Absolute => {
            let (addr, _) = ext.expect("absolute mode always has an extension word");
            Ok(Operand {
                value: read_place(regs, mem, Place::Mem(addr), byte)?,
                place: Some(Place::Mem(addr)),
            })
        }
        AddressingMode::Symbolic => {
            let (offset, anchor) = ext.expect("symbolic mode always has an extension word");
            let addr = anchor.wrapping_add(offset);
            Ok(Operand {
                value: read_place(regs, mem, Place::Mem(addr), byte)?,
                place: Some(Place::Mem(addr)),
            })
        }
        AddressingMode::Invalid => unreachable!("decoder never yields an invalid mode"),
    }
}

/// Resolve where the destination lives without reading it. Destinations
/// never use the constant generators and never auto-increment.
fn resolve_destination(
    regs: &RegisterFile,
    reg: u8,
    mode: AddressingMode,
    ext: Option<(u16, u16)>,
) -> Result<Place> {
    match mode {
        AddressingMode::Register => Ok(Place::Reg(reg)),
        AddressingMode::Indexed => {
            let (offset, _) = ext.expect("indexed mode always has an extension word");
            Ok(Place::Mem(regs.read(reg)?.wrapping_add(offset)))
        }
        AddressingMode::Absolute => {
            let (addr, _) = ext.expect("absolute mode always has an extension word");
            Ok(Place::Mem(addr))
        }
        AddressingMode::Symbolic => {
            let (offset, anchor) = ext.expect("symbolic mode always has an extension word");
            Ok(Place::Mem(anchor.wrapping_add(offset)))
        }
        _ => unreachable!("decoder restricts destination modes"),
    }
}

fn execute_double(
    regs: &mut RegisterFile,
    mem: &mut MemoryController,
    op: &FormatI,
) -> Result<u32> {
    let carry = regs.status().carry();
    let byte = op.byte_op;

    // Extension words in program order: source first, then destination
    let src_ext = if op.src_mode.uses_extension_word() {
        Some(fetch_extension(regs, mem)?)
    } else {
        None
    };
    let dst_ext = if op.dst_mode.uses_extension_word() {
        Some(fetch_extension(regs, mem)?)
    } else {
        None
    };

    let src = resolve_source(regs, mem, op.src_reg, op.src_mode, byte, src_ext)?;
    let dst_place = resolve_destination(regs, op.dst_reg, op.dst_mode, dst_ext)?;

    match op.opcode {
        // MOV neither reads the destination nor touches flags
        OpcodeI::Mov => {
            write_place(regs, mem, dst_place, src.value, byte)?;
        }

        OpcodeI::Add
        | OpcodeI::Addc
        | OpcodeI::Sub
        | OpcodeI::Subc
        | OpcodeI::Cmp
        | OpcodeI::Dadd => {
            let dst_val = read_place(regs, mem, dst_place, byte)?;
            let (result, flags) = match op.opcode {
                OpcodeI::Add => alu::add(src.value, dst_val, false, byte),
                OpcodeI::Addc => alu::add(src.value, dst_val, carry, byte),
                OpcodeI::Sub | OpcodeI::Cmp => alu::sub(src.value, dst_val, true, byte),
                OpcodeI::Subc => alu::sub(src.value, dst_val, carry, byte),
                OpcodeI::Dadd => alu::dadd(src.value, dst_val, carry, byte),
                _ => unreachable!(),
            };
            if op.opcode.writes_result() {
                write_place(regs, mem, dst_place, result, byte)?;
            }
            regs.update_status(|s| s.set_nzcv(flags.n, flags.z, flags.c, flags.v));
        }

        OpcodeI::Bit | OpcodeI::And | OpcodeI::Xor => {
            let dst_val = read_place(regs, mem, dst_place, byte)?;
            let result = match op.opcode {
                OpcodeI::Xor => dst_val ^ src.value,
                _ => dst_val & src.value,
            };
            if op.opcode.writes_result() {
                write_place(regs, mem, dst_place, result, byte)?;
            }
            let flags = alu::logical_flags(result, byte);
            regs.update_status(|s| s.set_nzcv(flags.n, flags.z, flags.c, flags.v));
        }

        // BIS and BIC set N and Z from the result and clear V, but the
        // carry passes through untouched
        OpcodeI::Bis | OpcodeI::Bic => {
            let dst_val = read_place(regs, mem, dst_place, byte)?;
            let result = match op.opcode {
                OpcodeI::Bis => dst_val | src.value,
                _ => dst_val & !src.value,
            };
            write_place(regs, mem, dst_place, result, byte)?;
            let flags = alu::logical_flags(result, byte);
            regs.update_status(|s| s.set_nz_keep_carry(flags.n, flags.z));
        }
    }

    Ok(cycles::format_i_cycles(op))
}

fn execute_single(
    regs: &mut RegisterFile,
    mem: &mut MemoryController,
    op: &FormatII,
) -> Result<u32> {
    let carry = regs.status().carry();
    let byte = op.byte_op;

    let ext = if op.src_mode.uses_extension_word() {
        Some(fetch_extension(regs, mem)?)
    } else {
        None
    };

    match op.opcode {
        OpcodeII::Rrc | OpcodeII::Rra | OpcodeII::Swpb | OpcodeII::Sxt => {
            let operand = resolve_source(regs, mem, op.src_reg, op.src_mode, byte, ext)?;
            let place = operand
                .place
                .expect("decoder rejects literal operands for this group");
            match op.opcode {
                OpcodeII::Rrc => {
                    let (result, flags) = alu::rrc(operand.value, carry, byte);
                    write_place(regs, mem, place, result, byte)?;
                    regs.update_status(|s| s.set_nzcv(flags.n, flags.z, flags.c, flags.v));
                }
                OpcodeII::Rra => {
                    let (result, flags) = alu::rra(operand.value, byte);
                    write_place(regs, mem, place, result, byte)?;
                    regs.update_status(|s| s.set_nzcv(flags.n, flags.z, flags.c, flags.v));
                }
                // Byte swap does not touch flags
                OpcodeII::Swpb => {
                    write_place(regs, mem, place, alu::swpb(operand.value), false)?;
                }
                OpcodeII::Sxt => {
                    let (result, flags) = alu::sxt(operand.value);
                    write_place(regs, mem, place, result, false)?;
                    regs.update_status(|s| s.set_nzcv(flags.n, flags.z, flags.c, flags.v));
                }
                _ => unreachable!(),
            }
        }

        OpcodeII::Push => {
            let operand = resolve_source(regs, mem, op.src_reg, op.src_mode, byte, ext)?;
            let sp = regs.sp().wrapping_sub(2);
            regs.set_sp(sp);
            if byte {
                mem.write_byte(sp, operand.value as u8)?;
            } else {
                mem.write_word(sp, operand.value)?;
            }
        }

        OpcodeII::Call => {
            let target = resolve_source(regs, mem, op.src_reg, op.src_mode, false, ext)?;
            let sp = regs.sp().wrapping_sub(2);
            regs.set_sp(sp);
            mem.write_word(sp, regs.pc())?;
            regs.set_pc(target.value);
        }

        OpcodeII::Reti => {
            let sp = regs.sp();
            let status = mem.read_word(sp)?;
            regs.write(SR, status)?;
            let pc = mem.read_word(sp.wrapping_add(2))?;
            regs.set_sp(sp.wrapping_add(4));
            regs.set_pc(pc);
        }
    }

    Ok(cycles::format_ii_cycles(op))
}

fn execute_jump(regs: &mut RegisterFile, op: &FormatIII) -> u32 {
    let status = regs.status();
    if op.condition.holds(
        status.negative(),
        status.zero(),
        status.carry(),
        status.overflow(),
    ) {
        let displacement = (op.offset as u16).wrapping_mul(2);
        regs.set_pc(regs.pc().wrapping_add(displacement));
    }
    cycles::format_iii_cycles(op)
}

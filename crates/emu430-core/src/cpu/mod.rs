//! CPU core: stepping surface and embedding API
//!
//! One simulated step runs a whole instruction to completion: fetch at PC
//! with execute permission, decode, execute, account cycles and advance
//! the FRAM controller's notion of time. Errors propagate out of
//! [`Cpu::step`] untouched; whatever the instruction had already
//! committed (PC advance, auto-increments) stays committed.

mod alu;
mod execute;

use emu430_isa::{decode, disasm, Instruction};

use crate::config::Config;
use crate::error::Result;
use crate::memory::MemoryController;
use crate::registers::{RegisterFile, StatusFlags};

/// Why [`Cpu::run_until`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's predicate fired
    Predicate,
    /// The CPUOFF status bit is set
    CpuOff,
}

/// Read-only snapshot of the core, handed to `run_until` predicates and
/// available through [`Cpu::state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    /// All sixteen registers
    pub registers: [u16; 16],
    /// Status register view
    pub status: StatusFlags,
    /// Cycles consumed since construction or the last reset
    pub cycle_count: u64,
}

impl CpuState {
    /// Program counter
    pub fn pc(&self) -> u16 {
        self.registers[0]
    }

    /// Stack pointer
    pub fn sp(&self) -> u16 {
        self.registers[1]
    }
}

/// The emulated CPU core
pub struct Cpu {
    registers: RegisterFile,
    memory: MemoryController,
    cycle_count: u64,
    config: Config,
}

impl Cpu {
    /// Build a core from a configuration
    pub fn new(config: Config) -> Self {
        if config.memory.total_size != 65536 {
            log::warn!(
                "configured address space of {} bytes noted; the device map stays 64 KiB",
                config.memory.total_size
            );
        }
        Self {
            registers: RegisterFile::new(),
            memory: MemoryController::new(config.memory.enable_protection),
            cycle_count: 0,
            config,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register file view
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register file access for embedding and test setup
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Memory controller view
    pub fn memory(&self) -> &MemoryController {
        &self.memory
    }

    /// Mutable memory controller access (observers, FRAM controller,
    /// information memory)
    pub fn memory_mut(&mut self) -> &mut MemoryController {
        &mut self.memory
    }

    /// Cycles consumed since construction or the last reset
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Snapshot of registers, status and cycle counter
    pub fn state(&self) -> CpuState {
        CpuState {
            registers: self.registers.snapshot(),
            status: self.registers.status(),
            cycle_count: self.cycle_count,
        }
    }

    /// Point PC at an address (word-aligned)
    pub fn set_pc(&mut self, addr: u16) {
        self.registers.set_pc(addr);
    }

    /// Copy an image into backing storage, bypassing permissions
    pub fn load(&mut self, addr: u16, bytes: &[u8]) -> Result<()> {
        self.memory.load(addr, bytes)
    }

    /// Registers to zero, volatile memory cleared, FRAM controller locked,
    /// cycle counter rewound
    pub fn reset(&mut self) {
        self.registers.reset();
        self.memory.reset();
        self.cycle_count = 0;
    }

    /// Execute exactly one instruction and return its cycle cost
    pub fn step(&mut self) -> Result<u32> {
        let pc = self.registers.pc();
        let word = self.memory.fetch_instruction(pc)?;
        self.registers.advance_pc(2);
        let instr = decode(word)?;
        if self.config.cpu.enable_tracing {
            self.trace(pc, &instr);
        }
        let cycles = execute::execute(&mut self.registers, &mut self.memory, &instr)?;
        self.cycle_count += cycles as u64;
        self.memory.tick(cycles);
        Ok(cycles)
    }

    /// Step until the predicate fires or CPUOFF is set, returning the
    /// stop reason and the cycles consumed by this call. The predicate is
    /// evaluated between instructions, never inside one.
    pub fn run_until<F>(&mut self, mut predicate: F) -> Result<(StopReason, u64)>
    where
        F: FnMut(&CpuState) -> bool,
    {
        let start = self.cycle_count;
        loop {
            let state = self.state();
            if predicate(&state) {
                return Ok((StopReason::Predicate, self.cycle_count - start));
            }
            if state.status.contains(StatusFlags::CPU_OFF) {
                return Ok((StopReason::CpuOff, self.cycle_count - start));
            }
            self.step()?;
        }
    }

    fn trace(&self, pc: u16, instr: &Instruction) {
        let mut exts = [0u16; 2];
        let count = instr.extension_word_count() as usize;
        for (i, slot) in exts.iter_mut().enumerate().take(count) {
            *slot = self
                .memory
                .peek_word(self.registers.pc().wrapping_add(2 * i as u16))
                .unwrap_or(0);
        }
        log::trace!(
            "{:#06x}: {}",
            pc,
            disasm::disassemble(instr, &exts[..count])
        );
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fram::ControllerState;
    use crate::memory::{AccessKind, ViolationReason};
    use crate::registers::{SP, SR};

    /// Build a core with `words` placed little-endian at `addr` and PC
    /// pointing at the first of them
    fn cpu_with_program(addr: u16, words: &[u16]) -> Cpu {
        let mut cpu = Cpu::default();
        load_words(&mut cpu, addr, words);
        cpu.set_pc(addr);
        cpu
    }

    fn load_words(cpu: &mut Cpu, addr: u16, words: &[u16]) {
        let mut bytes = Vec::with_capacity(words.len() * 2);
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        cpu.load(addr, &bytes).unwrap();
    }

    #[test]
    fn test_register_add() {
        let mut cpu = cpu_with_program(0x4000, &[0x5405]); // ADD R4, R5
        cpu.registers_mut().write(4, 0x1000).unwrap();
        cpu.registers_mut().write(5, 0x2000).unwrap();

        assert_eq!(cpu.step().unwrap(), 1);
        assert_eq!(cpu.registers().read(5).unwrap(), 0x3000);
        let status = cpu.registers().status();
        assert!(!status.negative() && !status.zero() && !status.carry() && !status.overflow());
        assert_eq!(cpu.registers().pc(), 0x4002);
    }

    #[test]
    fn test_byte_add_overflow() {
        let mut cpu = cpu_with_program(0x4000, &[0x5445]); // ADD.B R4, R5
        cpu.registers_mut().write(4, 0x12FF).unwrap();
        cpu.registers_mut().write(5, 0x3401).unwrap();

        assert_eq!(cpu.step().unwrap(), 1);
        // The high byte of the destination register is preserved
        assert_eq!(cpu.registers().read(5).unwrap(), 0x3400);
        let status = cpu.registers().status();
        assert!(status.carry() && status.zero() && !status.negative());
    }

    #[test]
    fn test_indirect_autoincrement_add() {
        let mut cpu = cpu_with_program(0x4000, &[0x5435]); // ADD @R4+, R5
        load_words(&mut cpu, 0x0200, &[0x1234]);
        cpu.registers_mut().write(4, 0x0200).unwrap();
        cpu.registers_mut().write(5, 0x1000).unwrap();

        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.registers().read(5).unwrap(), 0x2234);
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0202);
    }

    #[test]
    fn test_immediate_through_pc() {
        let mut cpu = cpu_with_program(0x4000, &[0x5035, 0x1234]); // ADD #0x1234, R5
        cpu.registers_mut().write(5, 0x1000).unwrap();

        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.registers().read(5).unwrap(), 0x2234);
        assert_eq!(cpu.registers().pc(), 0x4004);
    }

    #[test]
    fn test_signed_jumps_on_n_xor_v() {
        // JGE +4 falls through while N=1, V=0; JL +4 is then taken
        let mut cpu = cpu_with_program(0x4000, &[0x3402, 0x3802]);
        cpu.registers_mut().set_status(StatusFlags::NEGATIVE);

        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.registers().pc(), 0x4002);

        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.registers().pc(), 0x4008);
    }

    #[test]
    fn test_flash_program_and_sector_erase() {
        let mut cpu = Cpu::default();
        assert!(cpu.memory_mut().fram_mut().try_unlock(0xA500));

        assert!(cpu.memory_mut().write_byte(0x5000, 0xAA).unwrap());
        assert_eq!(
            cpu.memory().fram().state(),
            ControllerState::Programming
        );
        cpu.memory_mut().tick(30);
        cpu.memory_mut().tick(0);
        assert_eq!(cpu.memory().fram().state(), ControllerState::Unlocked);
        assert_eq!(cpu.memory_mut().read_byte(0x5000).unwrap(), 0xAA);

        assert!(cpu.memory_mut().fram_mut().erase_sector(0x5000));
        cpu.memory_mut().tick(4819);
        cpu.memory_mut().tick(0);
        assert_eq!(cpu.memory().fram().state(), ControllerState::Unlocked);
        for addr in (0x5000..0x5200).step_by(64) {
            assert_eq!(cpu.memory_mut().read_byte(addr).unwrap(), 0xFF);
        }
    }

    #[test]
    fn test_symbolic_source() {
        // MOV ADDR, R5 where ADDR sits 0x0E past the extension word
        let mut cpu = cpu_with_program(0x4000, &[0x4015, 0x000E]);
        load_words(&mut cpu, 0x4010, &[0xBEEF]);

        assert_eq!(cpu.step().unwrap(), 3);
        assert_eq!(cpu.registers().read(5).unwrap(), 0xBEEF);
    }

    #[test]
    fn test_symbolic_destination() {
        // MOV R5, ADDR running from RAM so the store lands
        let mut cpu = cpu_with_program(0x2000, &[0x4580, 0x000E]);
        cpu.registers_mut().write(5, 0xCAFE).unwrap();

        assert_eq!(cpu.step().unwrap(), 3);
        assert_eq!(cpu.memory_mut().read_word(0x2010).unwrap(), 0xCAFE);
    }

    #[test]
    fn test_absolute_to_absolute_add() {
        let mut cpu = cpu_with_program(0x4000, &[0x5292, 0x2000, 0x2002]);
        load_words(&mut cpu, 0x2000, &[0x0005]);
        load_words(&mut cpu, 0x2002, &[0x0003]);

        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.memory_mut().read_word(0x2002).unwrap(), 0x0008);
        assert_eq!(cpu.registers().pc(), 0x4006);
    }

    #[test]
    fn test_extension_words_consumed_matches_decoder() {
        let cases: &[(&[u16], u16)] = &[
            (&[0x5405], 0),                 // ADD R4, R5
            (&[0x5035, 0x0001], 1),         // ADD #1(ext), R5
            (&[0x5292, 0x2000, 0x2002], 2), // ADD &a, &b
            (&[0x923C], 0),                 // CMP #8, R12 via constant generator
        ];
        for (words, expected) in cases {
            let mut cpu = cpu_with_program(0x4000, words);
            let decoded = decode(words[0]).unwrap();
            assert_eq!(decoded.extension_word_count(), *expected);
            cpu.step().unwrap();
            let consumed = (cpu.registers().pc() - 0x4000) / 2 - 1;
            assert_eq!(consumed, *expected, "word {:#06x}", words[0]);
        }
    }

    #[test]
    fn test_push_call_ret_round_trip() {
        // CALL #0x4100, then the callee returns
        let mut cpu = cpu_with_program(0x4000, &[0x12B0, 0x4100]);
        load_words(&mut cpu, 0x4100, &[0x4130]); // RET
        cpu.registers_mut().set_sp(0x3000);

        cpu.step().unwrap();
        assert_eq!(cpu.registers().pc(), 0x4100);
        assert_eq!(cpu.registers().sp(), 0x2FFE);
        assert_eq!(cpu.memory_mut().read_word(0x2FFE).unwrap(), 0x4004);

        cpu.step().unwrap();
        assert_eq!(cpu.registers().pc(), 0x4004);
        assert_eq!(cpu.registers().sp(), 0x3000);
    }

    #[test]
    fn test_push_decrements_before_store() {
        let mut cpu = cpu_with_program(0x4000, &[0x1204]); // PUSH R4
        cpu.registers_mut().write(4, 0xABCD).unwrap();
        cpu.registers_mut().set_sp(0x3000);

        cpu.step().unwrap();
        assert_eq!(cpu.state().sp(), 0x2FFE);
        assert_eq!(cpu.memory_mut().read_word(0x2FFE).unwrap(), 0xABCD);
    }

    #[test]
    fn test_reti_restores_status_then_pc() {
        let mut cpu = cpu_with_program(0x4000, &[0x1300]); // RETI
        cpu.registers_mut().set_sp(0x2FF0);
        load_words(&mut cpu, 0x2FF0, &[0x0009, 0x4200]); // SR, then PC

        assert_eq!(cpu.step().unwrap(), 5);
        assert_eq!(
            cpu.registers().status(),
            StatusFlags::CARRY | StatusFlags::GIE
        );
        assert_eq!(cpu.registers().pc(), 0x4200);
        assert_eq!(cpu.registers().sp(), 0x2FF4);
    }

    #[test]
    fn test_emulated_status_instructions() {
        // SETC, then DINT on a GIE+carry status
        let mut cpu = cpu_with_program(0x4000, &[0xD312, 0xC232]);
        cpu.registers_mut().set_status(StatusFlags::GIE);

        cpu.step().unwrap();
        assert_eq!(
            cpu.registers().status(),
            StatusFlags::GIE | StatusFlags::CARRY
        );

        cpu.step().unwrap();
        assert_eq!(cpu.registers().status(), StatusFlags::CARRY);
    }

    #[test]
    fn test_emulated_nop_changes_nothing_but_pc() {
        let mut cpu = cpu_with_program(0x4000, &[0x4303]); // NOP
        cpu.registers_mut().write(4, 0x1234).unwrap();
        cpu.registers_mut()
            .set_status(StatusFlags::CARRY | StatusFlags::NEGATIVE);
        let before = cpu.registers().snapshot();

        assert_eq!(cpu.step().unwrap(), 1);
        let after = cpu.registers().snapshot();
        assert_eq!(&after[1..], &before[1..]);
        assert_eq!(cpu.registers().pc(), 0x4002);
    }

    #[test]
    fn test_emulated_inc_tst() {
        // INC R4; TST R4
        let mut cpu = cpu_with_program(0x4000, &[0x5314, 0x9304]);
        cpu.registers_mut().write(4, 0xFFFF).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0000);
        assert!(cpu.registers().status().carry());
        assert!(cpu.registers().status().zero());

        cpu.step().unwrap();
        // TST of zero: Z set, C set (no borrow), N and V clear
        let status = cpu.registers().status();
        assert!(status.zero() && status.carry() && !status.negative() && !status.overflow());
    }

    #[test]
    fn test_rotate_group() {
        // RRC R4 with carry in, SWPB R4, RRA R4, SXT R4
        let mut cpu = cpu_with_program(0x4000, &[0x1004, 0x1084, 0x1104, 0x1184]);
        cpu.registers_mut().write(4, 0x0003).unwrap();
        cpu.registers_mut().set_status(StatusFlags::CARRY);

        cpu.step().unwrap(); // RRC: 0x0003 -> 0x8001, C=1
        assert_eq!(cpu.registers().read(4).unwrap(), 0x8001);
        assert!(cpu.registers().status().carry());
        assert!(cpu.registers().status().negative());

        cpu.step().unwrap(); // SWPB: 0x8001 -> 0x0180, flags kept
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0180);
        assert!(cpu.registers().status().carry());

        cpu.step().unwrap(); // RRA: 0x0180 -> 0x00C0, C=0
        assert_eq!(cpu.registers().read(4).unwrap(), 0x00C0);
        assert!(!cpu.registers().status().carry());

        cpu.step().unwrap(); // SXT: 0x00C0 -> 0xFFC0
        assert_eq!(cpu.registers().read(4).unwrap(), 0xFFC0);
        assert!(cpu.registers().status().negative());
        assert!(cpu.registers().status().carry());
    }

    #[test]
    fn test_invalid_instruction_carries_word() {
        let mut cpu = cpu_with_program(0x4000, &[0x0000]);
        match cpu.step().unwrap_err() {
            Error::InvalidInstruction(decode_err) => assert_eq!(decode_err.word, 0x0000),
            other => panic!("unexpected error {:?}", other),
        }
        // The fetch itself committed
        assert_eq!(cpu.registers().pc(), 0x4002);
    }

    #[test]
    fn test_no_rollback_on_mid_instruction_fault() {
        // ADD @R4+, &0x3000: the destination read faults on an unmapped
        // address after the auto-increment has committed
        let mut cpu = cpu_with_program(0x4000, &[0x54B2, 0x3000]);
        load_words(&mut cpu, 0x2000, &[0x0001]);
        cpu.registers_mut().write(4, 0x2000).unwrap();

        let err = cpu.step().unwrap_err();
        assert_eq!(
            err,
            Error::AccessViolation {
                addr: 0x3000,
                kind: AccessKind::Read,
                reason: ViolationReason::Unmapped,
            }
        );
        assert_eq!(cpu.registers().read(4).unwrap(), 0x2002);
        assert_eq!(cpu.registers().pc(), 0x4004);
    }

    #[test]
    fn test_pc_and_sp_stay_even_through_a_program() {
        let mut cpu = cpu_with_program(
            0x4000,
            &[
                0x1204, // PUSH R4
                0x4134, // POP R4
                0x3C01, // JMP over the next word
                0xFFFF, // skipped
                0x5314, // INC R4
            ],
        );
        cpu.registers_mut().set_sp(0x3000);
        for _ in 0..4 {
            cpu.step().unwrap();
            assert_eq!(cpu.registers().pc() % 2, 0);
            assert_eq!(cpu.registers().sp() % 2, 0);
        }
    }

    #[test]
    fn test_run_until_predicate() {
        // Three INCs, then spin on JMP $-2
        let mut cpu = cpu_with_program(0x4000, &[0x5314, 0x5314, 0x5314, 0x3FFF]);
        let (reason, cycles) = cpu
            .run_until(|state| state.registers[4] == 3)
            .unwrap();
        assert_eq!(reason, StopReason::Predicate);
        assert_eq!(cycles, 3);
        assert_eq!(cpu.cycle_count(), 3);
    }

    #[test]
    fn test_run_until_stops_on_cpu_off() {
        // BIS #0x0010, SR sets CPUOFF
        let mut cpu = cpu_with_program(0x4000, &[0xD032, 0x0010]);
        let (reason, cycles) = cpu.run_until(|_| false).unwrap();
        assert_eq!(reason, StopReason::CpuOff);
        assert_eq!(cycles, 2);
    }

    #[test]
    fn test_configuration_is_kept() {
        let mut config = Config::default();
        config.cpu.frequency = 8_000_000;
        let cpu = Cpu::new(config);
        assert_eq!(cpu.config().cpu.frequency, 8_000_000);
        assert_eq!(cpu.cycle_count(), 0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut cpu = cpu_with_program(0x4000, &[0x5314]);
        cpu.registers_mut().set_sp(0x3000);
        cpu.step().unwrap();
        cpu.reset();
        let first = cpu.state();
        cpu.reset();
        assert_eq!(cpu.state(), first);
        assert_eq!(first.pc(), 0);
        assert_eq!(first.cycle_count, 0);
        assert_eq!(first.status, StatusFlags::empty());
    }

    #[test]
    fn test_deterministic_replay() {
        let program = [
            0x4031u16, 0x3000, // MOV #0x3000, SP
            0x5315, // ADD #1, R5... actually INC R5 spelling
            0x1205, // PUSH R5
            0x5505, // ADD R5, R5
            0x9305, // TST R5
            0x2001, // JEQ +1 word
            0x5314, // INC R4
        ];
        let run = || -> Vec<(u64, CpuState)> {
            let mut cpu = cpu_with_program(0x4000, &program);
            let mut trace = Vec::new();
            for _ in 0..7 {
                let cycles = cpu.step().unwrap() as u64;
                trace.push((cycles, cpu.state()));
            }
            trace
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_mov_to_pc_branches() {
        let mut cpu = cpu_with_program(0x4000, &[0x4030, 0x4400]); // BR #0x4400
        assert_eq!(cpu.step().unwrap(), 3);
        assert_eq!(cpu.registers().pc(), 0x4400);
    }

    #[test]
    fn test_writes_to_sr_destination_mask_reserved_bits() {
        // MOV #0xFFFF, SR
        let mut cpu = cpu_with_program(0x4000, &[0x4032, 0xFFFF]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(SR).unwrap(), 0x01FF);
    }

    #[test]
    fn test_sub_sets_no_borrow_carry() {
        // SUB R4, R5 with R5 > R4
        let mut cpu = cpu_with_program(0x4000, &[0x8405]);
        cpu.registers_mut().write(4, 0x0003).unwrap();
        cpu.registers_mut().write(5, 0x0005).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0002);
        let status = cpu.registers().status();
        assert!(status.carry() && !status.negative() && !status.zero());
    }

    #[test]
    fn test_cmp_updates_flags_without_writing() {
        // CMP R4, R5 with R5 < R4: borrow, so carry clear
        let mut cpu = cpu_with_program(0x4000, &[0x9405]);
        cpu.registers_mut().write(4, 0x0005).unwrap();
        cpu.registers_mut().write(5, 0x0003).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0003);
        let status = cpu.registers().status();
        assert!(!status.carry() && status.negative());
    }

    #[test]
    fn test_32_bit_add_with_addc() {
        // R4:R5 = 0x0001_FFFF, R6:R7 = 0x0000_0001; low words add with
        // carry out, ADDC folds it into the high words
        let mut cpu = cpu_with_program(0x4000, &[0x5705, 0x6604]); // ADD R7, R5; ADDC R6, R4
        cpu.registers_mut().write(4, 0x0001).unwrap(); // high
        cpu.registers_mut().write(5, 0xFFFF).unwrap(); // low
        cpu.registers_mut().write(6, 0x0000).unwrap();
        cpu.registers_mut().write(7, 0x0001).unwrap();

        cpu.step().unwrap();
        assert!(cpu.registers().status().carry());
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0002);
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0000);
    }

    #[test]
    fn test_32_bit_sub_with_subc() {
        // 0x0002_0000 - 0x0000_0001 = 0x0001_FFFF
        let mut cpu = cpu_with_program(0x4000, &[0x8705, 0x7604]); // SUB R7, R5; SUBC R6, R4
        cpu.registers_mut().write(4, 0x0002).unwrap();
        cpu.registers_mut().write(5, 0x0000).unwrap();
        cpu.registers_mut().write(6, 0x0000).unwrap();
        cpu.registers_mut().write(7, 0x0001).unwrap();

        cpu.step().unwrap();
        assert!(!cpu.registers().status().carry()); // borrow out of the low word
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0001);
        assert_eq!(cpu.registers().read(5).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_dadd_bcd_counter_with_carry_chain() {
        // DADD #1, R4 rolls a BCD counter; DADC R5 folds the decimal carry
        let mut cpu = cpu_with_program(0x4000, &[0xA314, 0xA305]); // DADD #1, R4; DADD #0, R5
        cpu.registers_mut().write(4, 0x9999).unwrap();
        cpu.registers_mut().write(5, 0x0001).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(4).unwrap(), 0x0000);
        assert!(cpu.registers().status().carry());
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0002);
    }

    #[test]
    fn test_and_xor_flag_rule() {
        // AND R4, R5 with disjoint bits: zero result, carry clear
        let mut cpu = cpu_with_program(0x4000, &[0xF405, 0xE405]);
        cpu.registers_mut().write(4, 0x0F0F).unwrap();
        cpu.registers_mut().write(5, 0xF0F0).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0000);
        let status = cpu.registers().status();
        assert!(status.zero() && !status.carry());

        // XOR R4, R5: nonzero result, carry set, V cleared
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0F0F);
        let status = cpu.registers().status();
        assert!(!status.zero() && status.carry() && !status.overflow());
    }

    #[test]
    fn test_bit_tests_without_writing() {
        let mut cpu = cpu_with_program(0x4000, &[0xB425]); // BIT @R4, R5
        load_words(&mut cpu, 0x2000, &[0x8000]);
        cpu.registers_mut().write(4, 0x2000).unwrap();
        cpu.registers_mut().write(5, 0xFFFF).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0xFFFF);
        let status = cpu.registers().status();
        assert!(status.negative() && status.carry() && !status.zero());
    }

    #[test]
    fn test_bis_bic_set_nz_and_clear_v_but_preserve_carry() {
        let mut cpu = cpu_with_program(0x4000, &[0xD435, 0xC435]); // BIS @R4+, R5; BIC @R4+, R5
        cpu.registers_mut()
            .set_status(StatusFlags::CARRY | StatusFlags::OVERFLOW);
        load_words(&mut cpu, 0x2000, &[0x8000, 0xFFFF]);
        cpu.registers_mut().write(4, 0x2000).unwrap();
        cpu.registers_mut().write(5, 0x0001).unwrap();

        cpu.step().unwrap(); // BIS @R4+, R5: negative result
        assert_eq!(cpu.registers().read(5).unwrap(), 0x8001);
        assert_eq!(
            cpu.registers().status(),
            StatusFlags::CARRY | StatusFlags::NEGATIVE
        );

        cpu.step().unwrap(); // BIC @R4+, R5: zero result
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0000);
        assert_eq!(
            cpu.registers().status(),
            StatusFlags::CARRY | StatusFlags::ZERO
        );
    }

    #[test]
    fn test_byte_store_to_memory_touches_one_byte() {
        // MOV.B R4, 1(R5): only the addressed byte changes
        let mut cpu = cpu_with_program(0x2000, &[0x44C5, 0x0001]);
        load_words(&mut cpu, 0x2100, &[0x1122]);
        cpu.registers_mut().write(4, 0x00AA).unwrap();
        cpu.registers_mut().write(5, 0x2100).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.memory_mut().read_word(0x2100).unwrap(), 0xAA22);
    }

    #[test]
    fn test_indexed_source_and_destination() {
        // ADD 2(R4), 4(R5)
        let mut cpu = cpu_with_program(0x4000, &[0x5495, 0x0002, 0x0004]);
        load_words(&mut cpu, 0x2002, &[0x0030]);
        load_words(&mut cpu, 0x2104, &[0x0007]);
        cpu.registers_mut().write(4, 0x2000).unwrap();
        cpu.registers_mut().write(5, 0x2100).unwrap();

        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.memory_mut().read_word(0x2104).unwrap(), 0x0037);
        assert_eq!(cpu.registers().pc(), 0x4006);
    }

    #[test]
    fn test_rrc_on_a_memory_operand() {
        let mut cpu = cpu_with_program(0x4000, &[0x1025, 0x1025]); // RRC @R5 twice
        load_words(&mut cpu, 0x2000, &[0x0003]);
        cpu.registers_mut().write(5, 0x2000).unwrap();

        assert_eq!(cpu.step().unwrap(), 3);
        assert_eq!(cpu.memory_mut().read_word(0x2000).unwrap(), 0x0001);
        assert!(cpu.registers().status().carry());
        cpu.step().unwrap();
        // The carry shifted back in at the top
        assert_eq!(cpu.memory_mut().read_word(0x2000).unwrap(), 0x8000);
    }

    #[test]
    fn test_push_byte_writes_one_byte() {
        let mut cpu = cpu_with_program(0x4000, &[0x1244]); // PUSH.B R4
        cpu.registers_mut().write(4, 0x11AA).unwrap();
        cpu.registers_mut().set_sp(0x3000);

        cpu.step().unwrap();
        assert_eq!(cpu.registers().sp(), 0x2FFE);
        assert_eq!(cpu.memory_mut().read_byte(0x2FFE).unwrap(), 0xAA);
        assert_eq!(cpu.memory_mut().read_byte(0x2FFF).unwrap(), 0x00);
    }

    #[test]
    fn test_call_through_register() {
        let mut cpu = cpu_with_program(0x4000, &[0x1284]); // CALL R4
        cpu.registers_mut().write(4, 0x4800).unwrap();
        cpu.registers_mut().set_sp(0x3000);

        cpu.step().unwrap();
        assert_eq!(cpu.registers().pc(), 0x4800);
        assert_eq!(cpu.memory_mut().read_word(0x2FFE).unwrap(), 0x4002);
    }

    #[test]
    fn test_store_into_unlocked_fram() {
        // MOV R5, &0x5000 with the controller unlocked
        let mut cpu = cpu_with_program(0x4000, &[0x4582, 0x5000]);
        cpu.registers_mut().write(5, 0x1234).unwrap();
        assert!(cpu.memory_mut().fram_mut().try_unlock(0xA500));

        cpu.step().unwrap();
        assert_eq!(cpu.memory_mut().read_word(0x5000).unwrap(), 0x1234);
        // The word program is in flight until its cycles elapse
        assert_eq!(
            cpu.memory().fram().state(),
            ControllerState::Programming
        );
        cpu.memory_mut().tick(35);
        cpu.memory_mut().tick(0);
        assert_eq!(cpu.memory().fram().state(), ControllerState::Unlocked);
    }

    #[test]
    fn test_store_into_locked_fram_is_dropped() {
        let mut cpu = cpu_with_program(0x4000, &[0x4582, 0x5000]);
        cpu.registers_mut().write(5, 0x1234).unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.memory_mut().read_word(0x5000).unwrap(), 0xFFFF);
        assert_eq!(cpu.registers().pc(), 0x4004);
    }

    #[test]
    fn test_all_jump_conditions() {
        // (word, status, taken)
        let cases = [
            (0x2001, StatusFlags::ZERO, true),               // JEQ
            (0x2001, StatusFlags::empty(), false),
            (0x2401, StatusFlags::ZERO, false),              // JNE
            (0x2401, StatusFlags::empty(), true),
            (0x2801, StatusFlags::CARRY, true),              // JC
            (0x2801, StatusFlags::empty(), false),
            (0x2C01, StatusFlags::CARRY, false),             // JNC
            (0x2C01, StatusFlags::empty(), true),
            (0x3001, StatusFlags::NEGATIVE, true),           // JN
            (0x3001, StatusFlags::empty(), false),
            (0x3401, StatusFlags::empty(), true),            // JGE, N=V=0
            (0x3401, StatusFlags::NEGATIVE, false),          // JGE, N!=V
            (0x3801, StatusFlags::NEGATIVE, true),           // JL, N!=V
            (0x3801, StatusFlags::OVERFLOW, true),           // JL, N!=V
            (
                0x3801,
                StatusFlags::NEGATIVE | StatusFlags::OVERFLOW, // JL, N==V
                false,
            ),
            (0x3C01, StatusFlags::empty(), true),            // JMP
        ];
        for (word, status, taken) in cases {
            let mut cpu = cpu_with_program(0x4000, &[word]);
            cpu.registers_mut().set_status(status);
            assert_eq!(cpu.step().unwrap(), 2, "word {:#06x}", word);
            let expected = if taken { 0x4004 } else { 0x4002 };
            assert_eq!(
                cpu.registers().pc(),
                expected,
                "word {:#06x} with {:?}",
                word,
                status
            );
        }
    }

    #[test]
    fn test_status_register_as_plain_source() {
        // MOV SR, R5 captures the live flags
        let mut cpu = cpu_with_program(0x4000, &[0x4205]);
        cpu.registers_mut()
            .set_status(StatusFlags::CARRY | StatusFlags::ZERO);
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(5).unwrap(), 0x0003);
    }

    #[test]
    fn test_stack_pointer_register_is_usable() {
        // MOV #0x2FF0, SP then PUSH #8 via the constant generator
        let mut cpu = cpu_with_program(0x4000, &[0x4031, 0x2FF0, 0x1232]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers().read(SP).unwrap(), 0x2FF0);
        cpu.step().unwrap();
        assert_eq!(cpu.memory_mut().read_word(0x2FEE).unwrap(), 0x0008);
    }
}

//! FRAM/flash controller
//!
//! A state machine guarding the main FRAM code array: it must be unlocked
//! with a keyed command before it accepts program or erase operations, it
//! accounts the cycles an operation takes before the array is ready
//! again, and it enforces a protection level on top of the lock.
//!
//! Data commits at acceptance; the state machine models the time the
//! array spends busy. By default programming follows the flash rule that
//! a cell's bits can only be cleared (write `v` over `c` requires
//! `c & v == v`); the FRAM relaxation lifts that and allows plain byte
//! overwrite.

/// Required high byte of an unlock key
pub const UNLOCK_KEY: u16 = 0xA500;
/// Cycles to program one word
pub const PROGRAM_WORD_CYCLES: u32 = 35;
/// Cycles to program one byte
pub const PROGRAM_BYTE_CYCLES: u32 = 30;
/// Cycles to erase one 512-byte sector
pub const SECTOR_ERASE_CYCLES: u32 = 4819;
/// Cycles to erase the whole array
pub const MASS_ERASE_CYCLES: u32 = 5297;
/// Cycles to erase one 64-byte segment
pub const SEGMENT_ERASE_CYCLES: u32 = SECTOR_ERASE_CYCLES / 8;
/// Sector size in bytes
pub const SECTOR_SIZE: u16 = 512;
/// Segment size in bytes
pub const SEGMENT_SIZE: u16 = 64;

/// Lock/operation state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Writes refused; unlock with a keyed command
    Locked,
    /// Ready to accept program and erase operations
    Unlocked,
    /// A program operation is in flight
    Programming,
    /// An erase operation is in flight
    Erasing,
    /// The last operation finished; settles to `Unlocked` on the next
    /// interaction
    OperationComplete,
    /// A fault occurred; only `reset()` leaves this state
    Error,
}

/// Protection level layered over the lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtectionLevel {
    /// No protection
    None,
    /// Unlock allowed, program/erase refused
    WriteProtected,
    /// Unlock refused
    SecurityLocked,
    /// Unlock refused; terminal - survives reset and cannot be lowered
    PermanentlyLocked,
}

/// The operation currently in flight (or last accepted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOperation {
    /// Idle
    None,
    /// Byte or word program
    Program,
    /// 512-byte sector erase
    SectorErase,
    /// Whole-array erase
    MassErase,
    /// 64-byte segment erase
    SegmentErase,
}

/// Controller state machine plus the byte storage it owns
#[derive(Debug, Clone)]
pub struct FramController {
    state: ControllerState,
    protection: ProtectionLevel,
    operation: FlashOperation,
    cycles_remaining: u32,
    base: u16,
    data: Vec<u8>,
    relaxed_writes: bool,
}

impl FramController {
    /// New controller owning `size` bytes starting at `base`, erased and
    /// locked
    pub fn new(base: u16, size: usize) -> Self {
        Self {
            state: ControllerState::Locked,
            protection: ProtectionLevel::None,
            operation: FlashOperation::None,
            cycles_remaining: 0,
            base,
            data: vec![0xFF; size],
            relaxed_writes: false,
        }
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Current protection level
    pub fn protection(&self) -> ProtectionLevel {
        self.protection
    }

    /// Operation currently in flight
    pub fn operation(&self) -> FlashOperation {
        self.operation
    }

    /// Simulated cycles until the in-flight operation completes
    pub fn cycles_remaining(&self) -> u32 {
        self.cycles_remaining
    }

    /// First address owned by this controller
    pub fn base(&self) -> u16 {
        self.base
    }

    /// Number of bytes owned by this controller
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether an address falls inside the controller's array
    pub fn contains(&self, addr: u16) -> bool {
        addr >= self.base && (addr as usize - self.base as usize) < self.data.len()
    }

    /// Switch between flash bit-clear programming (default) and FRAM
    /// byte-overwrite programming
    pub fn set_relaxed_writes(&mut self, relaxed: bool) {
        self.relaxed_writes = relaxed;
    }

    /// A finished operation settles to Unlocked the next time anything
    /// touches the controller
    fn settle(&mut self) {
        if self.state == ControllerState::OperationComplete {
            self.state = ControllerState::Unlocked;
        }
    }

    fn busy(&self) -> bool {
        matches!(
            self.state,
            ControllerState::Programming | ControllerState::Erasing
        )
    }

    /// Attempt to unlock with `key`. The high byte must be 0xA5 and the
    /// protection level must permit unlocking.
    pub fn try_unlock(&mut self, key: u16) -> bool {
        self.settle();
        if self.state != ControllerState::Locked {
            log::warn!("unlock refused: controller is {:?}", self.state);
            return false;
        }
        if key & 0xFF00 != UNLOCK_KEY {
            log::warn!("unlock refused: bad key {:#06x}", key);
            return false;
        }
        if self.protection > ProtectionLevel::WriteProtected {
            log::warn!("unlock refused: protection is {:?}", self.protection);
            return false;
        }
        log::debug!("controller unlocked");
        self.state = ControllerState::Unlocked;
        true
    }

    /// Return to the locked state. Refused while an operation is in
    /// flight or after a fault.
    pub fn lock(&mut self) -> bool {
        self.settle();
        match self.state {
            ControllerState::Locked => true,
            ControllerState::Unlocked => {
                log::debug!("controller locked");
                self.state = ControllerState::Locked;
                true
            }
            _ => {
                log::warn!("lock refused: controller is {:?}", self.state);
                false
            }
        }
    }

    /// Change the protection level. `PermanentlyLocked` is terminal;
    /// setting any level other than `None` while unlocked also locks the
    /// controller.
    pub fn set_protection(&mut self, level: ProtectionLevel) -> bool {
        self.settle();
        if self.busy() || self.state == ControllerState::Error {
            log::warn!("protection change refused: controller is {:?}", self.state);
            return false;
        }
        if self.protection == ProtectionLevel::PermanentlyLocked
            && level != ProtectionLevel::PermanentlyLocked
        {
            log::warn!("protection change refused: permanently locked");
            return false;
        }
        self.protection = level;
        if level != ProtectionLevel::None && self.state == ControllerState::Unlocked {
            self.state = ControllerState::Locked;
        }
        log::debug!("protection set to {:?}", level);
        true
    }

    fn ready_to_modify(&self, what: &str) -> bool {
        if self.state != ControllerState::Unlocked {
            log::warn!("{} refused: controller is {:?}", what, self.state);
            return false;
        }
        if self.protection != ProtectionLevel::None {
            log::warn!("{} refused: protection is {:?}", what, self.protection);
            return false;
        }
        true
    }

    /// Program one byte. Returns false without mutating storage when the
    /// controller is not ready or the flash rule rejects the value.
    pub fn program_byte(&mut self, addr: u16, value: u8) -> bool {
        self.settle();
        if !self.ready_to_modify("program") || !self.contains(addr) {
            return false;
        }
        let offset = (addr - self.base) as usize;
        let current = self.data[offset];
        if !self.relaxed_writes && current & value != value {
            log::warn!(
                "program refused at {:#06x}: {:#04x} would set bits over {:#04x}",
                addr,
                value,
                current
            );
            return false;
        }
        self.data[offset] = value;
        self.begin(FlashOperation::Program, PROGRAM_BYTE_CYCLES);
        true
    }

    /// Program one aligned word. Same acceptance rules as
    /// [`Self::program_byte`], applied to both bytes.
    pub fn program_word(&mut self, addr: u16, value: u16) -> bool {
        self.settle();
        if addr % 2 != 0 {
            log::warn!("program refused: {:#06x} is not word-aligned", addr);
            return false;
        }
        if !self.ready_to_modify("program") || !self.contains(addr) || !self.contains(addr + 1) {
            return false;
        }
        let offset = (addr - self.base) as usize;
        let low = value as u8;
        let high = (value >> 8) as u8;
        if !self.relaxed_writes
            && (self.data[offset] & low != low || self.data[offset + 1] & high != high)
        {
            log::warn!("program refused at {:#06x}: word would set bits", addr);
            return false;
        }
        self.data[offset] = low;
        self.data[offset + 1] = high;
        self.begin(FlashOperation::Program, PROGRAM_WORD_CYCLES);
        true
    }

    /// Erase the 512-byte sector containing `addr`
    pub fn erase_sector(&mut self, addr: u16) -> bool {
        self.settle();
        if !self.ready_to_modify("sector erase") || !self.contains(addr) {
            return false;
        }
        let start = ((addr - self.base) & !(SECTOR_SIZE - 1)) as usize;
        let end = (start + SECTOR_SIZE as usize).min(self.data.len());
        self.data[start..end].fill(0xFF);
        self.begin(FlashOperation::SectorErase, SECTOR_ERASE_CYCLES);
        true
    }

    /// Erase the 64-byte segment containing `addr`
    pub fn erase_segment(&mut self, addr: u16) -> bool {
        self.settle();
        if !self.ready_to_modify("segment erase") || !self.contains(addr) {
            return false;
        }
        let start = ((addr - self.base) & !(SEGMENT_SIZE - 1)) as usize;
        let end = (start + SEGMENT_SIZE as usize).min(self.data.len());
        self.data[start..end].fill(0xFF);
        self.begin(FlashOperation::SegmentErase, SEGMENT_ERASE_CYCLES);
        true
    }

    /// Erase the whole array
    pub fn mass_erase(&mut self) -> bool {
        self.settle();
        if !self.ready_to_modify("mass erase") {
            return false;
        }
        self.data.fill(0xFF);
        self.begin(FlashOperation::MassErase, MASS_ERASE_CYCLES);
        true
    }

    fn begin(&mut self, operation: FlashOperation, cycles: u32) {
        log::debug!("{:?} started, {} cycles", operation, cycles);
        self.operation = operation;
        self.cycles_remaining = cycles;
        self.state = match operation {
            FlashOperation::Program => ControllerState::Programming,
            _ => ControllerState::Erasing,
        };
    }

    /// Advance simulated time. An in-flight operation completes once the
    /// accumulated cycles cover its cost.
    pub fn update(&mut self, cycles: u32) {
        if !self.busy() {
            self.settle();
            return;
        }
        if cycles >= self.cycles_remaining {
            log::debug!("{:?} complete", self.operation);
            self.cycles_remaining = 0;
            self.operation = FlashOperation::None;
            self.state = ControllerState::OperationComplete;
        } else {
            self.cycles_remaining -= cycles;
        }
    }

    /// Record a fault. Only [`Self::reset`] leaves the error state.
    pub fn fault(&mut self, reason: &str) {
        log::warn!("controller fault: {}", reason);
        self.state = ControllerState::Error;
        self.operation = FlashOperation::None;
        self.cycles_remaining = 0;
    }

    /// Return to Locked with no operation pending. Protection drops to
    /// `None` unless it is permanent. Storage is untouched.
    pub fn reset(&mut self) {
        self.state = ControllerState::Locked;
        self.operation = FlashOperation::None;
        self.cycles_remaining = 0;
        if self.protection != ProtectionLevel::PermanentlyLocked {
            self.protection = ProtectionLevel::None;
        }
    }

    /// Read a byte from the array. Reads are never gated.
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.data[(addr - self.base) as usize]
    }

    /// Extra cycles a CPU write into the array costs on top of the
    /// region's read timing
    pub const fn write_penalty(width_bytes: u16) -> u32 {
        if width_bytes == 2 {
            PROGRAM_WORD_CYCLES
        } else {
            PROGRAM_BYTE_CYCLES
        }
    }

    /// Copy bytes directly into storage, bypassing the state machine.
    /// Intended for image loading.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let start = (addr - self.base) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}
